//! ClipSync: mirror a text clipboard between two machines.
//!
//! # Usage
//!
//! ```text
//! clipsync server <HOST:PORT> [--heartbeat-secs N] [--max-payload BYTES]
//! clipsync client <HOST:PORT> [--heartbeat-secs N] [--reconnect-delay-ms N] [--max-payload BYTES]
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable                    | Default    | Description                      |
//! |-----------------------------|------------|----------------------------------|
//! | `CLIPSYNC_HEARTBEAT_SECS`   | `60`       | Client keepalive interval (secs) |
//! | `CLIPSYNC_RECONNECT_DELAY_MS` | `0`      | Client pause between dials       |
//! | `CLIPSYNC_MAX_PAYLOAD`      | `16777216` | Largest accepted frame (bytes)   |
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use clipsync_core::{Address, DEFAULT_MAX_PAYLOAD};
use tracing::info;
use tracing_subscriber::EnvFilter;

use clipsync::application::clipboard::ClipboardPort;
use clipsync::application::session::SessionConfig;
use clipsync::infrastructure::clipboard::SystemClipboard;
use clipsync::infrastructure::network::{run_client, run_server, ClientConfig, ServerConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "clipsync",
    about = "Mirror a text clipboard between two machines over TCP",
    version
)]
struct Cli {
    #[command(subcommand)]
    role: RoleCommand,
}

#[derive(Debug, Subcommand)]
enum RoleCommand {
    /// Listen on HOST:PORT and mirror the clipboard with whoever connects.
    Server {
        /// Address to bind, e.g. `0.0.0.0:7200` or `[::]:7200`.
        addr: String,
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Connect to a server at HOST:PORT, reconnecting whenever the link drops.
    Client {
        /// Server address, e.g. `desktop.lan:7200`.
        addr: String,
        /// Milliseconds to wait after a failed connection attempt.
        #[arg(long, default_value_t = 0, env = "CLIPSYNC_RECONNECT_DELAY_MS")]
        reconnect_delay_ms: u64,
        #[command(flatten)]
        session: SessionArgs,
    },
}

#[derive(Debug, Args)]
struct SessionArgs {
    /// Idle seconds before the client sends a keepalive frame.
    #[arg(long, default_value_t = 60, env = "CLIPSYNC_HEARTBEAT_SECS")]
    heartbeat_secs: u64,

    /// Largest clipboard payload, in bytes, sent or accepted.
    #[arg(long, default_value_t = DEFAULT_MAX_PAYLOAD, env = "CLIPSYNC_MAX_PAYLOAD")]
    max_payload: u32,
}

impl SessionArgs {
    fn into_session_config(self) -> anyhow::Result<SessionConfig> {
        if self.heartbeat_secs == 0 {
            anyhow::bail!("--heartbeat-secs must be at least 1");
        }
        Ok(SessionConfig {
            heartbeat_interval: Duration::from_secs(self.heartbeat_secs),
            max_payload: self.max_payload,
            ..SessionConfig::default()
        })
    }
}

/// Fully validated run configuration for one role.
#[derive(Debug)]
enum RunConfig {
    Server(ServerConfig),
    Client(ClientConfig),
}

impl Cli {
    /// Validates the arguments and builds the configuration for the chosen role.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not `HOST:PORT` or a session option
    /// is out of range.  Nothing touches the network before this succeeds.
    fn into_run_config(self) -> anyhow::Result<RunConfig> {
        match self.role {
            RoleCommand::Server { addr, session } => {
                let addr: Address = addr
                    .parse()
                    .with_context(|| format!("invalid server address: '{addr}'"))?;
                let mut config = ServerConfig::new(addr);
                config.session = session.into_session_config()?;
                Ok(RunConfig::Server(config))
            }
            RoleCommand::Client {
                addr,
                reconnect_delay_ms,
                session,
            } => {
                let addr: Address = addr
                    .parse()
                    .with_context(|| format!("invalid server address: '{addr}'"))?;
                let mut config = ClientConfig::new(addr);
                config.session = session.into_session_config()?;
                config.reconnect_delay = Duration::from_millis(reconnect_delay_ms);
                Ok(RunConfig::Client(config))
            }
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_run_config()?;

    let clipboard: Arc<dyn ClipboardPort> =
        Arc::new(SystemClipboard::new().context("failed to open the system clipboard")?);

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => tracing::error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    match config {
        RunConfig::Server(config) => {
            info!("clipsync server starting on {}", config.addr);
            run_server(config, clipboard, running, None).await;
        }
        RunConfig::Client(config) => {
            info!("clipsync client starting; server is {}", config.addr);
            run_client(config, clipboard, running, None).await;
        }
    }

    info!("clipsync stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn server(config: RunConfig) -> ServerConfig {
        match config {
            RunConfig::Server(c) => c,
            other => panic!("expected server config, got {other:?}"),
        }
    }

    fn client(config: RunConfig) -> ClientConfig {
        match config {
            RunConfig::Client(c) => c,
            other => panic!("expected client config, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_server_defaults() {
        // Arrange
        let cli = Cli::parse_from(["clipsync", "server", "0.0.0.0:7200"]);

        // Act
        let cfg = server(cli.into_run_config().unwrap());

        // Assert
        assert_eq!(cfg.addr, Address::new("0.0.0.0", 7200));
        assert_eq!(cfg.session.heartbeat_interval, Duration::from_secs(60));
        assert_eq!(cfg.session.max_payload, DEFAULT_MAX_PAYLOAD);
    }

    #[test]
    fn test_cli_client_defaults_retry_immediately() {
        let cli = Cli::parse_from(["clipsync", "client", "desktop.lan:7200"]);
        let cfg = client(cli.into_run_config().unwrap());
        assert_eq!(cfg.addr.host(), "desktop.lan");
        assert_eq!(cfg.reconnect_delay, Duration::ZERO);
    }

    #[test]
    fn test_cli_client_overrides() {
        let cli = Cli::parse_from([
            "clipsync",
            "client",
            "10.0.0.5:9000",
            "--heartbeat-secs",
            "5",
            "--reconnect-delay-ms",
            "250",
            "--max-payload",
            "1024",
        ]);

        let cfg = client(cli.into_run_config().unwrap());

        assert_eq!(cfg.session.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(cfg.reconnect_delay, Duration::from_millis(250));
        assert_eq!(cfg.session.max_payload, 1024);
    }

    #[test]
    fn test_cli_ipv6_server_address() {
        let cli = Cli::parse_from(["clipsync", "server", "[::1]:7200"]);
        let cfg = server(cli.into_run_config().unwrap());
        assert_eq!(cfg.addr.host(), "::1");
    }

    #[test]
    fn test_into_run_config_address_without_port_returns_error() {
        // Arrange
        let cli = Cli::parse_from(["clipsync", "client", "desktop.lan"]);

        // Act
        let result = cli.into_run_config();

        // Assert
        let err = result.unwrap_err();
        assert!(format!("{err:#}").contains("desktop.lan"));
    }

    #[test]
    fn test_into_run_config_non_numeric_port_returns_error() {
        let cli = Cli::parse_from(["clipsync", "server", "host:http"]);
        assert!(cli.into_run_config().is_err());
    }

    #[test]
    fn test_into_run_config_zero_heartbeat_returns_error() {
        let cli = Cli::parse_from(["clipsync", "client", "h:1", "--heartbeat-secs", "0"]);
        assert!(cli.into_run_config().is_err());
    }

    #[test]
    fn test_cli_missing_role_is_rejected() {
        assert!(Cli::try_parse_from(["clipsync"]).is_err());
    }
}
