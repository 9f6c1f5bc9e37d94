//! Client lifecycle: dial the server, mirror until the link drops, redial.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clipsync_core::Address;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use super::{run_connection, EventSink, LifecycleEvent};
use crate::application::clipboard::ClipboardPort;
use crate::application::session::{Role, SessionConfig};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server to dial.
    pub addr: Address,
    pub session: SessionConfig,
    /// Pause between a failed dial and the next one.  Zero retries at once.
    pub reconnect_delay: Duration,
    /// Upper bound on a single dial.
    pub connect_timeout: Duration,
}

impl ClientConfig {
    pub fn new(addr: Address) -> Self {
        Self {
            addr,
            session: SessionConfig::default(),
            reconnect_delay: Duration::ZERO,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Runs the client lifecycle until `running` is cleared.
///
/// Every successful dial starts a new session with a fresh heartbeat timer.
/// A run of failed dials is reported once at `warn`; the rest go to `debug`.
pub async fn run_client(
    config: ClientConfig,
    clipboard: Arc<dyn ClipboardPort>,
    running: Arc<AtomicBool>,
    events: Option<mpsc::Sender<LifecycleEvent>>,
) {
    let events = EventSink::new(events);
    let mut failures: u64 = 0;

    info!("connecting to {}", config.addr);
    while running.load(Ordering::Relaxed) {
        match dial(&config).await {
            Ok((stream, peer_addr)) => {
                if failures > 0 {
                    info!("reached {} after {failures} failed attempts", config.addr);
                }
                failures = 0;
                run_connection(
                    stream,
                    peer_addr,
                    Arc::clone(&clipboard),
                    Role::Client,
                    config.session.clone(),
                    Arc::clone(&running),
                    &events,
                )
                .await;
            }
            Err(e) => {
                failures += 1;
                if failures == 1 {
                    warn!("could not connect to {}: {e}; retrying", config.addr);
                } else {
                    debug!(attempt = failures, "could not connect to {}: {e}", config.addr);
                }
                if config.reconnect_delay.is_zero() {
                    tokio::task::yield_now().await;
                } else {
                    sleep(config.reconnect_delay).await;
                }
            }
        }
    }

    info!("client stopped");
}

async fn dial(config: &ClientConfig) -> std::io::Result<(TcpStream, std::net::SocketAddr)> {
    let stream = timeout(config.connect_timeout, TcpStream::connect(config.addr.as_tuple()))
        .await
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"))??;
    let peer_addr = stream.peer_addr()?;
    Ok((stream, peer_addr))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
