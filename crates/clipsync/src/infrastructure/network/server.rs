//! Server lifecycle: listen, accept one peer, mirror until it leaves, repeat.
//!
//! The listener is bound fresh for every connection and dropped as soon as a
//! peer is accepted, so a second peer is refused (connection refused, not
//! queued) while a session is active.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clipsync_core::Address;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tracing::{error, info, warn};

use super::{run_connection, EventSink, LifecycleEvent};
use crate::application::clipboard::ClipboardPort;
use crate::application::session::{Role, SessionConfig};

/// How long a single `accept()` may block before the shutdown flag is rechecked.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind.
    pub addr: Address,
    pub session: SessionConfig,
    /// Pause before retrying a failed bind.
    pub rebind_delay: Duration,
}

impl ServerConfig {
    pub fn new(addr: Address) -> Self {
        Self {
            addr,
            session: SessionConfig::default(),
            rebind_delay: Duration::from_secs(1),
        }
    }
}

/// Runs the server lifecycle until `running` is cleared.
///
/// Bind, accept and session failures are logged and the loop starts over;
/// nothing short of the shutdown flag ends it.
pub async fn run_server(
    config: ServerConfig,
    clipboard: Arc<dyn ClipboardPort>,
    running: Arc<AtomicBool>,
    events: Option<mpsc::Sender<LifecycleEvent>>,
) {
    let events = EventSink::new(events);

    while running.load(Ordering::Relaxed) {
        let listener = match TcpListener::bind(config.addr.as_tuple()).await {
            Ok(listener) => listener,
            Err(e) => {
                warn!("failed to bind {}: {e}; retrying in {:?}", config.addr, config.rebind_delay);
                sleep(config.rebind_delay).await;
                continue;
            }
        };

        match listener.local_addr() {
            Ok(local_addr) => {
                info!("listening on {local_addr}");
                events.emit(LifecycleEvent::Listening { local_addr });
            }
            Err(e) => warn!("listening on {}, local address unknown: {e}", config.addr),
        }

        let Some((stream, peer_addr)) = accept_one(&listener, &running).await else {
            continue;
        };
        // One peer at a time: stop listening before the session starts.
        drop(listener);

        run_connection(
            stream,
            peer_addr,
            Arc::clone(&clipboard),
            Role::Server,
            config.session.clone(),
            Arc::clone(&running),
            &events,
        )
        .await;
    }

    info!("server stopped");
}

/// Waits for one connection, checking `running` every [`ACCEPT_POLL`].
///
/// Returns `None` on shutdown or on an accept error (the caller rebinds).
async fn accept_one(
    listener: &TcpListener,
    running: &AtomicBool,
) -> Option<(tokio::net::TcpStream, std::net::SocketAddr)> {
    loop {
        if !running.load(Ordering::Relaxed) {
            return None;
        }
        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok(accepted)) => return Some(accepted),
            Ok(Err(e)) => {
                error!("accept error: {e}");
                return None;
            }
            Err(_) => {}
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
