//! Network infrastructure: the server and client connection lifecycles.
//!
//! Both roles hold at most one connection at a time and hand it to a
//! [`StreamSession`] until the session ends, then start over:
//!
//! ```text
//!   IDLE ──► LISTENING / CONNECTING ──► CONNECTED ──► (session ends) ──► IDLE
//! ```
//!
//! Progress is reported as [`LifecycleEvent`]s on an optional `mpsc` channel.
//! Events are sent with `try_send`, so a slow or absent consumer never stalls
//! the connection.

pub mod client;
pub mod server;

use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clipsync_core::ProtocolError;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::clipboard::ClipboardPort;
use crate::application::session::{Role, SessionConfig, SessionEnd, SessionError, StreamSession};

pub use client::{run_client, ClientConfig};
pub use server::{run_server, ServerConfig};

/// Events emitted by the lifecycle loops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The server bound a fresh listener and is waiting for a peer.
    Listening { local_addr: SocketAddr },
    /// A connection was established and a session is starting.
    Connected { peer_addr: SocketAddr, session_id: Uuid },
    /// A session ended; the loop will start over unless shutting down.
    SessionEnded {
        session_id: Uuid,
        outcome: SessionOutcome,
    },
}

/// How a session ended, flattened so it can be cloned into an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    PeerClosed,
    Shutdown,
    IoError(String),
    ProtocolViolation(ProtocolError),
}

impl From<Result<SessionEnd, SessionError>> for SessionOutcome {
    fn from(result: Result<SessionEnd, SessionError>) -> Self {
        match result {
            Ok(SessionEnd::PeerClosed) => SessionOutcome::PeerClosed,
            Ok(SessionEnd::Shutdown) => SessionOutcome::Shutdown,
            Err(SessionError::Io(e)) => SessionOutcome::IoError(e.to_string()),
            Err(SessionError::Protocol(e)) => SessionOutcome::ProtocolViolation(e),
        }
    }
}

/// Optional event sink shared by both lifecycles.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventSink(Option<mpsc::Sender<LifecycleEvent>>);

impl EventSink {
    pub(crate) fn new(tx: Option<mpsc::Sender<LifecycleEvent>>) -> Self {
        Self(tx)
    }

    pub(crate) fn emit(&self, event: LifecycleEvent) {
        if let Some(tx) = &self.0 {
            if let Err(e) = tx.try_send(event) {
                tracing::debug!("lifecycle event dropped: {e}");
            }
        }
    }
}

/// Runs one session over an established connection and reports its outcome.
///
/// The stream is moved into the session, so the socket is closed by the time
/// this returns.
pub(crate) async fn run_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    clipboard: Arc<dyn ClipboardPort>,
    role: Role,
    config: SessionConfig,
    running: Arc<AtomicBool>,
    events: &EventSink,
) -> SessionOutcome {
    if let Err(e) = stream.set_nodelay(true) {
        warn!("failed to set TCP_NODELAY on connection to {peer_addr}: {e}");
    }

    let session = StreamSession::new(stream, clipboard, role, config, running).with_peer(peer_addr);
    let session_id = session.id();
    info!(%session_id, "connected to {peer_addr}");
    events.emit(LifecycleEvent::Connected {
        peer_addr,
        session_id,
    });

    let outcome = SessionOutcome::from(session.run().await);
    match &outcome {
        SessionOutcome::PeerClosed => info!(%session_id, "{peer_addr} disconnected"),
        SessionOutcome::Shutdown => info!(%session_id, "session with {peer_addr} closed for shutdown"),
        SessionOutcome::IoError(e) => warn!(%session_id, "connection to {peer_addr} dropped: {e}"),
        SessionOutcome::ProtocolViolation(e) => {
            error!(%session_id, "protocol violation from {peer_addr}: {e}")
        }
    }
    events.emit(LifecycleEvent::SessionEnded {
        session_id,
        outcome: outcome.clone(),
    });
    outcome
}

// ── Tests ─────────────────────────────────────────────────────────────────────
