//! StreamSession: the duplex loop for one live connection.
//!
//! Each iteration waits, with a short timeout, for either the socket to
//! become readable or the clipboard to report a local change.  Socket data
//! always wins a tie.
//!
//! ```text
//!            ┌──────────── tokio::select! (biased) ────────────┐
//!            │ socket readable        clipboard changed   idle │
//!            ▼                        ▼                   ▼    │
//!   ReceiveBuffer::push      encode_frame + write_all   on_idle │
//!   write non-empty frames                              (client: │
//!   to the clipboard                                   heartbeat)│
//!            └──────────────────────── loop ───────────────────┘
//! ```
//!
//! The session ends when the peer closes the connection, on any socket error,
//! on a protocol violation, or when the shared `running` flag is cleared.  The
//! stream is owned by the session and dropped (closed) when `run` returns.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clipsync_core::{encode_frame, heartbeat_frame, ProtocolError, ReceiveBuffer, DEFAULT_MAX_PAYLOAD};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{self, Instant};
use tracing::{debug, info, info_span, trace, warn, Instrument};
use uuid::Uuid;

use super::clipboard::{ClipboardError, ClipboardPort};

// ── Defaults ──────────────────────────────────────────────────────────────────

/// Idle time after which the client sends an empty keepalive frame.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);
/// Upper bound on a single wait for socket data.
pub const READ_TIMEOUT: Duration = Duration::from_millis(500);
/// Upper bound on a single wait for a local clipboard change.
pub const CLIPBOARD_POLL_TIMEOUT: Duration = Duration::from_millis(100);
/// Maximum bytes taken from the socket per read.
pub const READ_CHUNK_SIZE: usize = 8192;

/// Which side of the link this session is running on.
///
/// Only the idle behaviour differs: the client keeps the link warm with
/// heartbeats, the server never sends them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

/// Tuning for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub read_timeout: Duration,
    pub clipboard_poll_timeout: Duration,
    /// Only used by [`Role::Client`].
    pub heartbeat_interval: Duration,
    pub chunk_size: usize,
    /// Largest payload accepted from, or sent to, the peer.
    pub max_payload: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_timeout: READ_TIMEOUT,
            clipboard_poll_timeout: CLIPBOARD_POLL_TIMEOUT,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            chunk_size: READ_CHUNK_SIZE,
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// Reasons a session ended abnormally.  Both are fatal to the connection only.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("connection I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Reasons a session ended normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer closed its side of the connection.
    PeerClosed,
    /// The process-wide `running` flag was cleared.
    Shutdown,
}

/// Outcome of one wait in the duplex loop.
enum Tick {
    Read(io::Result<usize>),
    LocalChange(Result<Option<String>, ClipboardError>),
    Idle,
}

/// Owns one connection and moves clipboard text across it in both directions.
pub struct StreamSession<S> {
    id: Uuid,
    stream: S,
    clipboard: Arc<dyn ClipboardPort>,
    role: Role,
    config: SessionConfig,
    buffer: ReceiveBuffer,
    last_heartbeat: Instant,
    /// Last text installed from the peer; a local change equal to it is an
    /// echo of our own write and is not sent back.
    last_from_peer: Option<String>,
    peer: Option<String>,
    /// Consecutive failed clipboard polls; only the first of a run is a warning.
    clipboard_failures: u32,
    running: Arc<AtomicBool>,
}

impl<S> StreamSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Creates a session with a fresh receive buffer and heartbeat timer.
    pub fn new(
        stream: S,
        clipboard: Arc<dyn ClipboardPort>,
        role: Role,
        config: SessionConfig,
        running: Arc<AtomicBool>,
    ) -> Self {
        let buffer = ReceiveBuffer::with_max_payload(config.max_payload);
        Self {
            id: Uuid::new_v4(),
            stream,
            clipboard,
            role,
            config,
            buffer,
            last_heartbeat: Instant::now(),
            last_from_peer: None,
            peer: None,
            clipboard_failures: 0,
            running,
        }
    }

    /// Labels the session's log span with the remote address.
    pub fn with_peer(mut self, peer: impl std::fmt::Display) -> Self {
        self.peer = Some(peer.to_string());
        self
    }

    /// Identifier used in log spans and lifecycle events.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Runs the duplex loop until the connection ends.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Io`] on any read or write failure and
    /// [`SessionError::Protocol`] if the peer sends bytes that cannot be a
    /// frame.  Clipboard failures are logged and never end the session.
    pub async fn run(self) -> Result<SessionEnd, SessionError> {
        let span = info_span!(
            "session",
            id = %self.id,
            peer = self.peer.as_deref().unwrap_or("-"),
            role = ?self.role,
        );
        self.run_loop().instrument(span).await
    }

    async fn run_loop(mut self) -> Result<SessionEnd, SessionError> {
        let mut chunk = vec![0u8; self.config.chunk_size];
        let read_timeout = self.config.read_timeout;
        let poll_timeout = self.config.clipboard_poll_timeout;
        self.last_heartbeat = Instant::now();
        debug!("session started");

        loop {
            if !self.running.load(Ordering::Relaxed) {
                debug!("shutdown flag set; closing session");
                return Ok(SessionEnd::Shutdown);
            }

            let waited_from = Instant::now();
            let tick = {
                let stream = &mut self.stream;
                let clipboard = &self.clipboard;
                tokio::select! {
                    biased;
                    read = time::timeout(read_timeout, stream.read(&mut chunk)) => match read {
                        Ok(result) => Tick::Read(result),
                        Err(_) => Tick::Idle,
                    },
                    change = clipboard.wait_for_change(poll_timeout) => Tick::LocalChange(change),
                }
            };

            match tick {
                Tick::Read(Ok(0)) => {
                    debug!("peer closed the connection");
                    return Ok(SessionEnd::PeerClosed);
                }
                Tick::Read(Ok(n)) => self.on_bytes(&chunk[..n]).await?,
                Tick::Read(Err(e)) => return Err(e.into()),
                Tick::LocalChange(Ok(Some(text))) => {
                    self.clipboard_recovered();
                    self.on_local_change(text).await?
                }
                Tick::LocalChange(Ok(None)) => {
                    self.clipboard_recovered();
                    self.on_idle().await?
                }
                Tick::Idle => self.on_idle().await?,
                Tick::LocalChange(Err(e)) => {
                    self.clipboard_failed(&e);
                    // A failed poll still counts as one idle cycle.
                    time::sleep_until(waited_from + poll_timeout).await;
                    self.on_idle().await?
                }
            }
        }
    }

    fn clipboard_failed(&mut self, err: &ClipboardError) {
        self.clipboard_failures = self.clipboard_failures.saturating_add(1);
        if self.clipboard_failures == 1 {
            warn!("clipboard poll failed: {err}; retrying every cycle");
        } else {
            debug!(failures = self.clipboard_failures, "clipboard poll failed: {err}");
        }
    }

    fn clipboard_recovered(&mut self) {
        if self.clipboard_failures > 0 {
            info!(failures = self.clipboard_failures, "clipboard available again");
            self.clipboard_failures = 0;
        }
    }

    /// Feeds socket bytes through the receive buffer and installs every
    /// non-empty frame into the clipboard.
    async fn on_bytes(&mut self, data: &[u8]) -> Result<(), SessionError> {
        let frames = self.buffer.push(data)?;
        for frame in frames {
            if frame.is_heartbeat() {
                trace!("heartbeat received");
                continue;
            }
            let text = frame.into_payload();
            debug!(bytes = text.len(), "received clipboard text from peer");
            match self.clipboard.write(&text).await {
                Ok(()) => self.last_from_peer = Some(text),
                Err(e) => warn!("failed to install received text into clipboard: {e}"),
            }
        }
        Ok(())
    }

    async fn on_local_change(&mut self, text: String) -> Result<(), SessionError> {
        if self.last_from_peer.take().as_deref() == Some(text.as_str()) {
            debug!("local change matches text just received from peer; not echoing");
            return Ok(());
        }
        // An empty frame would be read as a heartbeat, so a cleared clipboard
        // cannot be mirrored.
        if text.is_empty() {
            trace!("local clipboard cleared; nothing to send");
            return Ok(());
        }
        if text.len() > self.config.max_payload as usize {
            warn!(
                bytes = text.len(),
                max = self.config.max_payload,
                "local clipboard text too large to send; skipped"
            );
            return Ok(());
        }

        let bytes = encode_frame(&text)?;
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        debug!(bytes = text.len(), "sent local clipboard text to peer");
        Ok(())
    }

    async fn on_idle(&mut self) -> Result<(), SessionError> {
        match self.role {
            Role::Server => Ok(()),
            Role::Client => {
                if self.last_heartbeat.elapsed() >= self.config.heartbeat_interval {
                    self.stream.write_all(&heartbeat_frame()).await?;
                    self.stream.flush().await?;
                    self.last_heartbeat = Instant::now();
                    trace!("heartbeat sent");
                }
                Ok(())
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::clipboard::MockClipboardPort;
    use crate::infrastructure::clipboard::MockClipboard;
    use clipsync_core::FRAME_HEADER_SIZE;
    use tokio::io::{duplex, DuplexStream};

    const WAIT: Duration = Duration::from_secs(2);

    fn running() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(true))
    }

    fn fast_config() -> SessionConfig {
        SessionConfig {
            clipboard_poll_timeout: Duration::from_millis(10),
            ..SessionConfig::default()
        }
    }

    fn session_over_duplex(
        clipboard: Arc<dyn ClipboardPort>,
        role: Role,
        config: SessionConfig,
        running: Arc<AtomicBool>,
    ) -> (StreamSession<DuplexStream>, DuplexStream) {
        let (local, peer) = duplex(64 * 1024);
        (StreamSession::new(local, clipboard, role, config, running), peer)
    }

    async fn read_exact_within(peer: &mut DuplexStream, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        time::timeout(WAIT, peer.read_exact(&mut buf))
            .await
            .expect("peer read timed out")
            .expect("peer read failed");
        buf
    }

    #[tokio::test]
    async fn test_run_installs_text_frames_and_drops_heartbeats() {
        // Arrange
        let clip = Arc::new(MockClipboard::new());
        let (session, mut peer) =
            session_over_duplex(clip.clone(), Role::Server, fast_config(), running());
        let mut wire = encode_frame("hello").unwrap();
        wire.extend_from_slice(&heartbeat_frame());
        wire.extend_from_slice(&encode_frame("world").unwrap());
        peer.write_all(&wire).await.unwrap();
        drop(peer);

        // Act
        let end = time::timeout(WAIT, session.run()).await.unwrap().unwrap();

        // Assert
        assert_eq!(end, SessionEnd::PeerClosed);
        assert_eq!(clip.writes(), vec!["hello", "world"]);
    }

    #[tokio::test]
    async fn test_run_heartbeat_only_stream_never_writes_clipboard() {
        let clip = Arc::new(MockClipboard::new());
        let (session, mut peer) =
            session_over_duplex(clip.clone(), Role::Server, fast_config(), running());
        for _ in 0..3 {
            peer.write_all(&heartbeat_frame()).await.unwrap();
        }
        drop(peer);

        let end = time::timeout(WAIT, session.run()).await.unwrap().unwrap();

        assert_eq!(end, SessionEnd::PeerClosed);
        assert!(clip.writes().is_empty(), "heartbeats must not reach the clipboard");
    }

    #[tokio::test]
    async fn test_run_bad_magic_ends_with_protocol_error() {
        // Arrange: a peer speaking HTTP instead of the frame protocol
        let stream = tokio_test::io::Builder::new()
            .read(b"GET / HTTP/1.1\r\n")
            .build();
        let clip = Arc::new(MockClipboard::new());
        let session = StreamSession::new(stream, clip.clone(), Role::Server, fast_config(), running());

        // Act
        let result = time::timeout(WAIT, session.run()).await.unwrap();

        // Assert
        assert!(matches!(
            result,
            Err(SessionError::Protocol(ProtocolError::BadMagic { .. }))
        ));
        assert!(clip.writes().is_empty());
    }

    #[tokio::test]
    async fn test_run_oversized_declared_length_ends_session() {
        let mut header = clipsync_core::STREAM_MAGIC.to_vec();
        header.extend_from_slice(&1_000u32.to_be_bytes());
        let stream = tokio_test::io::Builder::new().read(&header).build();
        let config = SessionConfig {
            max_payload: 100,
            ..fast_config()
        };
        let session = StreamSession::new(
            stream,
            Arc::new(MockClipboard::new()),
            Role::Client,
            config,
            running(),
        );

        let result = time::timeout(WAIT, session.run()).await.unwrap();

        assert!(matches!(
            result,
            Err(SessionError::Protocol(ProtocolError::PayloadTooLarge { declared: 1_000, max: 100 }))
        ));
    }

    #[tokio::test]
    async fn test_run_sends_local_change_as_one_frame() {
        // Arrange
        let clip = Arc::new(MockClipboard::new());
        let (session, mut peer) =
            session_over_duplex(clip.clone(), Role::Client, fast_config(), running());
        let handle = tokio::spawn(session.run());

        // Act
        clip.simulate_local_copy("hello");
        let expected = encode_frame("hello").unwrap();
        let got = read_exact_within(&mut peer, expected.len()).await;

        // Assert
        assert_eq!(got, expected);
        drop(peer);
        let end = time::timeout(WAIT, handle).await.unwrap().unwrap().unwrap();
        assert_eq!(end, SessionEnd::PeerClosed);
    }

    #[tokio::test]
    async fn test_run_does_not_echo_text_received_from_peer() {
        // Arrange
        let clip = Arc::new(MockClipboard::new());
        let (session, mut peer) =
            session_over_duplex(clip.clone(), Role::Server, fast_config(), running());
        let handle = tokio::spawn(session.run());
        peer.write_all(&encode_frame("from peer").unwrap()).await.unwrap();
        assert_eq!(clip.next_write(WAIT).await.as_deref(), Some("from peer"));

        // Act: the OS reports our own write as a change, then the user copies
        clip.simulate_local_copy("from peer");
        clip.simulate_local_copy("typed locally");

        // Assert: only the genuine local copy crosses the wire
        let expected = encode_frame("typed locally").unwrap();
        let got = read_exact_within(&mut peer, expected.len()).await;
        assert_eq!(got, expected);

        drop(peer);
        let _ = time::timeout(WAIT, handle).await;
    }

    #[tokio::test]
    async fn test_run_echo_guard_only_skips_once() {
        let clip = Arc::new(MockClipboard::new());
        let (session, mut peer) =
            session_over_duplex(clip.clone(), Role::Server, fast_config(), running());
        let handle = tokio::spawn(session.run());
        peer.write_all(&encode_frame("same").unwrap()).await.unwrap();
        clip.next_write(WAIT).await;

        clip.simulate_local_copy("same");
        clip.simulate_local_copy("same");

        let expected = encode_frame("same").unwrap();
        assert_eq!(read_exact_within(&mut peer, expected.len()).await, expected);

        drop(peer);
        let _ = time::timeout(WAIT, handle).await;
    }

    #[tokio::test]
    async fn test_client_idle_sends_heartbeat_after_interval() {
        // Arrange
        let config = SessionConfig {
            heartbeat_interval: Duration::from_millis(50),
            ..fast_config()
        };
        let clip = Arc::new(MockClipboard::new());
        let (session, mut peer) = session_over_duplex(clip, Role::Client, config, running());
        let handle = tokio::spawn(session.run());

        // Act
        let got = read_exact_within(&mut peer, FRAME_HEADER_SIZE).await;

        // Assert
        assert_eq!(got, heartbeat_frame().to_vec());
        drop(peer);
        let _ = time::timeout(WAIT, handle).await;
    }

    #[tokio::test]
    async fn test_server_idle_never_sends_heartbeat() {
        // Arrange
        let config = SessionConfig {
            heartbeat_interval: Duration::from_millis(1),
            ..fast_config()
        };
        let flag = running();
        let (session, mut peer) = session_over_duplex(
            Arc::new(MockClipboard::new()),
            Role::Server,
            config,
            Arc::clone(&flag),
        );
        let handle = tokio::spawn(session.run());

        // Act
        let mut buf = [0u8; 1];
        let read = time::timeout(Duration::from_millis(300), peer.read(&mut buf)).await;

        // Assert
        assert!(read.is_err(), "server must stay silent while idle");
        flag.store(false, Ordering::Relaxed);
        let end = time::timeout(WAIT, handle).await.unwrap().unwrap().unwrap();
        assert_eq!(end, SessionEnd::Shutdown);
    }

    #[tokio::test]
    async fn test_run_clipboard_write_failure_keeps_session_alive() {
        // Arrange: a clipboard that refuses every write
        let mut port = MockClipboardPort::new();
        port.expect_write()
            .returning(|_| Err(ClipboardError::Platform("locked".into())));
        port.expect_wait_for_change().returning(|_| Ok(None));
        let (session, mut peer) =
            session_over_duplex(Arc::new(port), Role::Server, fast_config(), running());
        peer.write_all(&encode_frame("one").unwrap()).await.unwrap();
        peer.write_all(&encode_frame("two").unwrap()).await.unwrap();
        drop(peer);

        // Act
        let end = time::timeout(WAIT, session.run()).await.unwrap();

        // Assert: both frames were consumed and the session ended cleanly
        assert_eq!(end.unwrap(), SessionEnd::PeerClosed);
    }

    #[tokio::test]
    async fn test_run_clipboard_poll_failure_is_not_fatal() {
        let clip = Arc::new(MockClipboard::failing());
        let flag = running();
        let (session, _peer) = session_over_duplex(clip, Role::Client, fast_config(), Arc::clone(&flag));
        let handle = tokio::spawn(session.run());

        time::sleep(Duration::from_millis(100)).await;
        assert!(!handle.is_finished(), "poll failures must not end the session");

        flag.store(false, Ordering::Relaxed);
        let end = time::timeout(WAIT, handle).await.unwrap().unwrap().unwrap();
        assert_eq!(end, SessionEnd::Shutdown);
    }

    #[tokio::test]
    async fn test_run_immediate_poll_failures_still_send_heartbeats() {
        // Arrange: a clipboard whose poll fails at once, without waiting
        let polls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&polls);
        let mut port = MockClipboardPort::new();
        port.expect_wait_for_change().returning(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
            Err(ClipboardError::Unavailable("occupied".into()))
        });
        let config = SessionConfig {
            heartbeat_interval: Duration::from_millis(50),
            ..fast_config()
        };
        let flag = running();
        let (session, mut peer) =
            session_over_duplex(Arc::new(port), Role::Client, config, Arc::clone(&flag));
        let handle = tokio::spawn(session.run());

        // Act
        let mut got = [0u8; FRAME_HEADER_SIZE];
        let read = time::timeout(Duration::from_millis(500), peer.read_exact(&mut got)).await;

        // Assert: the heartbeat went out and polls were paced by the poll timeout
        assert!(read.is_ok(), "heartbeat must be sent while the clipboard is failing");
        assert_eq!(got, heartbeat_frame());
        let seen = polls.load(Ordering::Relaxed);
        assert!(seen < 100, "failed polls must not spin the loop, saw {seen}");

        flag.store(false, Ordering::Relaxed);
        let end = time::timeout(WAIT, handle).await.unwrap().unwrap().unwrap();
        assert_eq!(end, SessionEnd::Shutdown);
    }

    #[tokio::test]
    async fn test_client_heartbeat_cadence_is_one_per_interval() {
        // Arrange: idle ticks every 10ms, heartbeat every 100ms
        let config = SessionConfig {
            heartbeat_interval: Duration::from_millis(100),
            ..fast_config()
        };
        let flag = running();
        let (session, mut peer) = session_over_duplex(
            Arc::new(MockClipboard::new()),
            Role::Client,
            config,
            Arc::clone(&flag),
        );
        let handle = tokio::spawn(session.run());

        // Act: collect everything the client sends over ~3.5 intervals
        time::sleep(Duration::from_millis(350)).await;
        flag.store(false, Ordering::Relaxed);
        time::timeout(WAIT, handle).await.unwrap().unwrap().unwrap();
        let mut received = Vec::new();
        peer.read_to_end(&mut received).await.unwrap();

        // Assert: whole heartbeat frames only, roughly one per interval
        assert_eq!(received.len() % FRAME_HEADER_SIZE, 0);
        let heartbeats = received.len() / FRAME_HEADER_SIZE;
        assert!(
            (2..=4).contains(&heartbeats),
            "expected about 3 heartbeats, got {heartbeats}"
        );
        for frame in received.chunks(FRAME_HEADER_SIZE) {
            assert_eq!(frame, heartbeat_frame());
        }
    }

    #[tokio::test]
    async fn test_run_cleared_flag_ends_before_first_read() {
        let flag = Arc::new(AtomicBool::new(false));
        let (session, _peer) =
            session_over_duplex(Arc::new(MockClipboard::new()), Role::Client, fast_config(), flag);

        let end = session.run().await.unwrap();

        assert_eq!(end, SessionEnd::Shutdown);
    }

    #[test]
    fn test_session_config_default_matches_protocol_timings() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.read_timeout, Duration::from_millis(500));
        assert_eq!(cfg.clipboard_poll_timeout, Duration::from_millis(100));
        assert_eq!(cfg.heartbeat_interval, Duration::from_secs(60));
        assert_eq!(cfg.chunk_size, 8192);
    }
}
