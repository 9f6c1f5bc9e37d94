//! In-memory clipboard for tests.
//!
//! # Why a mock clipboard?
//!
//! The real [`SystemClipboard`](super::SystemClipboard) talks to the desktop
//! session's clipboard, which:
//!
//! - Does not exist on headless CI machines.
//! - Is shared with every other program the developer is running.
//! - Cannot be told to "change now" from test code.
//!
//! `MockClipboard` replaces all of that with in-memory state.  Tests call
//! [`simulate_local_copy`](MockClipboard::simulate_local_copy) to pretend the
//! user copied something, and inspect [`writes`](MockClipboard::writes) or
//! await [`next_write`](MockClipboard::next_write) to see what the session
//! installed from the network.
//!
//! # `should_fail` flag
//!
//! Build with [`MockClipboard::failing`] to make every call return
//! [`ClipboardError::Unavailable`], for exercising error paths.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use crate::application::clipboard::{ClipboardError, ClipboardPort};

/// A clipboard that records writes and replays scripted local changes.
pub struct MockClipboard {
    current: Mutex<String>,
    writes: Mutex<Vec<String>>,
    changes_tx: mpsc::UnboundedSender<String>,
    changes_rx: AsyncMutex<mpsc::UnboundedReceiver<String>>,
    written_tx: mpsc::UnboundedSender<String>,
    written_rx: AsyncMutex<mpsc::UnboundedReceiver<String>>,
    /// When `true`, every method returns `ClipboardError::Unavailable`.
    pub should_fail: bool,
}

impl Default for MockClipboard {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClipboard {
    /// Creates an empty clipboard with `should_fail = false`.
    pub fn new() -> Self {
        let (changes_tx, changes_rx) = mpsc::unbounded_channel();
        let (written_tx, written_rx) = mpsc::unbounded_channel();
        Self {
            current: Mutex::new(String::new()),
            writes: Mutex::new(Vec::new()),
            changes_tx,
            changes_rx: AsyncMutex::new(changes_rx),
            written_tx,
            written_rx: AsyncMutex::new(written_rx),
            should_fail: false,
        }
    }

    /// Creates a clipboard whose every call fails.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::new()
        }
    }

    /// Pretends the local user copied `text`.
    ///
    /// The next `wait_for_change` call returns it.
    pub fn simulate_local_copy(&self, text: &str) {
        *self.current.lock().unwrap() = text.to_string();
        // The receiver lives as long as `self`, so this cannot fail.
        let _ = self.changes_tx.send(text.to_string());
    }

    /// Every text passed to `write`, in order.
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    /// Waits up to `timeout` for the next `write` call and returns its text.
    ///
    /// Each write is returned exactly once.
    pub async fn next_write(&self, timeout: Duration) -> Option<String> {
        let mut rx = self.written_rx.lock().await;
        tokio::time::timeout(timeout, rx.recv()).await.ok().flatten()
    }

    fn check_fail(&self) -> Result<(), ClipboardError> {
        if self.should_fail {
            return Err(ClipboardError::Unavailable("mock failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ClipboardPort for MockClipboard {
    async fn read_current(&self) -> Result<String, ClipboardError> {
        self.check_fail()?;
        Ok(self.current.lock().unwrap().clone())
    }

    /// Records the text; does not generate a local change.
    async fn write(&self, text: &str) -> Result<(), ClipboardError> {
        self.check_fail()?;
        *self.current.lock().unwrap() = text.to_string();
        self.writes.lock().unwrap().push(text.to_string());
        let _ = self.written_tx.send(text.to_string());
        Ok(())
    }

    async fn wait_for_change(&self, timeout: Duration) -> Result<Option<String>, ClipboardError> {
        if self.should_fail {
            // SystemClipboard also waits out the window before reporting.
            tokio::time::sleep(timeout).await;
            return Err(ClipboardError::Unavailable("mock failure".into()));
        }
        let mut rx = self.changes_rx.lock().await;
        Ok(tokio::time::timeout(timeout, rx.recv()).await.ok().flatten())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
