//! The clipboard capability the stream session depends on.
//!
//! The session never touches OS clipboard APIs directly; it is handed an
//! `Arc<dyn ClipboardPort>` at construction.  Production code passes a
//! [`SystemClipboard`](crate::infrastructure::clipboard::SystemClipboard),
//! tests pass a [`MockClipboard`](crate::infrastructure::clipboard::MockClipboard).

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Error type for clipboard access.
///
/// Clipboard failures are never fatal to a session: on some platforms the
/// clipboard is briefly locked by another process, so callers log and retry on
/// the next cycle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClipboardError {
    #[error("clipboard is unavailable: {0}")]
    Unavailable(String),
    #[error("platform error: {0}")]
    Platform(String),
}

/// Text clipboard access plus change detection.
///
/// Implementations must be cancel-safe in [`wait_for_change`]: the session
/// drops an in-flight wait whenever the socket becomes readable first, and a
/// change observed by a dropped wait must still be reported by the next call.
///
/// [`wait_for_change`]: ClipboardPort::wait_for_change
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClipboardPort: Send + Sync {
    /// Returns the current clipboard text (empty if the clipboard holds no text).
    async fn read_current(&self) -> Result<String, ClipboardError>;

    /// Replaces the clipboard contents with `text`.
    ///
    /// Text written here should not later be reported by
    /// [`wait_for_change`](ClipboardPort::wait_for_change) as a local change.
    async fn write(&self, text: &str) -> Result<(), ClipboardError>;

    /// Waits up to `timeout` for the clipboard to change.
    ///
    /// Returns `Ok(Some(text))` with the new contents, or `Ok(None)` if nothing
    /// changed before the timeout.
    async fn wait_for_change(&self, timeout: Duration) -> Result<Option<String>, ClipboardError>;
}
