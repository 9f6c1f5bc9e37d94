//! OS clipboard adapter backed by `arboard`.
//!
//! `arboard` has no change notification, so changes are detected by polling:
//! [`wait_for_change`](ClipboardPort::wait_for_change) re-reads the clipboard
//! every [`POLL_INTERVAL`] and compares against the last text it has seen.
//! A read that fails still waits out the rest of the timeout before the error
//! is returned.  The first poll only records a baseline, so whatever was on
//! the clipboard at startup is not pushed to the peer.
//!
//! Text installed through [`write`](ClipboardPort::write) becomes the new
//! baseline, which keeps received text from bouncing back to the sender.
//!
//! Every `arboard` call runs on the blocking pool; on X11 a read can stall for
//! a while if the selection owner is slow to answer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::trace;

use crate::application::clipboard::{ClipboardError, ClipboardPort};

/// How often the clipboard is re-read while waiting for a change.
pub const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// The desktop clipboard.
pub struct SystemClipboard {
    inner: Arc<Mutex<arboard::Clipboard>>,
    last_seen: Mutex<Option<String>>,
}

impl SystemClipboard {
    /// Opens the desktop clipboard.
    ///
    /// # Errors
    ///
    /// Returns [`ClipboardError::Unavailable`] if there is no clipboard to
    /// connect to (e.g. no display server).
    pub fn new() -> Result<Self, ClipboardError> {
        let clipboard =
            arboard::Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(Mutex::new(clipboard)),
            last_seen: Mutex::new(None),
        })
    }

    async fn with_clipboard<T, F>(&self, op: F) -> Result<T, ClipboardError>
    where
        T: Send + 'static,
        F: FnOnce(&mut arboard::Clipboard) -> Result<T, arboard::Error> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut guard = inner
                .lock()
                .map_err(|_| ClipboardError::Platform("clipboard lock poisoned".into()))?;
            op(&mut *guard).map_err(map_arboard_error)
        })
        .await
        .map_err(|e| ClipboardError::Platform(format!("clipboard task failed: {e}")))?
    }

    /// Compares `current` with the last seen text and updates the baseline.
    ///
    /// Returns the text if it is a change.
    fn observe(&self, current: String) -> Result<Option<String>, ClipboardError> {
        let mut last = self
            .last_seen
            .lock()
            .map_err(|_| ClipboardError::Platform("baseline lock poisoned".into()))?;
        let Some(prev) = last.as_deref() else {
            trace!("clipboard baseline recorded");
            *last = Some(current);
            return Ok(None);
        };
        if prev == current {
            return Ok(None);
        }
        *last = Some(current.clone());
        Ok(Some(current))
    }
}

fn map_arboard_error(e: arboard::Error) -> ClipboardError {
    match e {
        arboard::Error::ClipboardOccupied => ClipboardError::Unavailable(e.to_string()),
        other => ClipboardError::Platform(other.to_string()),
    }
}

#[async_trait]
impl ClipboardPort for SystemClipboard {
    async fn read_current(&self) -> Result<String, ClipboardError> {
        self.with_clipboard(|cb| match cb.get_text() {
            // Images, files, or an empty clipboard all read as "no text".
            Err(arboard::Error::ContentNotAvailable) => Ok(String::new()),
            other => other,
        })
        .await
    }

    async fn write(&self, text: &str) -> Result<(), ClipboardError> {
        let owned = text.to_string();
        self.with_clipboard(move |cb| cb.set_text(owned)).await?;
        let mut last = self
            .last_seen
            .lock()
            .map_err(|_| ClipboardError::Platform("baseline lock poisoned".into()))?;
        *last = Some(text.to_string());
        Ok(())
    }

    async fn wait_for_change(&self, timeout: Duration) -> Result<Option<String>, ClipboardError> {
        let deadline = Instant::now() + timeout;
        loop {
            let current = match self.read_current().await {
                Ok(current) => current,
                Err(e) => {
                    // A failed poll still occupies its whole window.
                    tokio::time::sleep_until(deadline).await;
                    return Err(e);
                }
            };
            if let Some(text) = self.observe(current)? {
                return Ok(Some(text));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}
