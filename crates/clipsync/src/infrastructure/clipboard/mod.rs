//! Clipboard adapters implementing [`ClipboardPort`](crate::application::clipboard::ClipboardPort).
//!
//! - **`system`** – the desktop clipboard via `arboard`, with polling change
//!   detection.  Works on Windows, macOS, and Linux (X11 and Wayland).
//! - **`mock`** – in-memory clipboard used by unit and integration tests.

pub mod mock;
pub mod system;

pub use mock::MockClipboard;
pub use system::SystemClipboard;
