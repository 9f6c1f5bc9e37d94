//! Application layer for ClipSync.
//!
//! - **`clipboard`** – The [`ClipboardPort`](clipboard::ClipboardPort) trait
//!   the session depends on, and its error type.  Concrete clipboards live in
//!   `infrastructure::clipboard`.
//!
//! - **`session`** – The duplex loop that runs over one live connection:
//!   incoming frames go to the clipboard, local clipboard changes go out as
//!   frames, and the client sends heartbeats while idle.

pub mod clipboard;
pub mod session;
