//! Infrastructure layer: OS clipboard adapters and TCP lifecycles.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `clipsync_core`, but MUST NOT be imported by the `application` layer.
//!
//! - **`clipboard`** – `SystemClipboard` (the desktop clipboard via `arboard`)
//!   and `MockClipboard` for tests.
//!
//! - **`network`** – The server accept loop and the client reconnect loop,
//!   each handing one connection at a time to a `StreamSession`.

pub mod clipboard;
pub mod network;
