//! clipsync library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! Two machines run the same binary, one as `server` and one as `client`.
//! Once the client has dialled in, whatever text is copied on either side
//! appears on the clipboard of the other.  The link carries nothing else:
//! no authentication, no history, no images.

/// Application layer: the clipboard port and the per-connection session.
pub mod application;

/// Infrastructure layer: clipboard adapters and network lifecycles.
pub mod infrastructure;
