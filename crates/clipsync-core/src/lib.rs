//! # clipsync-core
//!
//! Shared library for ClipSync containing the wire framing codec, the
//! per-connection receive buffer, and the peer address type.
//!
//! This crate has no dependencies on OS clipboard APIs, async runtimes, or
//! network sockets; everything in it is pure transformation over bytes and
//! strings, so it can be tested without any external setup.
//!
//! - **`protocol`** – How clipboard text travels over TCP.  Each message is a
//!   frame: a fixed 4-byte magic, a big-endian `u32` length, and that many
//!   bytes of UTF-8.  A zero-length frame is a heartbeat.
//!
//! - **`domain`** – Configuration values shared by both roles, currently the
//!   `host:port` [`Address`].

pub mod domain;
pub mod protocol;

pub use domain::address::{Address, AddressError};
pub use protocol::buffer::{ReceiveBuffer, DEFAULT_MAX_PAYLOAD};
pub use protocol::codec::{
    decode_frame, decode_frame_bounded, encode_frame, heartbeat_frame, Decoded, Frame,
    ProtocolError, FRAME_HEADER_SIZE, STREAM_MAGIC,
};
