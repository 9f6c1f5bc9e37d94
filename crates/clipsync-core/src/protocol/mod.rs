//! Protocol module containing the frame codec and the receive buffer.

pub mod buffer;
pub mod codec;

pub use buffer::{ReceiveBuffer, DEFAULT_MAX_PAYLOAD};
pub use codec::{
    decode_frame, decode_frame_bounded, encode_frame, heartbeat_frame, Decoded, Frame,
    ProtocolError, FRAME_HEADER_SIZE, LENGTH_SIZE, STREAM_MAGIC,
};
