//! Receive buffer for accumulating partial socket reads.
//!
//! TCP is a byte stream: one `read()` may return half a frame, or the tail of
//! one frame and the start of the next.  [`ReceiveBuffer`] keeps every byte
//! that has not yet formed a complete frame and hands back whole frames as
//! soon as they are available.
//!
//! The buffer is bounded indirectly: a frame that declares a payload above
//! `max_payload` is rejected as soon as its header arrives, so the buffer never
//! holds more than one header, one maximum-size payload, and one read chunk.

use tracing::trace;

use super::codec::{decode_frame_bounded, Decoded, Frame, ProtocolError};

/// Default upper bound on a single frame payload (16 MiB).
pub const DEFAULT_MAX_PAYLOAD: u32 = 16 * 1024 * 1024;

/// Per-connection accumulator that turns raw reads into frames.
#[derive(Debug)]
pub struct ReceiveBuffer {
    buf: Vec<u8>,
    max_payload: u32,
}

impl Default for ReceiveBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiveBuffer {
    /// Creates an empty buffer with [`DEFAULT_MAX_PAYLOAD`].
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    /// Creates an empty buffer that rejects payloads above `max_payload` bytes.
    pub fn with_max_payload(max_payload: u32) -> Self {
        Self {
            buf: Vec::with_capacity(8192),
            max_payload,
        }
    }

    /// Appends `data` and returns every frame that is now complete, in order.
    ///
    /// Bytes belonging to a trailing partial frame stay buffered for the next
    /// call.
    ///
    /// # Errors
    ///
    /// Returns the first [`ProtocolError`] encountered.  The buffer contents
    /// are unspecified afterwards; the connection should be dropped.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>, ProtocolError> {
        self.buf.extend_from_slice(data);

        let mut frames = Vec::new();
        let mut consumed = 0;
        loop {
            match decode_frame_bounded(&self.buf[consumed..], self.max_payload)? {
                Decoded::Frame { frame, rest } => {
                    consumed = self.buf.len() - rest.len();
                    frames.push(frame);
                }
                Decoded::NeedMoreData => break,
            }
        }

        if consumed > 0 {
            self.buf.drain(..consumed);
        }
        trace!(
            frames = frames.len(),
            buffered = self.buf.len(),
            "receive buffer drained"
        );
        Ok(frames)
    }

    /// Number of bytes waiting for the rest of their frame.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn max_payload(&self) -> u32 {
        self.max_payload
    }

    /// Discards all buffered bytes.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
