//! Binary codec for ClipSync frames.
//!
//! Wire format:
//! ```text
//! [magic:4][payload_len:4][payload:N]
//! ```
//! `magic` is the fixed byte string `AE86`; `payload_len` is a big-endian
//! `u32`; the payload is UTF-8 text.  A frame whose payload is empty is a
//! heartbeat and carries no clipboard content.

use std::str::Utf8Error;

use thiserror::Error;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Fixed 4-byte prefix of every frame.  Not a version field: a peer that
/// sends anything else is speaking a different protocol.
pub const STREAM_MAGIC: [u8; 4] = [0x41, 0x45, 0x38, 0x36];

/// Size of the big-endian payload length field.
pub const LENGTH_SIZE: usize = 4;

/// Bytes preceding the payload: magic + length.
pub const FRAME_HEADER_SIZE: usize = STREAM_MAGIC.len() + LENGTH_SIZE;

/// Errors that make a byte stream undecodable.
///
/// Every variant is fatal for the connection it was observed on; there is no
/// attempt to resynchronise on a later magic.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ProtocolError {
    /// The first four bytes of the buffer are not [`STREAM_MAGIC`].
    #[error("bad stream magic: expected {:02X?}, found {found:02X?}", STREAM_MAGIC)]
    BadMagic { found: [u8; 4] },

    /// The payload bytes are not valid UTF-8.
    #[error("payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] Utf8Error),

    /// The payload is longer than the receiver (or the wire format) allows.
    #[error("payload length {declared} exceeds maximum {max}")]
    PayloadTooLarge { declared: u64, max: u64 },
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    payload: String,
}

impl Frame {
    /// Wraps `payload` as a frame.  An empty payload makes a heartbeat.
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// A frame with an empty payload.
    pub fn heartbeat() -> Self {
        Self::new(String::new())
    }

    /// Returns `true` if this frame is a keepalive rather than clipboard text.
    pub fn is_heartbeat(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn into_payload(self) -> String {
        self.payload
    }
}

/// Result of a single [`decode_frame`] call.
#[derive(Debug, PartialEq, Eq)]
pub enum Decoded<'a> {
    /// A complete frame, plus every byte after it.
    Frame { frame: Frame, rest: &'a [u8] },
    /// The buffer holds a valid prefix of a frame; read more bytes and retry.
    NeedMoreData,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes `text` into a complete frame.
///
/// # Errors
///
/// Returns [`ProtocolError::PayloadTooLarge`] if the UTF-8 encoding of `text`
/// does not fit in the 32-bit length field.
///
/// # Examples
///
/// ```rust
/// use clipsync_core::protocol::{decode_frame, encode_frame, Decoded};
///
/// let bytes = encode_frame("hello").unwrap();
/// assert_eq!(&bytes[4..8], &[0, 0, 0, 5]);
/// match decode_frame(&bytes).unwrap() {
///     Decoded::Frame { frame, rest } => {
///         assert_eq!(frame.payload(), "hello");
///         assert!(rest.is_empty());
///     }
///     Decoded::NeedMoreData => unreachable!(),
/// }
/// ```
pub fn encode_frame(text: &str) -> Result<Vec<u8>, ProtocolError> {
    let payload = text.as_bytes();
    let payload_len = u32::try_from(payload.len()).map_err(|_| ProtocolError::PayloadTooLarge {
        declared: payload.len() as u64,
        max: u64::from(u32::MAX),
    })?;

    let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    buf.extend_from_slice(&STREAM_MAGIC);
    buf.extend_from_slice(&payload_len.to_be_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// The 8-byte frame sent as a keepalive.
pub fn heartbeat_frame() -> [u8; FRAME_HEADER_SIZE] {
    let mut buf = [0u8; FRAME_HEADER_SIZE];
    buf[..STREAM_MAGIC.len()].copy_from_slice(&STREAM_MAGIC);
    buf
}

/// Decodes one frame from the beginning of `bytes`.
///
/// Call repeatedly on the returned `rest` until [`Decoded::NeedMoreData`].
/// Never blocks and never skips bytes.
///
/// # Errors
///
/// Returns [`ProtocolError::BadMagic`] as soon as four bytes are available and
/// they are not the magic, and [`ProtocolError::InvalidUtf8`] if a complete
/// payload is not UTF-8.
pub fn decode_frame(bytes: &[u8]) -> Result<Decoded<'_>, ProtocolError> {
    decode_frame_bounded(bytes, u32::MAX)
}

/// Like [`decode_frame`], but rejects any declared payload longer than
/// `max_payload` as soon as the length field is visible, without waiting for
/// the payload to arrive.
///
/// # Errors
///
/// Everything [`decode_frame`] returns, plus [`ProtocolError::PayloadTooLarge`].
pub fn decode_frame_bounded(bytes: &[u8], max_payload: u32) -> Result<Decoded<'_>, ProtocolError> {
    let magic_len = STREAM_MAGIC.len();
    if bytes.len() < magic_len {
        return Ok(Decoded::NeedMoreData);
    }

    if bytes[..magic_len] != STREAM_MAGIC {
        let mut found = [0u8; 4];
        found.copy_from_slice(&bytes[..magic_len]);
        return Err(ProtocolError::BadMagic { found });
    }

    if bytes.len() < FRAME_HEADER_SIZE {
        return Ok(Decoded::NeedMoreData);
    }

    let declared = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if declared > max_payload {
        return Err(ProtocolError::PayloadTooLarge {
            declared: u64::from(declared),
            max: u64::from(max_payload),
        });
    }

    let frame_len = FRAME_HEADER_SIZE + declared as usize;
    if bytes.len() < frame_len {
        return Ok(Decoded::NeedMoreData);
    }

    let text = std::str::from_utf8(&bytes[FRAME_HEADER_SIZE..frame_len])?;
    Ok(Decoded::Frame {
        frame: Frame::new(text),
        rest: &bytes[frame_len..],
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
