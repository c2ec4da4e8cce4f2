//! Frame struct and the pure encode/decode functions.
//!
//! Represents a complete protocol frame with header and payload.
//! Uses `bytes::Bytes` for cheap payload hand-off to callers.
//!
//! # Example
//!
//! ```
//! use spine_link::protocol::{decode_frame, encode_frame, Direction, PayloadType};
//!
//! let bytes = encode_frame(PayloadType::ModeChange, Direction::HeadToBody, &[]).unwrap();
//! assert_eq!(bytes.len(), 8 + 4);
//!
//! let frame = decode_frame(&bytes, Direction::HeadToBody).unwrap();
//! assert_eq!(frame.payload_type(), PayloadType::ModeChange);
//! ```

use bytes::Bytes;

use super::checksum::{compute_checksum, verify_footer};
use super::payload_type::PayloadType;
use super::wire_format::{decode_header, Direction, Header, FOOTER_SIZE, HEADER_SIZE};
use crate::error::{Result, SpineError};

/// A complete, checksum-verified protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Payload bytes (footer stripped).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from header and payload.
    pub fn new(header: Header, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get the payload type.
    #[inline]
    pub fn payload_type(&self) -> PayloadType {
        self.header.payload_type
    }

    /// Check the frame type.
    #[inline]
    pub fn is(&self, payload_type: PayloadType) -> bool {
        self.header.payload_type == payload_type
    }
}

/// Encode a frame travelling in `direction` as a single byte vector.
///
/// Fails with `BadArgument` when `payload.len()` differs from the table's
/// length for `payload_type` in that direction.
pub fn encode_frame(
    payload_type: PayloadType,
    direction: Direction,
    payload: &[u8],
) -> Result<Vec<u8>> {
    let header = Header::for_type(payload_type, direction)?;
    if payload.len() != header.payload_len() {
        return Err(SpineError::BadArgument(format!(
            "{} payload is {} bytes, expected {}",
            payload_type,
            payload.len(),
            header.payload_len()
        )));
    }

    let mut buf = Vec::with_capacity(header.frame_len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    buf.extend_from_slice(&compute_checksum(payload).to_ne_bytes());
    Ok(buf)
}

/// Decode one complete frame that starts at `buf[0]`.
///
/// Trailing bytes beyond the frame are ignored.
pub fn decode_frame(buf: &[u8], inbound: Direction) -> Result<Frame> {
    let header = decode_header(buf, inbound)?;
    let total = header.frame_len();
    if buf.len() < total {
        return Err(SpineError::BadArgument(format!(
            "frame needs {} bytes, have {}",
            total,
            buf.len()
        )));
    }

    let payload = &buf[HEADER_SIZE..HEADER_SIZE + header.payload_len()];
    let footer = &buf[total - FOOTER_SIZE..total];
    if !verify_footer(payload, footer) {
        return Err(SpineError::ChecksumMismatch {
            expected: u32::from_ne_bytes([footer[0], footer[1], footer[2], footer[3]]),
            actual: compute_checksum(payload),
        });
    }

    Ok(Frame::new(header, Bytes::copy_from_slice(payload)))
}
