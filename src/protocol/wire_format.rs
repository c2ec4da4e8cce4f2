//! Wire format encoding and decoding.
//!
//! Implements the 8-byte spine header:
//! ```text
//! ┌──────────┬──────────────┬─────────────────┐
//! │ Sync tag │ Payload type │ Bytes to follow │
//! │ 4 bytes  │ 2 bytes      │ 2 bytes         │
//! └──────────┴──────────────┴─────────────────┘
//! ```
//!
//! followed by `bytes_to_follow` payload bytes and a 4-byte CRC footer.
//! All multi-byte integers use the platform's native byte order: both
//! processors share an architecture and nothing is byte-swapped.

use serde::{Deserialize, Serialize};

use super::payload_type::PayloadType;
use crate::error::{Result, SpineError};

/// Header size in bytes (fixed, exactly 8).
pub const HEADER_SIZE: usize = 8;

/// Footer (checksum) size in bytes.
pub const FOOTER_SIZE: usize = 4;

/// Sync tag size in bytes.
pub const SYNC_SIZE: usize = 4;

/// Sync tag on frames travelling body→head.
pub const SYNC_BODY_TO_HEAD: u32 = 0x4232_48AA;

/// Sync tag on frames travelling head→body.
pub const SYNC_HEAD_TO_BODY: u32 = 0x4832_42AA;

/// Largest payload in the type table (a DFU packet).
pub const MAX_PAYLOAD_SIZE: usize = 1028;

/// Largest complete frame.
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD_SIZE + FOOTER_SIZE;

/// Which way a frame travels over the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    BodyToHead,
    HeadToBody,
}

impl Direction {
    /// Sync tag value for this direction.
    #[inline]
    pub fn sync_tag(self) -> u32 {
        match self {
            Direction::BodyToHead => SYNC_BODY_TO_HEAD,
            Direction::HeadToBody => SYNC_HEAD_TO_BODY,
        }
    }

    /// Sync tag as it appears on the wire.
    #[inline]
    pub fn sync_bytes(self) -> [u8; SYNC_SIZE] {
        self.sync_tag().to_ne_bytes()
    }
}

/// The local end of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    /// Application processor.
    Head,
    /// Microcontroller (syscon).
    Body,
}

impl Endpoint {
    /// Direction of frames this endpoint sends.
    #[inline]
    pub fn outbound(self) -> Direction {
        match self {
            Endpoint::Head => Direction::HeadToBody,
            Endpoint::Body => Direction::BodyToHead,
        }
    }

    /// Direction of frames this endpoint receives.
    #[inline]
    pub fn inbound(self) -> Direction {
        match self {
            Endpoint::Head => Direction::BodyToHead,
            Endpoint::Body => Direction::HeadToBody,
        }
    }
}

/// Decoded and validated header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Direction implied by the sync tag.
    pub direction: Direction,
    /// Payload type.
    pub payload_type: PayloadType,
    /// Payload length in bytes.
    pub bytes_to_follow: u16,
}

impl Header {
    /// Build a header whose length comes from the type table.
    ///
    /// Fails when `payload_type` is never sent in `direction`.
    pub fn for_type(payload_type: PayloadType, direction: Direction) -> Result<Self> {
        let len = payload_type.expected_len(direction).ok_or_else(|| {
            SpineError::BadArgument(format!("{} is not sent {:?}", payload_type, direction))
        })?;
        Ok(Self {
            direction,
            payload_type,
            bytes_to_follow: len as u16,
        })
    }

    /// Encode header to bytes (native byte order).
    ///
    /// # Example
    ///
    /// ```
    /// use spine_link::protocol::{Direction, Header, PayloadType};
    ///
    /// let header = Header::for_type(PayloadType::ModeChange, Direction::HeadToBody).unwrap();
    /// assert_eq!(header.encode().len(), 8);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (8 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.direction.sync_bytes());
        buf[4..6].copy_from_slice(&self.payload_type.code().to_ne_bytes());
        buf[6..8].copy_from_slice(&self.bytes_to_follow.to_ne_bytes());
    }

    /// Payload length as `usize`.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.bytes_to_follow as usize
    }

    /// Total frame length implied by this header.
    #[inline]
    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + self.payload_len() + FOOTER_SIZE
    }
}

/// Decode and validate a header received travelling in `inbound`.
///
/// Checks, in order:
/// - the sync tag is the one for `inbound`
/// - the payload type is in the table
/// - `bytes_to_follow` equals the table length for `inbound`
pub fn decode_header(buf: &[u8], inbound: Direction) -> Result<Header> {
    if buf.len() < HEADER_SIZE {
        return Err(SpineError::InvalidHeader(format!(
            "need {} bytes, have {}",
            HEADER_SIZE,
            buf.len()
        )));
    }

    let sync = u32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if sync != inbound.sync_tag() {
        return Err(SpineError::InvalidHeader(format!("bad sync tag {:#010x}", sync)));
    }

    let code = u16::from_ne_bytes([buf[4], buf[5]]);
    let payload_type = PayloadType::from_code(code)
        .ok_or_else(|| SpineError::InvalidHeader(format!("unknown payload type {:#06x}", code)))?;

    let bytes_to_follow = u16::from_ne_bytes([buf[6], buf[7]]);
    match payload_type.expected_len(inbound) {
        Some(len) if len == bytes_to_follow as usize => Ok(Header {
            direction: inbound,
            payload_type,
            bytes_to_follow,
        }),
        Some(len) => Err(SpineError::InvalidHeader(format!(
            "{} length {} (expected {})",
            payload_type, bytes_to_follow, len
        ))),
        None => Err(SpineError::InvalidHeader(format!(
            "{} is not valid {:?}",
            payload_type, inbound
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_header(sync: u32, code: u16, len: u16) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&sync.to_ne_bytes());
        buf[4..6].copy_from_slice(&code.to_ne_bytes());
        buf[6..8].copy_from_slice(&len.to_ne_bytes());
        buf
    }

    #[test]
    fn test_header_encode_decode_roundtrip() {
        let header = Header::for_type(PayloadType::DataFrame, Direction::BodyToHead).unwrap();
        let decoded = decode_header(&header.encode(), Direction::BodyToHead).unwrap();
        assert_eq!(header, decoded);
        assert_eq!(decoded.bytes_to_follow, 732);
    }

    #[test]
    fn test_header_native_byte_order() {
        let header = Header::for_type(PayloadType::Ack, Direction::HeadToBody).unwrap();
        let bytes = header.encode();
        assert_eq!(&bytes[0..4], &SYNC_HEAD_TO_BODY.to_ne_bytes());
        assert_eq!(&bytes[4..6], &0x6b61u16.to_ne_bytes());
        assert_eq!(&bytes[6..8], &4u16.to_ne_bytes());
    }

    #[test]
    fn test_sync_tags_are_distinct() {
        assert_ne!(SYNC_BODY_TO_HEAD, SYNC_HEAD_TO_BODY);
        assert_eq!(Endpoint::Head.outbound(), Endpoint::Body.inbound());
        assert_eq!(Endpoint::Body.outbound(), Endpoint::Head.inbound());
    }

    #[test]
    fn test_wrong_direction_sync_rejected() {
        // A head→body frame looped back to the head must not parse.
        let header = Header::for_type(PayloadType::Shutdown, Direction::HeadToBody).unwrap();
        let result = decode_header(&header.encode(), Direction::BodyToHead);
        assert!(result.unwrap_err().to_string().contains("bad sync tag"));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let buf = raw_header(SYNC_BODY_TO_HEAD, 0x1234, 0);
        let result = decode_header(&buf, Direction::BodyToHead);
        assert!(result.unwrap_err().to_string().contains("unknown payload type"));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        // Head→body data frame length arriving at the head.
        let buf = raw_header(SYNC_BODY_TO_HEAD, PayloadType::DataFrame.code(), 32);
        let result = decode_header(&buf, Direction::BodyToHead);
        assert!(result.unwrap_err().to_string().contains("expected 732"));
    }

    #[test]
    fn test_one_way_type_rejected() {
        let buf = raw_header(SYNC_HEAD_TO_BODY, PayloadType::BootFrame.code(), 4);
        assert!(decode_header(&buf, Direction::HeadToBody).is_err());
    }

    #[test]
    fn test_decode_too_short_buffer() {
        let buf = [0u8; 7];
        assert!(decode_header(&buf, Direction::BodyToHead).is_err());
    }

    #[test]
    fn test_for_type_rejects_one_way_type() {
        assert!(Header::for_type(PayloadType::BootFrame, Direction::HeadToBody).is_err());
        assert!(Header::for_type(PayloadType::BootFrame, Direction::BodyToHead).is_ok());
    }

    #[test]
    fn test_sync_start_never_in_type_or_length_fields() {
        // The leading sync byte must not show up where a resync could
        // mistake a type/length field for the start of a new header.
        for direction in [Direction::BodyToHead, Direction::HeadToBody] {
            let lead = direction.sync_bytes()[0];
            for t in PayloadType::ALL {
                let Some(len) = t.expected_len(direction) else {
                    continue;
                };
                let header = Header::for_type(t, direction).unwrap().encode();
                assert!(!header[4..].contains(&lead), "{} {:?} len {}", t, direction, len);
            }
        }
    }

    #[test]
    fn test_frame_len() {
        let header = Header::for_type(PayloadType::DfuPacket, Direction::HeadToBody).unwrap();
        assert_eq!(header.frame_len(), MAX_FRAME_SIZE);
    }
}
