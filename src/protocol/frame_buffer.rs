//! Frame buffer for accumulating partial reads (push model).
//!
//! Callers that receive arbitrary-sized chunks append them with
//! [`FrameBuffer::feed`] and pull complete frames out with
//! [`FrameBuffer::try_extract_frame`]. The whole buffered region is scanned
//! for a sync tag, so junk before a frame and bytes after it are both
//! handled: a successful extraction compacts the buffer so that anything
//! that arrived after the frame is kept for the next call.
//!
//! # Example
//!
//! ```
//! use spine_link::protocol::{encode_frame, Direction, FrameBuffer, PayloadType};
//!
//! let mut buffer = FrameBuffer::new(Direction::BodyToHead);
//! let bytes = encode_frame(PayloadType::Ack, Direction::BodyToHead, &[1, 0, 0, 0]).unwrap();
//!
//! // Data arrives in chunks from the serial port
//! let frames = buffer.push(&bytes[..5]).unwrap();
//! assert!(frames.is_empty());
//! let frames = buffer.push(&bytes[5..]).unwrap();
//! assert_eq!(frames.len(), 1);
//! ```

use super::assembler::{AssemblerStats, FrameCore, FrameResult, Step};
use super::wire_format::{Direction, MAX_FRAME_SIZE};
use super::Frame;
use crate::error::Result;

/// Default receive buffer capacity (room for several maximum-size frames).
pub const DEFAULT_RX_CAPACITY: usize = 4 * MAX_FRAME_SIZE;

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    core: FrameCore,
}

impl FrameBuffer {
    /// Create a frame buffer for frames travelling in `inbound`.
    pub fn new(inbound: Direction) -> Self {
        Self::with_capacity(inbound, DEFAULT_RX_CAPACITY)
    }

    /// Create a frame buffer with a custom capacity.
    ///
    /// Capacities below one maximum-size frame are raised to that size.
    pub fn with_capacity(inbound: Direction, capacity: usize) -> Self {
        Self {
            core: FrameCore::new(inbound, capacity.max(MAX_FRAME_SIZE), 1),
        }
    }

    /// Append data to the buffer without extracting frames.
    ///
    /// # Errors
    ///
    /// Returns `BufferOverflow` if the data does not fit; the buffer is then
    /// reset to empty.
    pub fn feed(&mut self, data: &[u8]) -> Result<()> {
        self.core.feed(data)
    }

    /// Try to extract a single frame from the buffered bytes.
    ///
    /// Returns:
    /// - `FrameResult::Frame` with the next complete frame
    /// - `FrameResult::Waiting` if more data is needed
    /// - `FrameResult::Invalid` if a header or checksum was rejected; call
    ///   again, the buffer has been compacted past the bad tag
    pub fn try_extract_frame(&mut self) -> FrameResult {
        match self.core.extract() {
            Step::Done(result) => result,
            Step::Need(_) => FrameResult::Waiting,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Invalid frames are skipped (and counted in [`FrameBuffer::stats`]).
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.feed(data)?;

        let mut frames = Vec::new();
        loop {
            match self.try_extract_frame() {
                FrameResult::Frame(frame) => frames.push(frame),
                FrameResult::Invalid(_) => continue,
                FrameResult::Waiting => break,
            }
        }
        Ok(frames)
    }

    /// Direction of the frames this buffer accepts.
    pub fn inbound(&self) -> Direction {
        self.core.inbound()
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.core.rx().len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.core.rx().is_empty()
    }

    /// Buffer capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.core.rx().capacity()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.core.clear();
    }

    /// Extraction counters.
    pub fn stats(&self) -> AssemblerStats {
        self.core.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SpineError;
    use crate::protocol::{encode_frame, PayloadType, HEADER_SIZE};

    const INBOUND: Direction = Direction::BodyToHead;

    /// Helper to create a valid frame as bytes.
    fn make_frame_bytes(t: PayloadType, fill: u8) -> Vec<u8> {
        let len = t.expected_len(INBOUND).unwrap();
        encode_frame(t, INBOUND, &vec![fill; len]).unwrap()
    }

    fn junk(n: usize) -> Vec<u8> {
        // Never contains the 0xAA / 0x42 tag lead bytes.
        (0..n).map(|i| (i % 0x40) as u8).collect()
    }

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new(INBOUND);
        let frames = buffer.push(&make_frame_bytes(PayloadType::Ack, 7)).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload_type(), PayloadType::Ack);
        assert_eq!(frames[0].payload(), &[7, 7, 7, 7]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut buffer = FrameBuffer::new(INBOUND);

        let mut combined = make_frame_bytes(PayloadType::Version, 1);
        combined.extend(make_frame_bytes(PayloadType::DataFrame, 2));
        combined.extend(make_frame_bytes(PayloadType::Ack, 3));

        let frames = buffer.push(&combined).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].payload_type(), PayloadType::Version);
        assert_eq!(frames[1].payload_type(), PayloadType::DataFrame);
        assert_eq!(frames[2].payload_type(), PayloadType::Ack);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_header() {
        let mut buffer = FrameBuffer::new(INBOUND);
        let bytes = make_frame_bytes(PayloadType::Ack, 0);

        buffer.feed(&bytes[..5]).unwrap();
        assert!(matches!(buffer.try_extract_frame(), FrameResult::Waiting));
        assert_eq!(buffer.len(), 5);

        buffer.feed(&bytes[5..]).unwrap();
        assert!(matches!(buffer.try_extract_frame(), FrameResult::Frame(_)));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_payload() {
        let mut buffer = FrameBuffer::new(INBOUND);
        let bytes = make_frame_bytes(PayloadType::DataFrame, 0x5A);

        let partial_len = HEADER_SIZE + 10;
        assert!(buffer.push(&bytes[..partial_len]).unwrap().is_empty());
        assert_eq!(buffer.len(), partial_len);

        let frames = buffer.push(&bytes[partial_len..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].payload().iter().all(|&b| b == 0x5A));
    }

    #[test]
    fn test_empty_payload() {
        let mut buffer = FrameBuffer::new(INBOUND);
        let frames = buffer.push(&make_frame_bytes(PayloadType::Shutdown, 0)).unwrap();

        assert_eq!(frames.len(), 1);
        assert!(frames[0].payload().is_empty());
        assert_eq!(frames[0].header.bytes_to_follow, 0);
    }

    #[test]
    fn test_every_split_point_yields_one_frame() {
        let bytes = make_frame_bytes(PayloadType::Version, 0x11);
        let expected = FrameBuffer::new(INBOUND).push(&bytes).unwrap();

        for split in 1..bytes.len() {
            let mut buffer = FrameBuffer::new(INBOUND);
            let mut frames = buffer.push(&bytes[..split]).unwrap();
            frames.extend(buffer.push(&bytes[split..]).unwrap());
            assert_eq!(frames, expected, "split at {}", split);
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = FrameBuffer::new(INBOUND);
        let bytes = make_frame_bytes(PayloadType::ContactData, b'x');

        let mut all_frames = Vec::new();
        for byte in &bytes {
            all_frames.extend(buffer.push(&[*byte]).unwrap());
        }

        assert_eq!(all_frames.len(), 1);
        assert_eq!(all_frames[0].payload(), &[b'x'; 32][..]);
    }

    #[test]
    fn test_leading_junk_is_skipped() {
        let mut buffer = FrameBuffer::new(INBOUND);
        let mut data = junk(100);
        data.extend(make_frame_bytes(PayloadType::Ack, 9));

        let frames = buffer.push(&data).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(buffer.stats().bytes_discarded, 100);
    }

    #[test]
    fn test_junk_header_frame_and_partial_tail() {
        let mut buffer = FrameBuffer::new(INBOUND);
        let next = make_frame_bytes(PayloadType::Ack, 0);

        let mut data = junk(4);
        data.extend(make_frame_bytes(PayloadType::ModeChange, 0));
        data.extend_from_slice(&next[..3]);
        buffer.feed(&data).unwrap();

        let frame = buffer.try_extract_frame().into_frame().unwrap();
        assert_eq!(frame.payload_type(), PayloadType::ModeChange);
        assert_eq!(buffer.len(), 3);

        assert!(matches!(buffer.try_extract_frame(), FrameResult::Waiting));
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_bad_checksum_keeps_following_frame() {
        let mut buffer = FrameBuffer::new(INBOUND);

        let mut bad = make_frame_bytes(PayloadType::Version, 4);
        let last = bad.len() - 1;
        bad[last] ^= 0xFF;
        let good = make_frame_bytes(PayloadType::Version, 5);

        buffer.feed(&bad).unwrap();
        buffer.feed(&good).unwrap();

        assert!(matches!(
            buffer.try_extract_frame(),
            FrameResult::Invalid(SpineError::ChecksumMismatch { .. })
        ));
        let frame = buffer.try_extract_frame().into_frame().unwrap();
        assert_eq!(frame.payload(), &[5u8; 40][..]);
        assert!(buffer.is_empty());
        assert_eq!(buffer.stats().checksum_errors, 1);
    }

    #[test]
    fn test_invalid_header_keeps_following_frame() {
        let mut buffer = FrameBuffer::new(INBOUND);

        // Valid sync tag, wrong length for the type.
        let mut bad = make_frame_bytes(PayloadType::Ack, 0);
        bad[6..8].copy_from_slice(&3u16.to_ne_bytes());
        let good = make_frame_bytes(PayloadType::Ack, 1);

        let mut data = bad[..HEADER_SIZE].to_vec();
        data.extend(&good);
        let frames = buffer.push(&data).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), &[1, 1, 1, 1]);
        assert_eq!(buffer.stats().header_errors, 1);
    }

    #[test]
    fn test_partial_frame_realigns_to_tag() {
        let mut buffer = FrameBuffer::new(INBOUND);
        let bytes = make_frame_bytes(PayloadType::DataFrame, 0);

        let mut data = junk(7);
        data.extend_from_slice(&bytes[..HEADER_SIZE + 2]);
        buffer.feed(&data).unwrap();

        assert!(matches!(buffer.try_extract_frame(), FrameResult::Waiting));
        assert_eq!(buffer.len(), HEADER_SIZE + 2);

        buffer.feed(&bytes[HEADER_SIZE + 2..]).unwrap();
        assert!(buffer.try_extract_frame().into_frame().is_some());
    }

    #[test]
    fn test_overflow_resets_to_empty() {
        let mut buffer = FrameBuffer::with_capacity(INBOUND, MAX_FRAME_SIZE);
        let garbage = junk(MAX_FRAME_SIZE - 1);

        buffer.feed(&garbage).unwrap();
        let result = buffer.feed(&garbage);
        assert!(matches!(result, Err(SpineError::BufferOverflow { .. })));
        assert!(buffer.is_empty());
        assert_eq!(buffer.stats().overflows, 1);

        // Still usable.
        let frames = buffer.push(&make_frame_bytes(PayloadType::Ack, 2)).unwrap();
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_wrong_direction_frames_ignored() {
        let mut buffer = FrameBuffer::new(INBOUND);
        let h2b = encode_frame(PayloadType::Ack, Direction::HeadToBody, &[0; 4]).unwrap();
        assert!(buffer.push(&h2b).unwrap().is_empty());
    }

    #[test]
    fn test_clear_resets_state() {
        let mut buffer = FrameBuffer::new(INBOUND);
        let bytes = make_frame_bytes(PayloadType::Ack, 0);

        buffer.push(&bytes[..HEADER_SIZE + 1]).unwrap();
        assert!(!buffer.is_empty());

        buffer.clear();
        assert!(buffer.is_empty());

        // The remaining tail alone is not a frame.
        assert!(buffer.push(&bytes[HEADER_SIZE + 1..]).unwrap().is_empty());
        assert!(buffer.len() < HEADER_SIZE);
    }
}
