//! Frame extraction core shared by the push and pull assemblers.
//!
//! Works on an [`RxBuffer`] whose front is kept aligned to a sync tag (or a
//! partial one). Each call to [`FrameCore::extract`] makes as much progress
//! as the buffered bytes allow and reports one of:
//! - a complete, verified frame (consumed from the buffer)
//! - `Waiting` with the number of bytes still needed
//! - an invalid header or checksum, after which the buffer has already been
//!   compacted past the bad sync position so scanning can resume

use super::checksum::{compute_checksum, verify_footer};
use super::frame::Frame;
use super::rx_buffer::RxBuffer;
use super::sync::{SyncScanner, SyncSearch};
use super::wire_format::{decode_header, Direction, Header, HEADER_SIZE};
use crate::error::{Result, SpineError};

/// Result of one extraction attempt.
#[derive(Debug)]
pub enum FrameResult {
    /// A complete frame was extracted.
    Frame(Frame),
    /// More bytes are needed; the buffer is aligned to a (partial) sync tag.
    Waiting,
    /// A header or checksum was rejected; the buffer was resynchronized.
    Invalid(SpineError),
}

impl FrameResult {
    /// Take the frame, if any.
    pub fn into_frame(self) -> Option<Frame> {
        match self {
            FrameResult::Frame(frame) => Some(frame),
            _ => None,
        }
    }
}

/// Counters kept by an assembler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblerStats {
    /// Frames successfully extracted.
    pub frames: u64,
    /// Headers rejected (bad type or length).
    pub header_errors: u64,
    /// Frames dropped for a bad checksum.
    pub checksum_errors: u64,
    /// Receive buffer overflows.
    pub overflows: u64,
    /// Bytes thrown away while hunting for a sync tag.
    pub bytes_discarded: u64,
}

/// Step outcome with the byte count the caller should try to supply next.
pub(crate) enum Step {
    Done(FrameResult),
    Need(usize),
}

pub(crate) struct FrameCore {
    rx: RxBuffer,
    inbound: Direction,
    scanner: SyncScanner,
    /// Validated header sitting at offset 0 of `rx`.
    header: Option<Header>,
    /// Where to restart the tag search after a rejected header.
    header_rescan_from: usize,
    stats: AssemblerStats,
}

impl FrameCore {
    pub(crate) fn new(inbound: Direction, capacity: usize, header_rescan_from: usize) -> Self {
        Self {
            rx: RxBuffer::new(capacity),
            inbound,
            scanner: SyncScanner::new(inbound),
            header: None,
            header_rescan_from,
            stats: AssemblerStats::default(),
        }
    }

    pub(crate) fn feed(&mut self, data: &[u8]) -> Result<()> {
        let result = self.rx.extend(data);
        if result.is_err() {
            self.header = None;
            self.stats.overflows += 1;
            tracing::warn!(
                "Spine receive buffer overflow ({} bytes), resetting",
                self.rx.capacity()
            );
        }
        result
    }

    /// Whether a validated header is waiting for its payload.
    #[inline]
    pub(crate) fn has_header(&self) -> bool {
        self.header.is_some()
    }

    pub(crate) fn rx(&self) -> &RxBuffer {
        &self.rx
    }

    pub(crate) fn stats(&self) -> AssemblerStats {
        self.stats
    }

    pub(crate) fn inbound(&self) -> Direction {
        self.inbound
    }

    pub(crate) fn clear(&mut self) {
        self.rx.clear();
        self.header = None;
    }

    /// Drop bytes that cannot start a frame; keep a (partial) tag at offset 0.
    ///
    /// Returns `true` when a full tag now sits at the front.
    fn align(&mut self) -> bool {
        match self.scanner.find(self.rx.as_slice()) {
            SyncSearch::Found(offset) => {
                self.discard(offset);
                true
            }
            SyncSearch::Partial { offset, .. } => {
                self.discard(offset);
                false
            }
            SyncSearch::NotFound => {
                let n = self.rx.len();
                self.discard(n);
                false
            }
        }
    }

    fn discard(&mut self, n: usize) {
        if n > 0 {
            let dropped = self.rx.compact_from(n);
            self.stats.bytes_discarded += dropped as u64;
            tracing::trace!("Spine resync dropped {} bytes", dropped);
        }
    }

    pub(crate) fn extract(&mut self) -> Step {
        let header = match self.header {
            Some(header) => header,
            None => {
                if !self.align() || self.rx.len() < HEADER_SIZE {
                    return Step::Need(HEADER_SIZE - self.rx.len().min(HEADER_SIZE));
                }
                let raw = match self.rx.peek(HEADER_SIZE) {
                    Some(raw) => raw,
                    None => return Step::Need(HEADER_SIZE - self.rx.len()),
                };
                match decode_header(raw, self.inbound) {
                    Ok(header) => {
                        self.header = Some(header);
                        header
                    }
                    Err(err) => {
                        self.stats.header_errors += 1;
                        tracing::debug!("Spine header rejected: {}", err);
                        self.discard(self.header_rescan_from);
                        return Step::Done(FrameResult::Invalid(err));
                    }
                }
            }
        };

        let total = header.frame_len();
        if self.rx.len() < total {
            return Step::Need(total - self.rx.len());
        }

        let payload_end = HEADER_SIZE + header.payload_len();
        let valid = match self.rx.peek(total) {
            Some(raw) => verify_footer(&raw[HEADER_SIZE..payload_end], &raw[payload_end..]),
            None => false,
        };

        self.header = None;

        if !valid {
            self.stats.checksum_errors += 1;
            let err = self.checksum_error(payload_end, total);
            tracing::debug!("Spine {} frame dropped: {}", header.payload_type, err);
            // Restart one byte past the bad frame's sync tag.
            self.discard(1);
            return Step::Done(FrameResult::Invalid(err));
        }

        let raw = self.rx.consume(total);
        self.stats.frames += 1;
        Step::Done(FrameResult::Frame(Frame::new(
            header,
            raw.slice(HEADER_SIZE..payload_end),
        )))
    }

    fn checksum_error(&self, payload_end: usize, total: usize) -> SpineError {
        let all = self.rx.as_slice();
        let footer = &all[payload_end..total];
        SpineError::ChecksumMismatch {
            expected: u32::from_ne_bytes([footer[0], footer[1], footer[2], footer[3]]),
            actual: compute_checksum(&all[HEADER_SIZE..payload_end]),
        }
    }
}
