//! Byte-at-a-time frame assembly (pull model).
//!
//! [`PullAssembler::read_frame`] draws bytes from a [`Transport`] itself:
//! one byte at a time until a valid header has formed, then the rest of the
//! frame in as few reads as the transport allows. It never blocks; when the
//! transport has nothing more it returns `Ok(None)` and keeps its partial
//! state for the next call, so it can sit in a spin-poll loop.
//!
//! A rejected header is rescanned only from its length field (the last two
//! bytes), since those could already be the start of the next sync tag. A
//! bad checksum restarts the search one byte past the bad frame's tag.

use super::assembler::{AssemblerStats, FrameCore, FrameResult, Step};
use super::wire_format::{Direction, HEADER_SIZE, MAX_FRAME_SIZE};
use super::Frame;
use crate::error::Result;
use crate::transport::Transport;

/// Pull-model assembler over a fixed frame-sized buffer.
pub struct PullAssembler {
    core: FrameCore,
}

impl PullAssembler {
    /// Create an assembler for frames travelling in `inbound`.
    pub fn new(inbound: Direction) -> Self {
        Self::with_capacity(inbound, MAX_FRAME_SIZE)
    }

    /// Create an assembler with a larger receive buffer.
    ///
    /// Capacity below one maximum frame is raised to it.
    pub fn with_capacity(inbound: Direction, capacity: usize) -> Self {
        Self {
            core: FrameCore::new(inbound, capacity.max(MAX_FRAME_SIZE), HEADER_SIZE - 2),
        }
    }

    /// Read at most one frame from `transport`.
    ///
    /// Returns `Ok(None)` once the transport has no more bytes and no frame
    /// is complete. Invalid headers and bad checksums are counted and
    /// recovered from here; they never surface as errors.
    pub fn read_frame<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<Option<Frame>> {
        let mut scratch = [0u8; MAX_FRAME_SIZE];
        loop {
            let needed = match self.core.extract() {
                Step::Done(FrameResult::Frame(frame)) => return Ok(Some(frame)),
                Step::Done(FrameResult::Invalid(_)) => continue,
                Step::Done(FrameResult::Waiting) => 1,
                Step::Need(n) => n,
            };

            // Grow the header window byte by byte; bulk-read once it is valid.
            let want = if self.core.has_header() { needed } else { 1 };
            let n = transport.read_nonblocking(&mut scratch[..want])?;
            if n == 0 {
                return Ok(None);
            }
            self.core.feed(&scratch[..n])?;
        }
    }

    /// Bytes accumulated toward the frame being assembled.
    pub fn cursor(&self) -> usize {
        self.core.rx().len()
    }

    /// Drop any partial frame.
    pub fn reset(&mut self) {
        self.core.clear();
    }

    /// Extraction counters.
    pub fn stats(&self) -> AssemblerStats {
        self.core.stats()
    }
}
