//! Fixed-capacity receive buffer.
//!
//! All buffer access in the assemblers goes through this type: `peek`,
//! `consume` and `compact_from` are bounds-checked here once, so the
//! resync logic never does raw index arithmetic.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{Result, SpineError};

/// Byte accumulator with a hard capacity.
#[derive(Debug)]
pub struct RxBuffer {
    buf: BytesMut,
    capacity: usize,
}

impl RxBuffer {
    /// Create a buffer that never holds more than `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Append bytes.
    ///
    /// On overflow the buffer is emptied and `BufferOverflow` returned; the
    /// stream is treated as desynchronized rather than grown.
    pub fn extend(&mut self, data: &[u8]) -> Result<()> {
        if self.buf.len() + data.len() > self.capacity {
            self.buf.clear();
            return Err(SpineError::BufferOverflow {
                capacity: self.capacity,
            });
        }
        self.buf.extend_from_slice(data);
        Ok(())
    }

    /// First `n` bytes, if that many are buffered.
    #[inline]
    pub fn peek(&self, n: usize) -> Option<&[u8]> {
        self.buf.get(..n)
    }

    /// All buffered bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Remove and return the first `n` bytes (clamped to what is buffered).
    pub fn consume(&mut self, n: usize) -> Bytes {
        let n = n.min(self.buf.len());
        self.buf.split_to(n).freeze()
    }

    /// Drop everything before `offset`, shifting the rest to the front.
    ///
    /// Returns the number of bytes dropped.
    pub fn compact_from(&mut self, offset: usize) -> usize {
        let n = offset.min(self.buf.len());
        self.buf.advance(n);
        n
    }

    /// Number of buffered bytes (the receive cursor).
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Maximum number of bytes held.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Reset the cursor to 0.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
