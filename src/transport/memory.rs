//! In-memory transport.
//!
//! A duplex byte pipe built from two shared queues. [`MemoryTransport::pair`]
//! gives the two ends of one link (e.g. a simulated body for a head-side
//! [`Spine`](crate::Spine)); a lone [`MemoryTransport::new`] can be fed with
//! [`inject`](MemoryTransport::inject) and drained with
//! [`take_written`](MemoryTransport::take_written).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use super::Transport;
use crate::error::Result;

type Queue = Arc<Mutex<VecDeque<u8>>>;

fn lock(queue: &Queue) -> MutexGuard<'_, VecDeque<u8>> {
    queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One end of an in-memory link.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    rx: Queue,
    tx: Queue,
    /// Upper bound on bytes returned per read, to exercise partial reads.
    max_read: usize,
}

impl MemoryTransport {
    /// A standalone end whose peer is the test itself.
    pub fn new() -> Self {
        Self {
            rx: Queue::default(),
            tx: Queue::default(),
            max_read: usize::MAX,
        }
    }

    /// Two connected ends: what one writes, the other reads.
    pub fn pair() -> (Self, Self) {
        let a_to_b = Queue::default();
        let b_to_a = Queue::default();
        let a = Self {
            rx: b_to_a.clone(),
            tx: a_to_b.clone(),
            max_read: usize::MAX,
        };
        let b = Self {
            rx: a_to_b,
            tx: b_to_a,
            max_read: usize::MAX,
        };
        (a, b)
    }

    /// Limit how many bytes a single read may return.
    pub fn with_max_read(mut self, max_read: usize) -> Self {
        self.max_read = max_read.max(1);
        self
    }

    /// Queue bytes to be read from this end.
    pub fn inject(&self, bytes: &[u8]) {
        lock(&self.rx).extend(bytes);
    }

    /// Drain everything written from this end so far.
    pub fn take_written(&self) -> Vec<u8> {
        lock(&self.tx).drain(..).collect()
    }

    /// Bytes waiting to be read from this end.
    pub fn pending(&self) -> usize {
        lock(&self.rx).len()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MemoryTransport {
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut rx = lock(&self.rx);
        let n = buf.len().min(rx.len()).min(self.max_read);
        for (slot, byte) in buf.iter_mut().zip(rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<usize> {
        lock(&self.tx).extend(bytes);
        Ok(bytes.len())
    }
}
