//! Transport module - the raw byte channel under the protocol.
//!
//! Provides:
//! - [`Transport`], the non-blocking read / blocking write contract the
//!   assemblers and the duplex driver are written against
//! - [`SerialPort`], the UART between head and body (Unix only)
//! - [`MemoryTransport`], an in-memory duplex pair for tests and simulation

mod memory;
#[cfg(unix)]
mod serial;

pub use memory::MemoryTransport;
#[cfg(unix)]
pub use serial::{open_with_fallback, SerialPort};

use crate::error::Result;

/// A raw, unframed byte pipe to the other endpoint.
pub trait Transport {
    /// Read whatever is available without blocking.
    ///
    /// "Would block" is not an error: it returns `Ok(0)`.
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write every byte, returning the number written.
    fn write_all(&mut self, bytes: &[u8]) -> Result<usize>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read_nonblocking(buf)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<usize> {
        (**self).write_all(bytes)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read_nonblocking(buf)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<usize> {
        (**self).write_all(bytes)
    }
}
