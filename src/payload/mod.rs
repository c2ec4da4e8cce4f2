//! Payload module - fixed-layout structs carried inside frames.
//!
//! Every struct is read and written field by field at fixed offsets in the
//! platform's native byte order, through [`bytes::Buf`] / [`bytes::BufMut`].
//! There is no reinterpretation of one struct's storage as another.
//!
//! # Example
//!
//! ```
//! use spine_link::payload::{AckMessage, Payload};
//!
//! let ack = AckMessage::new(-3);
//! let bytes = ack.encode();
//! assert_eq!(bytes.len(), AckMessage::LEN);
//! assert_eq!(AckMessage::decode(&bytes).unwrap(), ack);
//! ```

mod data_frame;
mod messages;

pub use data_frame::{
    BatteryState, BodyToHead, HeadToBody, LightState, MotorState, RangeData, CLIFF_COUNT,
    LED_COUNT, MIC_SAMPLES, MOTOR_COUNT, POWER_FLAG_CALM,
};
pub use messages::{
    AckMessage, BootFrame, ContactData, DfuPacket, VersionInfo, CONTACT_TEXT_LEN, DFU_MAX_WORDS,
};

use bytes::{Buf, BufMut};

use crate::error::{Result, SpineError};
use crate::protocol::{Frame, PayloadType};

/// A struct with a fixed wire layout for one payload type.
pub trait Payload: Sized {
    /// Payload type code this struct travels under.
    const TYPE: PayloadType;
    /// Encoded length in bytes.
    const LEN: usize;

    /// Append exactly `LEN` bytes.
    fn write_to<B: BufMut>(&self, buf: &mut B);

    /// Read exactly `LEN` bytes. The caller guarantees they are present.
    fn read_from<B: Buf>(buf: &mut B) -> Self;

    /// Encode into a fresh buffer.
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::LEN);
        self.write_to(&mut out);
        out
    }

    /// Decode from a payload slice of exactly `LEN` bytes.
    fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::LEN {
            return Err(SpineError::BadArgument(format!(
                "{} payload must be {} bytes, got {}",
                Self::TYPE,
                Self::LEN,
                bytes.len()
            )));
        }
        let mut buf = bytes;
        Ok(Self::read_from(&mut buf))
    }

    /// Decode the payload of `frame`, checking its type first.
    fn from_frame(frame: &Frame) -> Result<Self> {
        let got = frame.payload_type();
        if got != Self::TYPE {
            return Err(SpineError::UnexpectedFrameType {
                wanted: Self::TYPE,
                got,
            });
        }
        Self::decode(frame.payload())
    }
}

fn get_bytes<B: Buf, const N: usize>(buf: &mut B) -> [u8; N] {
    let mut out = [0u8; N];
    buf.copy_to_slice(&mut out);
    out
}

fn get_u16s<B: Buf, const N: usize>(buf: &mut B) -> [u16; N] {
    let mut out = [0u16; N];
    for v in out.iter_mut() {
        *v = buf.get_u16_ne();
    }
    out
}

fn get_i16s<B: Buf, const N: usize>(buf: &mut B) -> [i16; N] {
    let mut out = [0i16; N];
    for v in out.iter_mut() {
        *v = buf.get_i16_ne();
    }
    out
}
