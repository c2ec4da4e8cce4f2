//! Command, reply and update payloads.

use std::borrow::Cow;

use bytes::{Buf, BufMut};

use super::{get_bytes, Payload};
use crate::error::{Result, SpineError};
use crate::protocol::PayloadType;

/// Bytes of console text per contact frame.
pub const CONTACT_TEXT_LEN: usize = 32;

/// Flash words per firmware-update packet.
pub const DFU_MAX_WORDS: usize = 256;

/// Hardware and firmware identity reported by the body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionInfo {
    pub hw_revision: u32,
    pub hw_model: u32,
    /// Electronic identification number.
    pub ein: [u8; 16],
    pub app_version: [u8; 16],
}

impl VersionInfo {
    /// Application version as text, up to the first NUL.
    pub fn app_version_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(until_nul(&self.app_version))
    }
}

impl Payload for VersionInfo {
    const TYPE: PayloadType = PayloadType::Version;
    const LEN: usize = 40;

    fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_u32_ne(self.hw_revision);
        buf.put_u32_ne(self.hw_model);
        buf.put_slice(&self.ein);
        buf.put_slice(&self.app_version);
    }

    fn read_from<B: Buf>(buf: &mut B) -> Self {
        Self {
            hw_revision: buf.get_u32_ne(),
            hw_model: buf.get_u32_ne(),
            ein: get_bytes(buf),
            app_version: get_bytes(buf),
        }
    }
}

/// Acknowledgement for an ack-gated command.
///
/// Non-negative status is an ACK; negative is a NACK carrying an error code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AckMessage {
    pub status: i32,
}

impl AckMessage {
    /// Ack carrying `status`.
    pub fn new(status: i32) -> Self {
        Self { status }
    }

    /// Non-negative status.
    pub fn is_ack(&self) -> bool {
        self.status >= 0
    }
}

impl Payload for AckMessage {
    const TYPE: PayloadType = PayloadType::Ack;
    const LEN: usize = 4;

    fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_i32_ne(self.status);
    }

    fn read_from<B: Buf>(buf: &mut B) -> Self {
        Self {
            status: buf.get_i32_ne(),
        }
    }
}

/// A slice of console text riding on the charge contacts channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContactData {
    pub data: [u8; CONTACT_TEXT_LEN],
}

impl ContactData {
    /// Wrap `text`, NUL padded. Fails if it does not fit.
    pub fn from_text(text: &str) -> Result<Self> {
        let bytes = text.as_bytes();
        if bytes.len() > CONTACT_TEXT_LEN {
            return Err(SpineError::BadArgument(format!(
                "contact text is {} bytes, limit is {}",
                bytes.len(),
                CONTACT_TEXT_LEN
            )));
        }
        let mut data = [0u8; CONTACT_TEXT_LEN];
        data[..bytes.len()].copy_from_slice(bytes);
        Ok(Self { data })
    }

    /// Split arbitrary text into as many frames as it needs.
    ///
    /// Chunks end on `char` boundaries, so each frame holds valid UTF-8.
    pub fn chunks(text: &str) -> Vec<Self> {
        let mut frames = Vec::new();
        let mut rest = text;
        while !rest.is_empty() {
            let mut end = rest.len().min(CONTACT_TEXT_LEN);
            while !rest.is_char_boundary(end) {
                end -= 1;
            }
            let (head, tail) = rest.split_at(end);
            let mut data = [0u8; CONTACT_TEXT_LEN];
            data[..head.len()].copy_from_slice(head.as_bytes());
            frames.push(Self { data });
            rest = tail;
        }
        frames
    }

    /// Text up to the first NUL.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(until_nul(&self.data))
    }
}

impl Payload for ContactData {
    const TYPE: PayloadType = PayloadType::ContactData;
    const LEN: usize = CONTACT_TEXT_LEN;

    fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(&self.data);
    }

    fn read_from<B: Buf>(buf: &mut B) -> Self {
        Self {
            data: get_bytes(buf),
        }
    }
}

/// One flash-write block of a firmware update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DfuPacket {
    /// Destination offset in flash words.
    pub address: u16,
    /// Words of `data` that are meaningful.
    pub word_count: u16,
    pub data: [u32; DFU_MAX_WORDS],
}

impl DfuPacket {
    /// Packet writing `words` at `address`; at most `DFU_MAX_WORDS` words.
    pub fn new(address: u16, words: &[u32]) -> Result<Self> {
        if words.len() > DFU_MAX_WORDS {
            return Err(SpineError::BadArgument(format!(
                "DFU packet holds at most {} words, got {}",
                DFU_MAX_WORDS,
                words.len()
            )));
        }
        let mut data = [0u32; DFU_MAX_WORDS];
        data[..words.len()].copy_from_slice(words);
        Ok(Self {
            address,
            word_count: words.len() as u16,
            data,
        })
    }

    /// The meaningful words.
    pub fn words(&self) -> &[u32] {
        let n = (self.word_count as usize).min(DFU_MAX_WORDS);
        &self.data[..n]
    }
}

impl Payload for DfuPacket {
    const TYPE: PayloadType = PayloadType::DfuPacket;
    const LEN: usize = 4 + 4 * DFU_MAX_WORDS;

    fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_u16_ne(self.address);
        buf.put_u16_ne(self.word_count);
        for word in self.data {
            buf.put_u32_ne(word);
        }
    }

    fn read_from<B: Buf>(buf: &mut B) -> Self {
        let address = buf.get_u16_ne();
        let word_count = buf.get_u16_ne();
        let mut data = [0u32; DFU_MAX_WORDS];
        for word in data.iter_mut() {
            *word = buf.get_u32_ne();
        }
        Self {
            address,
            word_count,
            data,
        }
    }
}

/// Sent by the body's bootloader in place of data frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BootFrame {
    pub button_pressed: bool,
}

impl Payload for BootFrame {
    const TYPE: PayloadType = PayloadType::BootFrame;
    const LEN: usize = 4;

    fn write_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.button_pressed as u8);
        buf.put_bytes(0, 3);
    }

    fn read_from<B: Buf>(buf: &mut B) -> Self {
        let button_pressed = buf.get_u8() != 0;
        buf.advance(3);
        Self { button_pressed }
    }
}

fn until_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}
