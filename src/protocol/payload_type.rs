//! Payload type codes and the direction-dependent length table.
//!
//! Every frame carries a 2-byte type code. The code alone does not fix the
//! payload length: a data frame sent head→body is much smaller than the one
//! the body returns. A header is only accepted when its `bytes_to_follow`
//! matches the table entry for the direction it travels in.

use super::wire_format::Direction;

/// Known payload types. Discriminants are the on-wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum PayloadType {
    /// Periodic sensor/actuator telemetry.
    DataFrame = 0x6466,
    /// Console text for the charge-contact commander.
    ContactData = 0x6364,
    /// Switch the body into run mode.
    ModeChange = 0x6d64,
    /// Version query (empty outbound, version record inbound).
    Version = 0x7276,
    /// Signed status acknowledgement.
    Ack = 0x6b61,
    /// Erase the application flash region.
    Erase = 0x7878,
    /// Validate a freshly written image.
    Validate = 0x7374,
    /// One flash-write block.
    DfuPacket = 0x6675,
    /// Power down the body.
    Shutdown = 0x7a7a,
    /// Backpack light state only (calm power mode).
    LightState = 0x6c6c,
    /// Bootloader stub frame, sent when no valid application is present.
    BootFrame = 0x6662,
}

const HEAD_TO_BODY_DATA_LEN: usize = 32;
const BODY_TO_HEAD_DATA_LEN: usize = 732;
const CONTACT_DATA_LEN: usize = 32;
const VERSION_INFO_LEN: usize = 40;
const ACK_LEN: usize = 4;
const DFU_PACKET_LEN: usize = 1028;
const LIGHT_STATE_LEN: usize = 16;
const BOOT_FRAME_LEN: usize = 4;

impl PayloadType {
    /// All payload types, in code order of the table above.
    pub const ALL: [PayloadType; 11] = [
        PayloadType::DataFrame,
        PayloadType::ContactData,
        PayloadType::ModeChange,
        PayloadType::Version,
        PayloadType::Ack,
        PayloadType::Erase,
        PayloadType::Validate,
        PayloadType::DfuPacket,
        PayloadType::Shutdown,
        PayloadType::LightState,
        PayloadType::BootFrame,
    ];

    /// On-wire type code.
    #[inline]
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Look up a type by its wire code.
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.code() == code)
    }

    /// Expected payload length for a frame travelling in `direction`.
    ///
    /// `None` means the type is never sent that way; such headers are invalid.
    pub fn expected_len(self, direction: Direction) -> Option<usize> {
        use Direction::*;
        use PayloadType::*;

        match (self, direction) {
            (DataFrame, HeadToBody) => Some(HEAD_TO_BODY_DATA_LEN),
            (DataFrame, BodyToHead) => Some(BODY_TO_HEAD_DATA_LEN),
            (ContactData, _) => Some(CONTACT_DATA_LEN),
            (Version, HeadToBody) => Some(0),
            (Version, BodyToHead) => Some(VERSION_INFO_LEN),
            (Ack, _) => Some(ACK_LEN),
            (DfuPacket, _) => Some(DFU_PACKET_LEN),
            (ModeChange, _) | (Erase, _) | (Validate, _) | (Shutdown, _) => Some(0),
            (LightState, HeadToBody) => Some(LIGHT_STATE_LEN),
            (LightState, BodyToHead) => None,
            (BootFrame, BodyToHead) => Some(BOOT_FRAME_LEN),
            (BootFrame, HeadToBody) => None,
        }
    }

    /// Two-letter mnemonic used in log lines ("df", "vr", ...).
    pub fn mnemonic(self) -> [u8; 2] {
        self.code().to_be_bytes()
    }
}

impl std::fmt::Display for PayloadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b] = self.mnemonic();
        write!(f, "{:?}({}{})", self, a as char, b as char)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MAX_PAYLOAD_SIZE;

    #[test]
    fn test_from_code_roundtrip() {
        for t in PayloadType::ALL {
            assert_eq!(PayloadType::from_code(t.code()), Some(t));
        }
        assert_eq!(PayloadType::from_code(0x0000), None);
        assert_eq!(PayloadType::from_code(0xFFFF), None);
    }

    #[test]
    fn test_codes_are_distinct() {
        for (i, a) in PayloadType::ALL.iter().enumerate() {
            for b in &PayloadType::ALL[i + 1..] {
                assert_ne!(a.code(), b.code());
            }
        }
    }

    #[test]
    fn test_data_frame_length_is_direction_dependent() {
        let h2b = PayloadType::DataFrame.expected_len(Direction::HeadToBody);
        let b2h = PayloadType::DataFrame.expected_len(Direction::BodyToHead);
        assert_eq!(h2b, Some(32));
        assert_eq!(b2h, Some(732));
    }

    #[test]
    fn test_version_query_empty_outbound() {
        assert_eq!(PayloadType::Version.expected_len(Direction::HeadToBody), Some(0));
        assert_eq!(PayloadType::Version.expected_len(Direction::BodyToHead), Some(40));
    }

    #[test]
    fn test_one_way_types() {
        assert_eq!(PayloadType::BootFrame.expected_len(Direction::HeadToBody), None);
        assert_eq!(PayloadType::LightState.expected_len(Direction::BodyToHead), None);
    }

    #[test]
    fn test_no_entry_exceeds_max_payload() {
        for t in PayloadType::ALL {
            for d in [Direction::HeadToBody, Direction::BodyToHead] {
                if let Some(len) = t.expected_len(d) {
                    assert!(len <= MAX_PAYLOAD_SIZE, "{} {:?}", t, d);
                }
            }
        }
    }

    #[test]
    fn test_display_mnemonic() {
        assert_eq!(PayloadType::DataFrame.to_string(), "DataFrame(df)");
        assert_eq!(PayloadType::Shutdown.to_string(), "Shutdown(zz)");
    }
}
