//! Protocol module - wire format, framing, and frame assembly.
//!
//! This module implements the spine frame protocol:
//! - 8-byte header encoding/decoding and the payload type table
//! - CRC-32 footer over the payload
//! - Sync tag scanning for resynchronization on a lossy stream
//! - Push-model ([`FrameBuffer`]) and pull-model ([`PullAssembler`])
//!   assemblers over one shared extraction core

mod assembler;
mod checksum;
mod frame;
mod frame_buffer;
mod payload_type;
mod pull;
mod rx_buffer;
mod sync;
mod wire_format;

pub use assembler::{AssemblerStats, FrameResult};
pub use checksum::{compute_checksum, verify_footer};
pub use frame::{decode_frame, encode_frame, Frame};
pub use frame_buffer::{FrameBuffer, DEFAULT_RX_CAPACITY};
pub use payload_type::PayloadType;
pub use pull::PullAssembler;
pub use rx_buffer::RxBuffer;
pub use sync::{advance_sync, SyncScanner, SyncSearch};
pub use wire_format::{
    decode_header, Direction, Endpoint, Header, FOOTER_SIZE, HEADER_SIZE, MAX_FRAME_SIZE,
    MAX_PAYLOAD_SIZE, SYNC_BODY_TO_HEAD, SYNC_HEAD_TO_BODY, SYNC_SIZE,
};
