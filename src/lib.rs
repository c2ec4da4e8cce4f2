//! # spine-link
//!
//! Framed, checksummed serial protocol between a robot's application
//! processor (the head) and its body microcontroller (syscon).
//!
//! ## Architecture
//!
//! - **Transport**: raw byte pipe ([`transport::SerialPort`] or
//!   [`transport::MemoryTransport`])
//! - **Protocol**: frame codec, sync scanning and the pull/push assemblers
//! - **Payload**: fixed-layout structs carried inside frames
//! - **Spine**: owned duplex driver (write, wait-for-type, send-and-ack)
//! - **HAL**: the head's steady-state cycle on top of it
//!
//! ## Example
//!
//! ```no_run
//! use spine_link::payload::HeadToBody;
//! use spine_link::{Spine, SpineConfig};
//!
//! fn main() -> spine_link::Result<()> {
//!     let mut spine = Spine::open(SpineConfig::default())?;
//!     spine.enter_run_mode()?;
//!
//!     let mut head = HeadToBody::default();
//!     loop {
//!         head.framecounter = head.framecounter.wrapping_add(1);
//!         let body = spine.exchange(&head)?;
//!         println!("battery {}", body.battery.main_voltage);
//!     }
//! }
//! ```

pub mod config;
pub mod error;
pub mod hal;
pub mod payload;
pub mod protocol;
pub mod spine;
pub mod transport;

pub use config::{HalConfig, SpineConfig};
pub use error::{Result, SpineError};
pub use hal::{PowerMode, SpineHal};
pub use protocol::{Direction, Endpoint, Frame, PayloadType};
pub use spine::{AckStatus, LinkStats, RetryBudget, Spine};
