//! Duplex driver - one owned handle per link.
//!
//! [`Spine`] owns the transport and the pull assembler; every operation
//! borrows it mutably, so there is exactly one reader of the receive buffer.
//! Waiting is a spin-poll over non-blocking reads that sleeps one poll
//! interval after each empty read. Nothing else suspends.
//!
//! Two patterns sit on top of frame assembly:
//! - request/response: [`Spine::send_and_await_ack`] resends a command until
//!   an ack arrives or the retry budget is spent
//! - steady state: [`Spine::exchange`] writes one data frame and waits for
//!   the body's data frame, with no acknowledgement beyond the checksum

use std::thread;
use std::time::Duration;

use crate::config::SpineConfig;
use crate::error::{Result, SpineError};
use crate::payload::{
    AckMessage, BodyToHead, ContactData, DfuPacket, HeadToBody, LightState, Payload, VersionInfo,
};
use crate::protocol::{encode_frame, Endpoint, Frame, PayloadType, PullAssembler};
use crate::transport::Transport;

/// Outcome of an ack-gated command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    /// Accepted, with the peer's non-negative status.
    Ack(i32),
    /// Rejected, with the peer's error code.
    Nack(i32),
}

impl AckStatus {
    /// Whether the peer accepted the command.
    pub fn is_ack(self) -> bool {
        matches!(self, AckStatus::Ack(_))
    }
}

impl From<AckMessage> for AckStatus {
    fn from(msg: AckMessage) -> Self {
        if msg.is_ack() {
            AckStatus::Ack(msg.status)
        } else {
            AckStatus::Nack(msg.status)
        }
    }
}

/// Errors and resends since the last good frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryBudget {
    /// Rejected headers, bad checksums and timeouts.
    pub error_count: u32,
    /// Commands resent for lack of an ack.
    pub retry_count: u32,
}

/// Link counters since the handle was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub frames_received: u64,
    pub frames_sent: u64,
    pub header_errors: u64,
    pub checksum_errors: u64,
    pub overflows: u64,
    /// Well-formed frames dropped because nobody was waiting for their type.
    pub discarded_frames: u64,
    pub timeouts: u64,
    pub budget: RetryBudget,
}

/// An open spine link.
pub struct Spine<T: Transport> {
    transport: T,
    assembler: PullAssembler,
    config: SpineConfig,
    frames_sent: u64,
    frames_received: u64,
    discarded_frames: u64,
    timeouts: u64,
    budget: RetryBudget,
}

#[cfg(unix)]
impl Spine<crate::transport::SerialPort> {
    /// Open the configured serial device, falling back to the legacy path.
    pub fn open(config: SpineConfig) -> Result<Self> {
        config.validate()?;
        let port = crate::transport::open_with_fallback(
            &config.device,
            &config.legacy_device,
            config.baud,
        )?;
        tracing::info!(
            "Spine open on {} at {} baud as {:?}",
            port.path().display(),
            port.baud(),
            config.endpoint
        );
        Self::new(port, config)
    }
}

impl<T: Transport> Spine<T> {
    /// Drive the link over an already opened transport.
    pub fn new(transport: T, config: SpineConfig) -> Result<Self> {
        config.validate()?;
        let assembler = PullAssembler::with_capacity(config.endpoint.inbound(), config.rx_capacity);
        Ok(Self {
            transport,
            assembler,
            config,
            frames_sent: 0,
            frames_received: 0,
            discarded_frames: 0,
            timeouts: 0,
            budget: RetryBudget::default(),
        })
    }

    /// Which side of the link this handle drives.
    pub fn endpoint(&self) -> Endpoint {
        self.config.endpoint
    }

    /// Settings the link was opened with.
    pub fn config(&self) -> &SpineConfig {
        &self.config
    }

    /// Direct access to the underlying transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give back the transport.
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Encode and send one frame in this endpoint's outbound direction.
    pub fn write_frame(&mut self, payload_type: PayloadType, payload: &[u8]) -> Result<()> {
        let bytes = encode_frame(payload_type, self.config.endpoint.outbound(), payload)?;
        self.transport.write_all(&bytes)?;
        self.frames_sent += 1;
        tracing::trace!("Spine sent {} ({} bytes)", payload_type, bytes.len());
        Ok(())
    }

    /// Send a typed payload.
    pub fn write_payload<P: Payload>(&mut self, payload: &P) -> Result<()> {
        self.write_frame(P::TYPE, &payload.encode())
    }

    /// Poll once for a complete frame without waiting.
    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        let before = self.assembler.stats();
        let result = self.assembler.read_frame(&mut self.transport);
        let after = self.assembler.stats();

        let errors = (after.header_errors - before.header_errors)
            + (after.checksum_errors - before.checksum_errors)
            + (after.overflows - before.overflows);
        self.budget.error_count = self.budget.error_count.saturating_add(errors as u32);

        let frame = result?;
        if let Some(frame) = &frame {
            self.frames_received += 1;
            self.budget = RetryBudget::default();
            tracing::trace!("Spine received {}", frame.payload_type());
        }
        Ok(frame)
    }

    /// Poll until `accept` takes a frame or `timeout` worth of polls pass.
    ///
    /// Frames `accept` declines are dropped and count as unsuccessful polls,
    /// so a peer flooding other types cannot stall the caller forever.
    pub fn poll_frames<F>(&mut self, timeout: Duration, mut accept: F) -> Result<Frame>
    where
        F: FnMut(&Frame) -> bool,
    {
        let max_polls = self.polls_for(timeout);
        let mut polls = 0u64;
        loop {
            match self.read_frame()? {
                Some(frame) if accept(&frame) => return Ok(frame),
                Some(frame) => {
                    self.discarded_frames += 1;
                    tracing::debug!("Spine passed over {} frame", frame.payload_type());
                }
                None => {
                    if polls + 1 < max_polls {
                        thread::sleep(self.config.poll_interval());
                    }
                }
            }

            polls += 1;
            if polls >= max_polls {
                self.timeouts += 1;
                self.budget.error_count = self.budget.error_count.saturating_add(1);
                return Err(SpineError::Timeout(format!("frame after {:?}", timeout)));
            }
        }
    }

    /// Wait for a frame of `wanted`, dropping any other type.
    pub fn get_frame_with_timeout(&mut self, wanted: PayloadType, timeout: Duration) -> Result<Frame> {
        self.poll_frames(timeout, |frame| frame.is(wanted))
            .map_err(|err| match err {
                SpineError::Timeout(_) => {
                    SpineError::Timeout(format!("{} after {:?}", wanted, timeout))
                }
                other => other,
            })
    }

    /// Wait for the next frame and require it to be `wanted`.
    ///
    /// Any other well-formed frame is reported as [`SpineError::UnexpectedFrameType`].
    pub fn expect_frame(&mut self, wanted: PayloadType, timeout: Duration) -> Result<Frame> {
        let frame = self.poll_frames(timeout, |_| true)?;
        if frame.is(wanted) {
            Ok(frame)
        } else {
            tracing::warn!("Spine expected {}, got {}", wanted, frame.payload_type());
            Err(SpineError::UnexpectedFrameType {
                wanted,
                got: frame.payload_type(),
            })
        }
    }

    /// Send a command and wait for its ack, resending up to `retries` times.
    pub fn send_and_await_ack(
        &mut self,
        payload_type: PayloadType,
        payload: &[u8],
        retries: u32,
    ) -> Result<AckStatus> {
        let timeout = self.config.ack_timeout();
        for attempt in 0..=retries {
            if attempt > 0 {
                self.budget.retry_count = self.budget.retry_count.saturating_add(1);
                tracing::warn!(
                    "Spine resending {} (retry {}/{})",
                    payload_type,
                    attempt,
                    retries
                );
            }
            self.write_frame(payload_type, payload)?;
            match self.get_frame_with_timeout(PayloadType::Ack, timeout) {
                Ok(frame) => {
                    let status = AckStatus::from(AckMessage::from_frame(&frame)?);
                    if !status.is_ack() {
                        tracing::warn!("Spine {} rejected: {:?}", payload_type, status);
                    }
                    return Ok(status);
                }
                Err(SpineError::Timeout(_)) => continue,
                Err(err) => return Err(err),
            }
        }
        tracing::error!("Spine gave up on {} after {} attempts", payload_type, retries + 1);
        Err(SpineError::Timeout(format!(
            "ack for {} after {} attempts",
            payload_type,
            retries + 1
        )))
    }

    /// Put the body in run mode; it answers with data frames, not an ack.
    pub fn enter_run_mode(&mut self) -> Result<()> {
        self.write_frame(PayloadType::ModeChange, &[])
    }

    /// Ask the body for its version record.
    pub fn request_version(&mut self, retries: u32) -> Result<VersionInfo> {
        let timeout = self.config.ack_timeout();
        for attempt in 0..=retries {
            if attempt > 0 {
                self.budget.retry_count = self.budget.retry_count.saturating_add(1);
                tracing::warn!("Spine re-requesting version (retry {}/{})", attempt, retries);
            }
            self.write_frame(PayloadType::Version, &[])?;
            match self.get_frame_with_timeout(PayloadType::Version, timeout) {
                Ok(frame) => return VersionInfo::from_frame(&frame),
                Err(SpineError::Timeout(_)) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(SpineError::Timeout(format!(
            "version after {} attempts",
            retries + 1
        )))
    }

    /// Erase the body's application flash.
    pub fn erase(&mut self) -> Result<AckStatus> {
        self.send_and_await_ack(PayloadType::Erase, &[], self.config.ack_retries)
    }

    /// Ask the bootloader to validate the written image.
    pub fn validate(&mut self) -> Result<AckStatus> {
        self.send_and_await_ack(PayloadType::Validate, &[], self.config.ack_retries)
    }

    /// Write one firmware block.
    pub fn write_dfu_packet(&mut self, packet: &DfuPacket) -> Result<AckStatus> {
        self.send_and_await_ack(
            PayloadType::DfuPacket,
            &packet.encode(),
            self.config.ack_retries,
        )
    }

    /// Tell the body to power down.
    pub fn shutdown(&mut self) -> Result<()> {
        self.write_frame(PayloadType::Shutdown, &[])
    }

    /// Send backpack light colors on their own.
    pub fn set_lights(&mut self, lights: &LightState) -> Result<()> {
        self.write_payload(lights)
    }

    /// Send one frame of console text.
    pub fn send_contact_text(&mut self, contact: &ContactData) -> Result<()> {
        self.write_payload(contact)
    }

    /// Reply to a command (body side).
    pub fn send_ack(&mut self, status: i32) -> Result<()> {
        self.write_payload(&AckMessage::new(status))
    }

    /// One steady-state cycle: send actuators, wait for sensors.
    pub fn exchange(&mut self, head: &HeadToBody) -> Result<BodyToHead> {
        self.write_payload(head)?;
        let frame = self.get_frame_with_timeout(PayloadType::DataFrame, self.config.ack_timeout())?;
        BodyToHead::from_frame(&frame)
    }

    /// Drop any partially assembled frame.
    pub fn reset_receive(&mut self) {
        self.assembler.reset();
    }

    /// Snapshot of the link counters and the current retry budget.
    pub fn stats(&self) -> LinkStats {
        let asm = self.assembler.stats();
        LinkStats {
            frames_received: self.frames_received,
            frames_sent: self.frames_sent,
            header_errors: asm.header_errors,
            checksum_errors: asm.checksum_errors,
            overflows: asm.overflows,
            discarded_frames: self.discarded_frames,
            timeouts: self.timeouts,
            budget: self.budget,
        }
    }

    /// Number of polls that fit in `timeout`, at least one.
    pub(crate) fn polls_for(&self, timeout: Duration) -> u64 {
        let interval = self.config.poll_interval().as_micros().max(1);
        ((timeout.as_micros() / interval) as u64).max(1)
    }
}
