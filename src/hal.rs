//! Head-side HAL loop over a [`Spine`].
//!
//! Brings the body into run mode, then trades one [`HeadToBody`] for one
//! [`BodyToHead`] per [`SpineHal::step`]. Console text and version replies
//! arrive interleaved with data frames and are picked off on the way.
//!
//! If the body answers with boot frames instead of data frames its
//! application is missing, and the HAL keeps running on data synthesized
//! from the bootloader's button state so callers still see a frame per
//! cycle.

use std::collections::VecDeque;
use std::thread;

use crate::config::HalConfig;
use crate::error::{Result, SpineError};
use crate::payload::{
    BodyToHead, BootFrame, ContactData, HeadToBody, Payload, VersionInfo, POWER_FLAG_CALM,
};
use crate::protocol::{Frame, PayloadType};
use crate::spine::Spine;
use crate::transport::Transport;

/// Touch level reported for a pressed bootloader button.
const BOOT_BUTTON_PRESSED: u16 = 0xFFFF;

/// Body power mode requested by the head.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PowerMode {
    #[default]
    Active,
    /// Sensors slowed down; the head only refreshes the lights.
    Calm,
}

/// What a received frame meant for the cycle in progress.
enum Dispatch {
    /// Body data was updated; the cycle can end.
    BodyData,
    /// Side-channel frame consumed; keep waiting.
    Consumed,
}

/// Head-side driver for the steady-state spine cycle.
pub struct SpineHal<T: Transport> {
    spine: Spine<T>,
    config: HalConfig,
    body: BodyToHead,
    /// Synthesized data while the body runs its bootloader; zero apart from
    /// the button and mic error words.
    boot_body: BodyToHead,
    version: Option<VersionInfo>,
    valid_syscon: bool,
    power_mode: PowerMode,
    framecounter: u32,
    calm_skip: u32,
    console_in: String,
    console_out: VecDeque<ContactData>,
}

impl<T: Transport> SpineHal<T> {
    /// Put the body in run mode and wait for its first frame.
    pub fn init(spine: Spine<T>, config: &HalConfig) -> Result<Self> {
        config.validate()?;
        let mut hal = Self {
            spine,
            config: config.clone(),
            body: BodyToHead::default(),
            boot_body: BodyToHead::default(),
            version: None,
            valid_syscon: true,
            power_mode: PowerMode::Active,
            framecounter: 0,
            calm_skip: 0,
            console_in: String::new(),
            console_out: VecDeque::new(),
        };

        tracing::debug!("Spine HAL setting run mode");
        hal.spine.enter_run_mode()?;

        let interval = hal.spine.config().poll_interval();
        let max_polls = hal.spine.polls_for(config.first_frame_timeout());
        let mut empty_polls = 0u32;
        for _ in 0..max_polls {
            match hal.spine.read_frame()? {
                Some(frame) => {
                    if let Dispatch::BodyData = hal.dispatch(&frame)? {
                        if !hal.valid_syscon {
                            tracing::warn!("Spine HAL: body is in its bootloader, no valid syscon");
                        }
                        tracing::info!("Spine HAL got first body frame");
                        return Ok(hal);
                    }
                }
                None => {
                    empty_polls += 1;
                    if empty_polls % config.mode_resend_polls == 0 {
                        tracing::debug!("Spine HAL resending run mode");
                        hal.spine.enter_run_mode()?;
                    }
                    thread::sleep(interval);
                }
            }
        }

        tracing::error!(
            "Spine HAL: no body frame within {:?}",
            config.first_frame_timeout()
        );
        Err(SpineError::Timeout("first body frame".into()))
    }

    /// Run one cycle: send `head`, then wait for the body's reply.
    pub fn step(&mut self, head: &mut HeadToBody) -> Result<()> {
        self.framecounter = self.framecounter.wrapping_add(1);
        head.framecounter = self.framecounter;
        match self.power_mode {
            PowerMode::Active => head.power_flags &= !POWER_FLAG_CALM,
            PowerMode::Calm => head.power_flags |= POWER_FLAG_CALM,
        }

        // The bootloader would ack data frames, which nothing here handles.
        if self.valid_syscon {
            if self.version.is_none() {
                self.spine.write_frame(PayloadType::Version, &[])?;
            }
            match self.power_mode {
                PowerMode::Calm => {
                    self.calm_skip += 1;
                    if self.calm_skip >= self.config.calm_skip_frames {
                        self.spine.set_lights(&head.lights)?;
                        self.calm_skip = 0;
                    }
                }
                PowerMode::Active => self.spine.write_payload(head)?,
            }
        }

        while let Some(contact) = self.console_out.pop_front() {
            self.spine.send_contact_text(&contact)?;
        }

        let interval = self.spine.config().poll_interval();
        let max_polls = self.spine.polls_for(self.config.step_timeout());
        for _ in 0..max_polls {
            match self.spine.read_frame()? {
                Some(frame) => {
                    if let Dispatch::BodyData = self.dispatch(&frame)? {
                        return Ok(());
                    }
                }
                None => thread::sleep(interval),
            }
        }

        tracing::error!("Spine HAL step timed out after {:?}", self.config.step_timeout());
        Err(SpineError::Timeout("body data frame".into()))
    }

    fn dispatch(&mut self, frame: &Frame) -> Result<Dispatch> {
        match frame.payload_type() {
            PayloadType::DataFrame => {
                self.body = BodyToHead::from_frame(frame)?;
                if !self.valid_syscon {
                    tracing::info!("Spine HAL: body application started");
                    self.valid_syscon = true;
                }
                Ok(Dispatch::BodyData)
            }
            PayloadType::BootFrame => {
                let boot = BootFrame::from_frame(frame)?;
                if self.valid_syscon && self.framecounter > 0 {
                    tracing::warn!("Spine HAL: body dropped to its bootloader");
                }
                self.valid_syscon = false;
                self.apply_boot_frame(boot);
                Ok(Dispatch::BodyData)
            }
            PayloadType::ContactData => {
                let contact = ContactData::from_frame(frame)?;
                self.console_in.push_str(&contact.text());
                Ok(Dispatch::Consumed)
            }
            PayloadType::Version => {
                let version = VersionInfo::from_frame(frame)?;
                tracing::info!(
                    "Spine HAL syscon version hw {}.{} app {}",
                    version.hw_model,
                    version.hw_revision,
                    version.app_version_str()
                );
                self.version = Some(version);
                Ok(Dispatch::Consumed)
            }
            other => {
                tracing::debug!("Spine HAL ignoring {} frame", other);
                Ok(Dispatch::Consumed)
            }
        }
    }

    /// Fake body data from a bootloader frame.
    ///
    /// Only the button and mic error words carry information. The error
    /// bits flip every frame so stuck-bit detection stays quiet.
    fn apply_boot_frame(&mut self, boot: BootFrame) {
        let boot_body = &mut self.boot_body;
        boot_body.touch_level[1] = if boot.button_pressed {
            BOOT_BUTTON_PRESSED
        } else {
            0
        };
        boot_body.mic_error[0] = !boot_body.mic_error[0];
        boot_body.mic_error[1] = !boot_body.mic_error[1];
        self.body.clone_from(boot_body);
    }

    /// Latest body data.
    pub fn body_data(&self) -> &BodyToHead {
        &self.body
    }

    /// Syscon version, once it has been reported.
    pub fn version(&self) -> Option<&VersionInfo> {
        self.version.as_ref()
    }

    /// False when the body is running its bootloader only.
    pub fn has_valid_syscon(&self) -> bool {
        self.valid_syscon
    }

    /// Console text received since the last call.
    pub fn take_console_text(&mut self) -> String {
        std::mem::take(&mut self.console_in)
    }

    /// Queue console text to go out with the next step.
    pub fn queue_console_text(&mut self, text: &str) {
        self.console_out.extend(ContactData::chunks(text));
    }

    /// Request a body power mode; takes effect on the next step.
    pub fn set_power_mode(&mut self, mode: PowerMode) {
        if mode != self.power_mode {
            tracing::debug!("Spine HAL power mode {:?} -> {:?}", self.power_mode, mode);
            self.power_mode = mode;
            self.calm_skip = 0;
        }
    }

    /// Power mode currently requested.
    pub fn power_mode(&self) -> PowerMode {
        self.power_mode
    }

    /// The link underneath, for commands outside the cycle.
    pub fn spine(&mut self) -> &mut Spine<T> {
        &mut self.spine
    }

    /// Stop driving the link and hand back the spine.
    pub fn into_spine(self) -> Spine<T> {
        self.spine
    }
}
