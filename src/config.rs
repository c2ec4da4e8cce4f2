//! Link and HAL configuration.
//!
//! Both structs deserialize with `#[serde(default)]`, so a config file only
//! needs the fields it changes. Setters follow the builder style:
//!
//! ```
//! use spine_link::{Endpoint, SpineConfig};
//!
//! let config = SpineConfig::default()
//!     .endpoint(Endpoint::Body)
//!     .ack_retries(5);
//! assert!(config.validate().is_ok());
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpineError};
use crate::protocol::{Endpoint, DEFAULT_RX_CAPACITY, MAX_FRAME_SIZE};

/// Primary serial device for the body link.
pub const SPINE_TTY: &str = "/dev/ttyHS0";

/// Device name used by older kernels.
pub const SPINE_TTY_LEGACY: &str = "/dev/ttyHSL1";

/// Line rate of the body link.
pub const SPINE_BAUD: u32 = 3_000_000;

/// Sleep between empty reads, and the timeout quantum.
pub const DEFAULT_POLL_INTERVAL_US: u64 = 500;

/// Default wait for an acknowledgement before resending.
pub const DEFAULT_ACK_TIMEOUT_MS: u64 = 200;

/// Default resend count for ack-gated commands.
pub const DEFAULT_ACK_RETRIES: u32 = 3;

/// Settings for one end of the spine link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpineConfig {
    /// Serial device tried first.
    pub device: PathBuf,
    /// Device tried when the primary cannot be opened or configured.
    pub legacy_device: PathBuf,
    pub baud: u32,
    /// Which side of the link this process is.
    pub endpoint: Endpoint,
    pub poll_interval_us: u64,
    pub ack_timeout_ms: u64,
    pub ack_retries: u32,
    /// Push-model receive buffer size in bytes.
    pub rx_capacity: usize,
}

impl Default for SpineConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from(SPINE_TTY),
            legacy_device: PathBuf::from(SPINE_TTY_LEGACY),
            baud: SPINE_BAUD,
            endpoint: Endpoint::Head,
            poll_interval_us: DEFAULT_POLL_INTERVAL_US,
            ack_timeout_ms: DEFAULT_ACK_TIMEOUT_MS,
            ack_retries: DEFAULT_ACK_RETRIES,
            rx_capacity: DEFAULT_RX_CAPACITY,
        }
    }
}

impl SpineConfig {
    /// Parse from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SpineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SpineError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    /// Set the primary serial device.
    pub fn device(mut self, device: impl Into<PathBuf>) -> Self {
        self.device = device.into();
        self
    }

    /// Set the fallback serial device.
    pub fn legacy_device(mut self, device: impl Into<PathBuf>) -> Self {
        self.legacy_device = device.into();
        self
    }

    /// Set the line rate.
    pub fn baud(mut self, baud: u32) -> Self {
        self.baud = baud;
        self
    }

    /// Set which side of the link this process is.
    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Set the poll interval in microseconds.
    pub fn poll_interval_us(mut self, us: u64) -> Self {
        self.poll_interval_us = us;
        self
    }

    /// Set the wait per ack attempt in milliseconds.
    pub fn ack_timeout_ms(mut self, ms: u64) -> Self {
        self.ack_timeout_ms = ms;
        self
    }

    /// Set how many times ack-gated commands are resent.
    pub fn ack_retries(mut self, retries: u32) -> Self {
        self.ack_retries = retries;
        self
    }

    /// Set the receive buffer size in bytes.
    pub fn rx_capacity(mut self, capacity: usize) -> Self {
        self.rx_capacity = capacity;
        self
    }

    /// Sleep between empty polls.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_us)
    }

    /// Wait per ack attempt.
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    /// Check that the settings describe a usable link.
    pub fn validate(&self) -> Result<()> {
        if self.baud == 0 {
            return Err(SpineError::BadArgument("baud must be non-zero".into()));
        }
        if self.poll_interval_us == 0 {
            return Err(SpineError::BadArgument(
                "poll_interval_us must be non-zero".into(),
            ));
        }
        if self.rx_capacity < MAX_FRAME_SIZE {
            return Err(SpineError::BadArgument(format!(
                "rx_capacity {} is smaller than one frame ({} bytes)",
                self.rx_capacity, MAX_FRAME_SIZE
            )));
        }
        Ok(())
    }
}

/// Timings for the head-side HAL loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HalConfig {
    /// How long `init` waits for the body to start talking.
    pub first_frame_timeout_ms: u64,
    /// Empty polls between run-mode resends during `init`.
    pub mode_resend_polls: u32,
    /// In calm power mode, lights are sent once per this many cycles.
    pub calm_skip_frames: u32,
    /// How long one `step` may wait for the body's frame.
    pub step_timeout_ms: u64,
}

impl Default for HalConfig {
    fn default() -> Self {
        Self {
            first_frame_timeout_ms: 2000,
            mode_resend_polls: 50,
            calm_skip_frames: 12,
            step_timeout_ms: 100,
        }
    }
}

impl HalConfig {
    /// None
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: HalConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set how long `init` waits for the first body frame.
    pub fn first_frame_timeout_ms(mut self, ms: u64) -> Self {
        self.first_frame_timeout_ms = ms;
        self
    }

    /// Set the empty polls between run-mode resends.
    pub fn mode_resend_polls(mut self, polls: u32) -> Self {
        self.mode_resend_polls = polls;
        self
    }

    /// Set the light refresh period in calm mode, in cycles.
    pub fn calm_skip_frames(mut self, frames: u32) -> Self {
        self.calm_skip_frames = frames;
        self
    }

    /// Set how long one step may wait for the body.
    pub fn step_timeout_ms(mut self, ms: u64) -> Self {
        self.step_timeout_ms = ms;
        self
    }

    /// First-frame wait as a `Duration`.
    pub fn first_frame_timeout(&self) -> Duration {
        Duration::from_millis(self.first_frame_timeout_ms)
    }

    /// Per-step wait as a `Duration`.
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    /// None
    pub fn validate(&self) -> Result<()> {
        if self.mode_resend_polls == 0 || self.calm_skip_frames == 0 {
            return Err(SpineError::BadArgument(
                "mode_resend_polls and calm_skip_frames must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_link_constants() {
        let config = SpineConfig::default();
        assert_eq!(config.device, PathBuf::from("/dev/ttyHS0"));
        assert_eq!(config.legacy_device, PathBuf::from("/dev/ttyHSL1"));
        assert_eq!(config.baud, 3_000_000);
        assert_eq!(config.endpoint, Endpoint::Head);
        assert_eq!(config.poll_interval(), Duration::from_micros(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = SpineConfig::from_json_str(r#"{"endpoint": "body", "ack_retries": 7}"#)
            .unwrap();
        assert_eq!(config.endpoint, Endpoint::Body);
        assert_eq!(config.ack_retries, 7);
        assert_eq!(config.baud, SPINE_BAUD);
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let err = SpineConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, SpineError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_small_capacity() {
        let config = SpineConfig::default().rx_capacity(MAX_FRAME_SIZE - 1);
        assert!(matches!(config.validate(), Err(SpineError::BadArgument(_))));

        let err = SpineConfig::from_json_str(r#"{"poll_interval_us": 0}"#).unwrap_err();
        assert!(matches!(err, SpineError::BadArgument(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"device": "/dev/ttyUSB0", "baud": 115200}}"#).unwrap();

        let config = SpineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.device, PathBuf::from("/dev/ttyUSB0"));
        assert_eq!(config.baud, 115_200);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SpineConfig::from_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, SpineError::Config(_)));
    }

    #[test]
    fn test_serde_roundtrip_through_json() {
        let config = SpineConfig::default().endpoint(Endpoint::Body).baud(921_600);
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(SpineConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_hal_config() {
        let hal = HalConfig::from_json_str(r#"{"calm_skip_frames": 4}"#).unwrap();
        assert_eq!(hal.calm_skip_frames, 4);
        assert_eq!(hal.first_frame_timeout(), Duration::from_secs(2));
        assert!(HalConfig::default().mode_resend_polls(0).validate().is_err());
    }
}
