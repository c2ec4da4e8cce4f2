//! Error types for spine-link.

use thiserror::Error;

use crate::protocol::PayloadType;

/// Main error type for all spine operations.
#[derive(Debug, Error)]
pub enum SpineError {
    /// Neither the primary nor the legacy device could be opened.
    #[error("Cannot open device: {0}")]
    CannotOpenDevice(String),

    /// The device opened but termios configuration failed.
    #[error("Device configuration failed: {0}")]
    DeviceConfigFailed(String),

    /// Another owner already holds the device.
    #[error("Device already open: {0}")]
    AlreadyOpen(String),

    /// Bad sync tag, unknown payload type or length mismatch.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Footer checksum does not match the payload.
    #[error("Checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// Push-model feed exceeded the receive buffer capacity.
    #[error("Receive buffer overflow ({capacity} bytes)")]
    BufferOverflow { capacity: usize },

    /// No matching frame arrived in time.
    #[error("Timed out waiting for {0}")]
    Timeout(String),

    /// A well-formed frame of a type the caller did not ask for.
    #[error("Unexpected frame type: wanted {wanted:?}, got {got:?}")]
    UnexpectedFrameType { wanted: PayloadType, got: PayloadType },

    /// Caller passed something the protocol cannot carry.
    #[error("Bad argument: {0}")]
    BadArgument(String),

    /// Configuration could not be loaded or is inconsistent.
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error on the underlying byte channel.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for SpineError {
    fn from(err: serde_json::Error) -> Self {
        SpineError::Config(err.to_string())
    }
}

/// Result type alias using SpineError.
pub type Result<T> = std::result::Result<T, SpineError>;
