//! Serial device transport.
//!
//! Opens the UART in non-blocking mode, takes an exclusive lock on it and
//! configures raw 8-N-2 framing at the requested baud rate. Nothing about
//! the line settings is negotiated over the wire.
//!
//! # Example
//!
//! ```ignore
//! use spine_link::transport::open_with_fallback;
//!
//! let port = open_with_fallback("/dev/ttyHS0", "/dev/ttyHSL1", 3_000_000)?;
//! ```

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use nix::sys::termios::{self, BaudRate, ControlFlags, FlushArg, SetArg};

use super::Transport;
use crate::error::{Result, SpineError};

/// Back-off while the kernel TX queue is full.
const WRITE_RETRY_DELAY: Duration = Duration::from_micros(100);

/// An open, configured and exclusively locked serial device.
#[derive(Debug)]
pub struct SerialPort {
    /// Released when the port is dropped.
    file: Flock<File>,
    path: PathBuf,
    baud: u32,
}

impl SerialPort {
    /// Open and configure `path`.
    ///
    /// # Errors
    ///
    /// - `BadArgument` for a baud rate the platform cannot set
    /// - `CannotOpenDevice` if the device node cannot be opened
    /// - `AlreadyOpen` if another owner holds the device lock
    /// - `DeviceConfigFailed` if termios setup fails
    pub fn open(path: impl AsRef<Path>, baud: u32) -> Result<Self> {
        let path = path.as_ref();
        let speed = baud_rate(baud)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(path)
            .map_err(|e| SpineError::CannotOpenDevice(format!("{}: {}", path.display(), e)))?;

        let file = lock_exclusive(file, path)?;

        configure(&file, speed)
            .map_err(|e| SpineError::DeviceConfigFailed(format!("{}: {}", path.display(), e)))?;

        tracing::debug!("Opened spine device {} at {} baud", path.display(), baud);

        Ok(Self {
            file,
            path: path.to_path_buf(),
            baud,
        })
    }

    /// Device path this port was opened on.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configured baud rate.
    pub fn baud(&self) -> u32 {
        self.baud
    }
}

impl Transport for SerialPort {
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.file.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => Ok(0),
            Err(e) => Err(SpineError::Io(e)),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<usize> {
        let mut written = 0;
        while written < bytes.len() {
            match self.file.write(&bytes[written..]) {
                Ok(0) => {
                    return Err(SpineError::Io(std::io::Error::new(
                        ErrorKind::WriteZero,
                        "serial device accepted no bytes",
                    )))
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    std::thread::sleep(WRITE_RETRY_DELAY);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(SpineError::Io(e)),
            }
        }
        Ok(written)
    }
}

/// Open `primary`, falling back to `legacy` if it cannot be opened or
/// configured. Only when both fail is the error returned.
pub fn open_with_fallback(
    primary: impl AsRef<Path>,
    legacy: impl AsRef<Path>,
    baud: u32,
) -> Result<SerialPort> {
    match SerialPort::open(primary.as_ref(), baud) {
        Ok(port) => Ok(port),
        Err(e @ (SpineError::CannotOpenDevice(_) | SpineError::DeviceConfigFailed(_))) => {
            tracing::warn!(
                "Spine device {} unavailable ({}), trying {}",
                primary.as_ref().display(),
                e,
                legacy.as_ref().display()
            );
            SerialPort::open(legacy.as_ref(), baud).map_err(|legacy_err| {
                tracing::error!("Spine legacy device failed: {}", legacy_err);
                legacy_err
            })
        }
        Err(e) => Err(e),
    }
}

fn lock_exclusive(file: File, path: &Path) -> Result<Flock<File>> {
    Flock::lock(file, FlockArg::LockExclusiveNonblock).map_err(|(_, errno)| match errno {
        Errno::EWOULDBLOCK => SpineError::AlreadyOpen(path.display().to_string()),
        other => SpineError::CannotOpenDevice(format!("{}: {}", path.display(), other)),
    })
}

/// Raw mode, 8 data bits, no parity, 2 stop bits, no flow control.
fn configure(file: &File, speed: BaudRate) -> nix::Result<()> {
    let mut tio = termios::tcgetattr(file)?;
    termios::cfmakeraw(&mut tio);
    termios::cfsetspeed(&mut tio, speed)?;

    tio.control_flags &= !(ControlFlags::CSIZE | ControlFlags::PARENB | ControlFlags::CRTSCTS);
    tio.control_flags |=
        ControlFlags::CS8 | ControlFlags::CSTOPB | ControlFlags::CLOCAL | ControlFlags::CREAD;

    termios::tcsetattr(file, SetArg::TCSANOW, &tio)?;
    termios::tcflush(file, FlushArg::TCIOFLUSH)
}

fn baud_rate(baud: u32) -> Result<BaudRate> {
    let rate = match baud {
        9_600 => BaudRate::B9600,
        19_200 => BaudRate::B19200,
        38_400 => BaudRate::B38400,
        57_600 => BaudRate::B57600,
        115_200 => BaudRate::B115200,
        230_400 => BaudRate::B230400,
        #[cfg(target_os = "linux")]
        460_800 => BaudRate::B460800,
        #[cfg(target_os = "linux")]
        921_600 => BaudRate::B921600,
        #[cfg(target_os = "linux")]
        1_000_000 => BaudRate::B1000000,
        #[cfg(target_os = "linux")]
        1_500_000 => BaudRate::B1500000,
        #[cfg(target_os = "linux")]
        2_000_000 => BaudRate::B2000000,
        #[cfg(target_os = "linux")]
        3_000_000 => BaudRate::B3000000,
        #[cfg(target_os = "linux")]
        4_000_000 => BaudRate::B4000000,
        other => {
            return Err(SpineError::BadArgument(format!(
                "unsupported baud rate {}",
                other
            )))
        }
    };
    Ok(rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baud_rate_mapping() {
        assert!(baud_rate(115_200).is_ok());
        assert!(matches!(baud_rate(12_345), Err(SpineError::BadArgument(_))));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_spine_baud_supported() {
        assert!(baud_rate(crate::config::SPINE_BAUD).is_ok());
    }

    #[test]
    fn test_open_missing_device() {
        let result = SerialPort::open("/dev/spine-link-does-not-exist", 115_200);
        assert!(matches!(result, Err(SpineError::CannotOpenDevice(_))));
    }

    #[test]
    fn test_fallback_reports_legacy_failure() {
        let result = open_with_fallback(
            "/dev/spine-link-missing-primary",
            "/dev/spine-link-missing-legacy",
            115_200,
        );
        match result {
            Err(SpineError::CannotOpenDevice(msg)) => assert!(msg.contains("legacy")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_locked_device_is_already_open() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let holder = File::open(file.path()).unwrap();
        let _held = Flock::lock(holder, FlockArg::LockExclusiveNonblock)
            .map_err(|(_, errno)| errno)
            .unwrap();

        let result = SerialPort::open(file.path(), 115_200);
        assert!(matches!(result, Err(SpineError::AlreadyOpen(_))));
    }

    #[test]
    fn test_regular_file_fails_configuration() {
        // A plain file opens and locks fine but is not a tty.
        let file = tempfile::NamedTempFile::new().unwrap();
        let result = SerialPort::open(file.path(), 115_200);
        assert!(matches!(result, Err(SpineError::DeviceConfigFailed(_))));
    }
}
