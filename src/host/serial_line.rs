//! Line-control reader over an operating-system serial port.

use std::fmt;

use log::debug;
use serialport::SerialPort;

use crate::{error::Result, line_control::LineControl};

/// Rate the port is opened with where it cannot be opened as is.
#[cfg(not(unix))]
const OPEN_BAUD_RATE: u32 = 9600;

/// A [`LineControl`] reading a serial port of the host.
///
/// The peer's DTR is wired to our DSR on a null-modem link, so DTR is read as
/// DSR. The baud rate is the rate currently configured on the port; opening
/// the port leaves its settings untouched, so a rate set before the (re)open
/// is still reported.
///
/// The port is opened on first use. After any read error it is dropped and
/// opened again on the next read, which covers the device being unplugged
/// and plugged back in between two polls.
pub struct SerialLineControl {
    path: String,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialLineControl {
    pub fn new(path: impl Into<String>) -> Self {
        SerialLineControl {
            path: path.into(),
            port: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        let port = match self.port.take() {
            Some(port) => port,
            None => open_port(&self.path)?,
        };
        Ok(self.port.get_or_insert(port))
    }

    /// Drop the port after a failed read so the next read reopens it.
    fn checked<T>(&mut self, result: serialport::Result<T>) -> Result<T> {
        if result.is_err() {
            debug!("closing {} after read error", self.path);
            self.port = None;
        }
        Ok(result?)
    }
}

impl LineControl for SerialLineControl {
    fn read_dtr(&mut self) -> Result<bool> {
        let result = self.port()?.read_data_set_ready();
        self.checked(result)
    }

    fn read_baud_rate(&mut self) -> Result<u32> {
        let result = self.port()?.baud_rate();
        self.checked(result)
    }
}

impl fmt::Debug for SerialLineControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialLineControl")
            .field("path", &self.path)
            .field("open", &self.port.is_some())
            .finish()
    }
}

/// Open the port, retrying briefly: a device that was just enumerated may not
/// accept being opened right away. The retries stay short since this runs on
/// the work queue.
fn open_port(path: &str) -> serialport::Result<Box<dyn SerialPort>> {
    use retry::{delay, retry_with_index};

    let result = retry_with_index(delay::Fixed::from_millis(10).take(2), |index| {
        debug!("Trying to open {} ({})", path, index);
        open_as_is(path)
    });
    match result {
        Ok(port) => {
            debug!("Opened {}", path);
            Ok(port)
        }
        Err(retry::Error::Operation {
            error,
            total_delay,
            tries,
        }) => {
            debug!(
                "Failed to open {} after {:?} and {} tries: {}",
                path, total_delay, tries, error
            );
            Err(error)
        }
        Err(retry::Error::Internal(msg)) => Err(serialport::Error::new(
            serialport::ErrorKind::Unknown,
            format!("internal error while retrying to open the port: {}", msg),
        )),
    }
}

/// Open a tty without applying any termios settings. `serialport::new(..)`
/// would reconfigure the line, overwriting the rate set by the peer.
#[cfg(unix)]
fn open_as_is(path: &str) -> serialport::Result<Box<dyn SerialPort>> {
    use std::fs::OpenOptions;
    use std::os::unix::{
        fs::OpenOptionsExt,
        io::{FromRawFd, IntoRawFd},
    };

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
        .open(path)?;
    // The descriptor is owned by `file` and handed over to the port here.
    let mut port = unsafe { serialport::TTYPort::from_raw_fd(file.into_raw_fd()) };
    // Keep the peer side free to reopen the line.
    port.set_exclusive(false)?;
    Ok(Box::new(port))
}

#[cfg(not(unix))]
fn open_as_is(path: &str) -> serialport::Result<Box<dyn SerialPort>> {
    serialport::new(path, OPEN_BAUD_RATE)
        .timeout(std::time::Duration::from_millis(10))
        .open()
}
