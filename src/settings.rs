//! Settings for the bootloader trigger: timing of the poll cycle and of the
//! deferred reboot, the reboot mode code, and how the serial endpoint is found.
//!
//! Use the [builder](https://doc.rust-lang.org/1.0.0/style/ownership/builders.html)
//! pattern to set the configurable values.

use std::time::Duration;

// =============================================================================
// Public Interface
// =============================================================================

/// Reset code understood by UF2 bootloaders as "stay in update mode".
pub const RST_UF2: u32 = 0x57;

/// The baud rate which, set while the port is open and followed by closing the
/// port, requests the bootloader.
pub const TOUCH_BAUD_RATE: u32 = 1200;

/// Groups all settings of the bootloader trigger and acts as a
/// [builder](https://doc.rust-lang.org/1.0.0/style/ownership/builders.html)
/// for the settings.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Settings {
    /// The serial endpoint to monitor, usually the device path. When not set,
    /// the first USB serial port found on the system is used.
    pub path: Option<String>,
    /// Period between two samples of the line-control signals while the USB
    /// link is connected.
    pub poll_interval: Duration,
    /// Grace period between the trigger decision and the reboot, leaving time
    /// for in-flight USB transfers and log output to complete.
    pub reboot_delay: Duration,
    /// Mode code handed to the reboot primitive.
    pub reset_code: u32,
    /// Period between two scans of the available serial ports when watching
    /// for connection changes.
    pub scan_interval: Duration,
    /// Maximum number of connection events waiting to be processed.
    pub mailbox_capacity: usize,

    /// Restrict creation of `Settings` instances unless through the
    /// `SettingsBuilder`.
    #[doc(hidden)]
    _private_use_builder: (),
}

/// The builder for the `Settings` values.
///
/// All values are optional and have default values that will be used if not
/// explicitly set.
///
/// **Example**
///
/// ```ignore
/// let settings = SettingsBuilder::new().path("/dev/ttyACM0").finalize();
/// ```
pub struct SettingsBuilder {
    settings: Settings,
}
impl SettingsBuilder {
    /// Start building the settings using default values and auto-discovery of
    /// the serial endpoint.
    pub fn new() -> Self {
        SettingsBuilder {
            settings: Settings {
                path: None,
                poll_interval: Duration::from_millis(100),
                reboot_delay: Duration::from_millis(100),
                reset_code: RST_UF2,
                scan_interval: Duration::from_millis(500),
                mailbox_capacity: 16,
                _private_use_builder: (),
            },
        }
    }

    /// Set the path to the serial port
    pub fn path<'a>(mut self, path: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.path = Some(path.into().as_ref().to_owned());
        self
    }

    /// Set the line-control poll interval in milliseconds
    pub fn poll_ms(mut self, millis: u64) -> Self {
        self.settings.poll_interval = Duration::from_millis(millis);
        self
    }

    /// Set the reboot grace delay in milliseconds
    pub fn reboot_delay_ms(mut self, millis: u64) -> Self {
        self.settings.reboot_delay = Duration::from_millis(millis);
        self
    }

    /// Set the mode code passed to the reboot primitive
    pub fn reset_code(mut self, reset_code: u32) -> Self {
        self.settings.reset_code = reset_code;
        self
    }

    /// Set the serial port scan interval in milliseconds
    pub fn scan_ms(mut self, millis: u64) -> Self {
        self.settings.scan_interval = Duration::from_millis(millis);
        self
    }

    /// Set the capacity of the connection event mailbox. A zero capacity is
    /// raised to one so that events can still be queued.
    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.settings.mailbox_capacity = capacity.max(1);
        self
    }

    pub fn finalize(self) -> Settings {
        self.settings
    }
}
impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn all_default() {
    let settings = SettingsBuilder::new().finalize();
    assert_eq!(
        settings,
        Settings {
            path: None,
            poll_interval: Duration::from_millis(100),
            reboot_delay: Duration::from_millis(100),
            reset_code: 0x57,
            scan_interval: Duration::from_millis(500),
            mailbox_capacity: 16,
            _private_use_builder: (),
        }
    )
}

#[test]
fn path() {
    let settings = SettingsBuilder::new().path("/dev/ttyACM0").finalize();
    assert_eq!(settings.path.unwrap(), "/dev/ttyACM0");
}

#[test]
fn poll_interval() {
    let settings = SettingsBuilder::new().poll_ms(25).finalize();
    assert_eq!(settings.poll_interval, Duration::from_millis(25));
}

#[test]
fn reboot_delay() {
    let settings = SettingsBuilder::new().reboot_delay_ms(250).finalize();
    assert_eq!(settings.reboot_delay, Duration::from_millis(250));
}

#[test]
fn reset_code() {
    let settings = SettingsBuilder::new().reset_code(0x4e).finalize();
    assert_eq!(settings.reset_code, 0x4e);
}

#[test]
fn scan_interval() {
    let settings = SettingsBuilder::new().scan_ms(1000).finalize();
    assert_eq!(settings.scan_interval, Duration::from_secs(1));
}

#[test]
fn mailbox_capacity_never_zero() {
    let settings = SettingsBuilder::new().mailbox_capacity(0).finalize();
    assert_eq!(settings.mailbox_capacity, 1);
}
