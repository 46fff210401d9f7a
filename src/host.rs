//! Bindings of the bootloader trigger to the host operating system: serial
//! ports through `serialport` and a process-level reboot primitive.

mod ports;
mod reboot;
mod serial_line;

pub use ports::{enumerate_serial_ports, resolve_endpoint, DetectedPort, PortWatcher};
pub use reboot::{ExitReboot, MAX_EXIT_CODE};
pub use serial_line::SerialLineControl;
