//! Serial port discovery and presence watching.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{debug, info, warn};
use serialport::{available_ports, SerialPortType};

use crate::{
    connection::UsbConnState,
    error::{Error, Result},
    session::EndpointId,
    settings::Settings,
    work_queue::EventSender,
};

//==============================================================================
// Public Interface
//==============================================================================

/// A serial port present on the system.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DetectedPort {
    /// The port name, usually the device path.
    pub name: String,
    /// Whether the port belongs to a USB serial device.
    pub usb: bool,
    /// Product string of the USB device, when known.
    pub product: Option<String>,
}

/// Enumerates the serial ports on the system.
pub fn enumerate_serial_ports() -> Result<Vec<DetectedPort>> {
    Ok(available_ports()?
        .into_iter()
        .map(|p| match p.port_type {
            SerialPortType::UsbPort(info) => DetectedPort {
                name: p.port_name,
                usb: true,
                product: info.product,
            },
            _ => DetectedPort {
                name: p.port_name,
                usb: false,
                product: None,
            },
        })
        .collect())
}

/// Find the serial endpoint to monitor.
///
/// A configured path must be present on the system, otherwise the endpoint is
/// not ready. Without a configured path, the first USB serial port is used.
pub fn resolve_endpoint(settings: &Settings) -> Result<String> {
    select_endpoint(settings.path.as_deref(), &enumerate_serial_ports()?)
}

/// Watches the presence of one serial port and reports it as the USB link
/// state of its endpoint: present means enumerated, absent means no link.
pub struct PortWatcher {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl PortWatcher {
    /// Start scanning the system's serial ports every `settings.scan_interval`.
    pub fn start(
        id: impl Into<EndpointId>,
        settings: &Settings,
        sender: EventSender,
    ) -> Result<Self> {
        Self::start_with(id, settings.scan_interval, sender, || {
            enumerate_serial_ports().map(|ports| ports.into_iter().map(|p| p.name).collect())
        })
    }

    /// Start watching with a custom source of port names.
    pub fn start_with<F>(
        id: impl Into<EndpointId>,
        scan_interval: Duration,
        sender: EventSender,
        list_ports: F,
    ) -> Result<Self>
    where
        F: FnMut() -> Result<Vec<String>> + Send + 'static,
    {
        let id = id.into();
        let stop = Arc::new(AtomicBool::new(false));
        let handle = thread::Builder::new().name("port-watcher".into()).spawn({
            let stop = Arc::clone(&stop);
            move || watch(id, scan_interval, sender, list_ports, stop)
        })?;
        Ok(PortWatcher { stop, handle })
    }

    /// Stop watching and wait for the watcher thread to finish.
    pub fn stop(self) {
        self.stop.store(true, Ordering::Release);
        if self.handle.join().is_err() {
            warn!("port watcher thread panicked");
        }
    }
}

//==============================================================================
// Private stuff
//==============================================================================

fn select_endpoint(requested: Option<&str>, ports: &[DetectedPort]) -> Result<String> {
    match requested {
        Some(path) => {
            if ports.iter().any(|p| p.name == path) {
                Ok(path.to_owned())
            } else {
                Err(Error::NotReady(path.to_owned()))
            }
        }
        None => match ports.iter().find(|p| p.usb) {
            Some(port) => {
                info!(
                    "Auto-detected USB serial port: {} ({})",
                    port.name,
                    port.product.as_deref().unwrap_or("")
                );
                Ok(port.name.clone())
            }
            None => Err(Error::NotFound),
        },
    }
}

fn watch<F>(
    id: EndpointId,
    scan_interval: Duration,
    sender: EventSender,
    mut list_ports: F,
    stop: Arc<AtomicBool>,
) where
    F: FnMut() -> Result<Vec<String>>,
{
    // Unknown until the first scan, so that the first scan always reports.
    let mut present: Option<bool> = None;

    while !stop.load(Ordering::Acquire) {
        match list_ports() {
            Ok(names) => {
                let found = names.iter().any(|name| *name == id);
                if present != Some(found) {
                    let state = if found {
                        UsbConnState::Hid
                    } else {
                        UsbConnState::None
                    };
                    debug!("[{}] port {}", id, if found { "present" } else { "gone" });
                    match sender.conn_state(&id, state) {
                        Ok(()) => present = Some(found),
                        Err(Error::QueueStopped) => break,
                        // Try again on the next scan.
                        Err(e) => warn!("[{}] could not report {:?}: {}", id, state, e),
                    }
                }
            }
            Err(e) => debug!("could not list serial ports: {}", e),
        }
        thread::sleep(scan_interval);
    }
}

//==============================================================================
// Unit Tests
//==============================================================================
