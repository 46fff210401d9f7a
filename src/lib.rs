//! `cdc-touch` reboots a device into its firmware-update (bootloader) mode
//! when its USB virtual serial port (CDC-ACM) receives the "1200-baud touch":
//! a host opens the port, sets it to 1200 baud and closes it again. Tools
//! flashing the device use this to request the bootloader without anyone
//! having to press a button on the board.
//!
//! The touch is detected by sampling the line-control signals of the port
//! while the USB link is connected:
//!
//! * DTR asserted means the host holds the port open; the baud rate observed
//!   at that time is remembered.
//! * DTR deasserted with 1200 baud remembered means the touch is complete and
//!   a reboot is requested.
//! * The USB link going down forgets everything observed.
//!
//! The reboot is deferred by a short grace period so that in-flight USB
//! transfers can complete, and it is requested at most once.
//!
//! Each monitored endpoint is a [`Session`], implemented as a state machine
//! in terms of **states** and **transitions** between them with the following
//! characteristics:
//!
//! * Can only be in one state at any time.
//! * Each state can have its own associated data if needed.
//! * It is possible to have some shared data between **all** states.
//! * Transitions between states are triggered via typed **events** and follow
//!   defined semantics.
//! * Transitioning from one state to another consumes the original state and
//!   renders it unusable. Any transition back to that state would create a new
//!   state.
//! * Data is transferred from one state to the next by attaching it to the
//!   transition event.
//!
//! As with any `From`/`Into` pair, implementing `From` for the target state is
//! enough, and only transitions for which it is implemented are possible.
//!
//! Sessions are kept in a [`Registry`] keyed by endpoint, and run on a
//! [`WorkQueue`]: a single thread that executes connection events and poll
//! ticks one at a time. Connection event sources post to the work queue
//! through an [`EventSender`].
//!
//! **Example** - Monitoring a host serial port:
//! ```no_run
//! use std::sync::Arc;
//! use cdc_touch::{self as ct, host};
//!
//! let settings = ct::SettingsBuilder::new().finalize();
//! let path = host::resolve_endpoint(&settings).expect("no serial port");
//! let trigger = ct::DeferredReboot::new(&settings, Arc::new(host::ExitReboot));
//! let mut registry = ct::Registry::new(settings.clone(), trigger);
//! registry
//!     .register(path.clone(), Box::new(host::SerialLineControl::new(path.clone())))
//!     .unwrap();
//! let queue = ct::WorkQueue::start(registry, settings.mailbox_capacity).unwrap();
//! let watcher = host::PortWatcher::start(path, &settings, queue.sender()).unwrap();
//! # watcher.stop();
//! queue.join().unwrap();
//! ```

mod connection;
mod error;
pub mod host;
mod line_control;
mod registry;
mod session;
mod settings;
mod timer;
mod trigger;
mod work_queue;

#[cfg(test)]
mod testing;

pub use connection::{ConnectionEvent, UsbConnState};
pub use error::{Error, Result};
pub use line_control::LineControl;
pub use registry::Registry;
pub use session::{EndpointId, Session};
pub use settings::{Settings, SettingsBuilder, RST_UF2, TOUCH_BAUD_RATE};
pub use timer::PollTimer;
pub use trigger::{DeferredReboot, RebootPrimitive};
pub use work_queue::{EventSender, WorkQueue};
