//! States for the session state machine.
//!
//! This module is private and restricted to the [`session`](crate::session)
//! scope. The public interface of the state machine is provided by
//! [`session`](crate::session).
//!
//! Refer to the [`state_machine`](super::state_machine) module for an overview
//! of states, events and transitions.

use std::time::Instant;

use log::{debug, info};

use super::state_machine::Shared;
use crate::settings::TOUCH_BAUD_RATE;

// =============================================================================
// Crate-Public Interface
// =============================================================================

/// Trait adding the ability for a state to react to a poll tick.
pub(crate) trait Pollable {
    /// Sample the line-control signals through `shared.endpoint` and update the
    /// state accordingly. A state that keeps polling re-arms `shared.timer`.
    fn poll(&mut self, shared: &mut Shared, now: Instant);
}

// Idle State ==================================================================

/// The USB link is down. Nothing is observed on the line and no poll tick is
/// armed.
///
/// From the `IdleState`, the state machine evolves via:
///
///  * **`StartMonitoringEvent` => `MonitoringState`** when the USB link comes
///    up.
#[derive(Debug, Default)]
pub(crate) struct IdleState {}
impl Pollable for IdleState {
    /// A tick reaching an idle session was already on its way when the link
    /// went down. It must neither read the line nor schedule another tick.
    fn poll(&mut self, shared: &mut Shared, _now: Instant) {
        debug!("[{}] ignoring poll tick while disconnected", shared.id);
    }
}

// Monitoring State ============================================================

/// The USB link is up and the line-control signals are sampled every poll
/// interval.
///
/// From the `MonitoringState`, the state machine evolves via:
///
///  * **`StopMonitoringEvent` => `IdleState`** when the USB link goes down.
#[derive(Debug, Default)]
pub(crate) struct MonitoringState {
    /// Last observed DTR state.
    pub port_open: bool,
    /// Baud rate observed the last time DTR was asserted; 0 until then.
    pub last_baud_rate: u32,
}
impl Pollable for MonitoringState {
    fn poll(&mut self, shared: &mut Shared, now: Instant) {
        match shared.endpoint.read_dtr() {
            Err(e) => debug!("[{}] failed to get DTR state: {}", shared.id, e),
            Ok(dtr) => {
                // The baud rate only means something while the host holds the
                // port open.
                if dtr {
                    match shared.endpoint.read_baud_rate() {
                        Err(e) => debug!("[{}] failed to get baud rate: {}", shared.id, e),
                        Ok(baud_rate) if baud_rate != self.last_baud_rate => {
                            debug!("[{}] baud rate changed: {}", shared.id, baud_rate);
                            self.last_baud_rate = baud_rate;
                        }
                        Ok(_) => {}
                    }
                }

                // The rate seen while open is kept until the link goes down, so
                // the close may come any number of ticks later.
                if !dtr && self.last_baud_rate == TOUCH_BAUD_RATE && shared.trigger.submit() {
                    info!(
                        "[{}] port closed after {} baud set, triggering bootloader",
                        shared.id, TOUCH_BAUD_RATE
                    );
                }

                self.port_open = dtr;
            }
        }

        shared.timer.arm(now, shared.poll_interval);
    }
}
