//! Events for the session state machine.
//!
//! This module is private and restricted to the [`session`](crate::session)
//! scope. The public interface of the state machine is provided by
//! [`session`](crate::session).
//!
//! Two kinds of events live here. Input events (`Event`) are what the outside
//! world delivers to a session: connection changes and poll ticks. Transition
//! events carry the shared session data from the current state to the next one
//! and are consumed by the `From` implementations in
//! [`state_machine`](super::state_machine).

use std::time::Instant;

use super::state_machine::Shared;

// =============================================================================
// Crate-Public Interface
// =============================================================================

// StartMonitoringEvent ========================================================

/// Fired when the USB link comes up while the session is idle. Triggers the
/// transition to the `Monitoring` state, arming the first poll tick one poll
/// interval after `now`.
#[derive(Debug)]
pub(crate) struct StartMonitoringEvent {
    pub shared: Shared,
    pub now: Instant,
}

// StopMonitoringEvent =========================================================

/// Fired when the USB link goes down while monitoring. Triggers the transition
/// back to the `Idle` state, dropping everything observed on the line and
/// canceling the pending poll tick.
#[derive(Debug)]
pub(crate) struct StopMonitoringEvent {
    pub shared: Shared,
}

// Events enum ==================================================================

/// Input events a session reacts to.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Event {
    Connected { now: Instant },
    Disconnected,
    PollTick { now: Instant },
}
