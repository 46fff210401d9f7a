//! Session state machine: watches the line-control signals of one serial
//! endpoint for the 1200-baud touch.
//!
//! A host requests the bootloader by opening the port, setting it to 1200
//! baud, and closing it again. On the device side this shows up as DTR being
//! asserted with the baud rate at 1200, followed later by DTR being
//! deasserted. Line-control changes are not edge-triggered at this level, so
//! the signals are sampled periodically while the USB link is up.
//!
//! The following state diagram summarizes the states and transitions of a
//! session:
//!
//! ```text
//!                      START
//!                        |
//!                        v
//!                    .-------.  disconnected / tick
//!                    | Idle  |<------------------.
//!                    '-------'                   |
//!                     |    ^                     |
//!           connected |    | disconnected        |
//!          (arm tick) |    | (reset, cancel)  ---'
//!                     v    |
//!               ******************
//!               *   Monitoring   *<---.
//!               ******************    | tick: sample DTR and baud rate,
//!                        |            |       submit reboot on 1200 touch,
//!                        '------------'       re-arm tick
//! ```

use std::{
    fmt,
    time::{Duration, Instant},
};

use log::debug;

use super::events::*;
use super::states::*;
use crate::{
    connection::ConnectionEvent, line_control::LineControl, settings::Settings,
    timer::PollTimer, trigger::DeferredReboot,
};

// =============================================================================
// Public Interface
// =============================================================================

/// Identity of a monitored serial endpoint, usually its device path.
pub type EndpointId = String;

/// Session state of one monitored serial endpoint.
///
/// All methods must be called from one serialized context (see
/// [`WorkQueue`](crate::WorkQueue)); the session itself does no locking.
pub struct Session {
    id: EndpointId,
    sm: Option<SessionStates>,
}
impl Session {
    /// Create an idle session bound to a ready endpoint. Polling starts with
    /// the first connected event.
    pub fn new(
        id: impl Into<EndpointId>,
        endpoint: Box<dyn LineControl>,
        settings: &Settings,
        trigger: DeferredReboot,
    ) -> Self {
        let id = id.into();
        Session {
            sm: Some(SessionStates::Idle(SessionSM::new(Shared {
                id: id.clone(),
                endpoint,
                poll_interval: settings.poll_interval,
                timer: PollTimer::new(),
                trigger,
            }))),
            id,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The USB link came up: start polling.
    pub fn on_connected(&mut self, now: Instant) {
        debug!("[{}] USB connected event", self.id);
        self.dispatch(Event::Connected { now });
    }

    /// The USB link went down: forget what was observed and stop polling.
    pub fn on_disconnected(&mut self) {
        debug!("[{}] USB disconnected event", self.id);
        self.dispatch(Event::Disconnected);
    }

    pub fn on_event(&mut self, event: ConnectionEvent, now: Instant) {
        match event {
            ConnectionEvent::Connected => self.on_connected(now),
            ConnectionEvent::Disconnected => self.on_disconnected(),
        }
    }

    /// Run one poll tick, whether or not the poll timer is due.
    pub fn on_tick(&mut self, now: Instant) {
        self.dispatch(Event::PollTick { now });
    }

    /// Run a poll tick if the poll timer is due at `now`. Returns whether a
    /// tick ran.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        let fired = match self.sm.as_mut() {
            Some(SessionStates::Idle(sm)) => sm.shared.timer.fire(now),
            Some(SessionStates::Monitoring(sm)) => sm.shared.timer.fire(now),
            None => false,
        };
        if fired {
            self.on_tick(now);
        }
        fired
    }

    /// When the next poll tick is due, if one is armed.
    pub fn next_tick(&self) -> Option<Instant> {
        match &self.sm {
            Some(SessionStates::Idle(sm)) => sm.shared.timer.deadline(),
            Some(SessionStates::Monitoring(sm)) => sm.shared.timer.deadline(),
            None => None,
        }
    }

    pub fn is_polling(&self) -> bool {
        self.next_tick().is_some()
    }

    pub fn usb_connected(&self) -> bool {
        matches!(self.sm, Some(SessionStates::Monitoring(_)))
    }

    pub fn port_open(&self) -> bool {
        match &self.sm {
            Some(SessionStates::Monitoring(sm)) => sm.state.port_open,
            _ => false,
        }
    }

    pub fn last_baud_rate(&self) -> u32 {
        match &self.sm {
            Some(SessionStates::Monitoring(sm)) => sm.state.last_baud_rate,
            _ => 0,
        }
    }

    fn dispatch(&mut self, event: Event) {
        if let Some(sm) = self.sm.take() {
            self.sm = Some(sm.step(event));
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("usb_connected", &self.usb_connected())
            .field("port_open", &self.port_open())
            .field("last_baud_rate", &self.last_baud_rate())
            .field("next_tick", &self.next_tick())
            .finish()
    }
}

// =============================================================================
// Private stuff
// =============================================================================

/// Data shared by all states of a session and carried over by transitions.
pub(crate) struct Shared {
    pub id: EndpointId,
    pub endpoint: Box<dyn LineControl>,
    pub poll_interval: Duration,
    pub timer: PollTimer,
    pub trigger: DeferredReboot,
}
impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("id", &self.id)
            .field("poll_interval", &self.poll_interval)
            .field("timer", &self.timer)
            .field("trigger", &self.trigger)
            .finish()
    }
}

/// The raw session state machine.
///
/// Note that using a generic type that holds the current state serves two
/// purposes. It allows for having shared data by all states that is not really
/// part of state data (the endpoint, the poll timer, the reboot trigger).
/// Additionally, it's nicer when debugging to see the state machine and the
/// current state it is holding at any time.
#[derive(Debug)]
struct SessionSM<S: Pollable> {
    shared: Shared,
    state: S,
}
impl<S: Pollable> SessionSM<S> {
    fn poll(&mut self, now: Instant) {
        self.state.poll(&mut self.shared, now)
    }
}

/// A session starts in the `IdleState`.
impl SessionSM<IdleState> {
    fn new(shared: Shared) -> Self {
        SessionSM {
            shared,
            state: IdleState {},
        }
    }
}

/// Wraps the state machine and its states into an enum, which is used for
/// pattern matching during state transitions.
#[derive(Debug)]
enum SessionStates {
    Idle(SessionSM<IdleState>),
    Monitoring(SessionSM<MonitoringState>),
}
impl SessionStates {
    /// The unit of work of a session: apply one input event to the current
    /// state and decide the next one.
    fn step(self, event: Event) -> Self {
        match self {
            SessionStates::Idle(mut sm) => match event {
                Event::Connected { now } => SessionStates::Monitoring(
                    StartMonitoringEvent {
                        shared: sm.shared,
                        now,
                    }
                    .into(),
                ),
                Event::Disconnected => {
                    sm.shared.timer.cancel();
                    SessionStates::Idle(sm)
                }
                Event::PollTick { now } => {
                    sm.poll(now);
                    SessionStates::Idle(sm)
                }
            },
            SessionStates::Monitoring(mut sm) => match event {
                Event::Connected { now } => {
                    // Already polling; make sure exactly one tick is armed.
                    sm.shared.timer.arm(now, sm.shared.poll_interval);
                    SessionStates::Monitoring(sm)
                }
                Event::Disconnected => {
                    SessionStates::Idle(StopMonitoringEvent { shared: sm.shared }.into())
                }
                Event::PollTick { now } => {
                    sm.poll(now);
                    SessionStates::Monitoring(sm)
                }
            },
        }
    }
}

// -----------------------------------------------------------------------------
// State from Event transitions
// -----------------------------------------------------------------------------

impl From<StartMonitoringEvent> for SessionSM<MonitoringState> {
    fn from(event: StartMonitoringEvent) -> SessionSM<MonitoringState> {
        let mut shared = event.shared;
        shared.timer.arm(event.now, shared.poll_interval);
        SessionSM {
            shared,
            state: MonitoringState {
                port_open: false,
                last_baud_rate: 0,
            },
        }
    }
}

impl From<StopMonitoringEvent> for SessionSM<IdleState> {
    fn from(event: StopMonitoringEvent) -> SessionSM<IdleState> {
        let mut shared = event.shared;
        shared.timer.cancel();
        SessionSM {
            shared,
            state: IdleState {},
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingsBuilder;
    use crate::testing::{RecordingReboot, Sample::*, ScriptedLine};
    use std::sync::Arc;

    const POLL: Duration = Duration::from_millis(100);

    struct Fixture {
        session: Session,
        line: ScriptedLine,
        trigger: DeferredReboot,
        now: Instant,
    }
    impl Fixture {
        fn new() -> Self {
            let settings = SettingsBuilder::new()
                .poll_ms(100)
                .reboot_delay_ms(60_000)
                .finalize();
            let line = ScriptedLine::new();
            let trigger = DeferredReboot::new(&settings, Arc::new(RecordingReboot::default()));
            Fixture {
                session: Session::new(
                    "ttyACM0",
                    Box::new(line.clone()),
                    &settings,
                    trigger.clone(),
                ),
                line,
                trigger,
                now: Instant::now(),
            }
        }

        fn connect(&mut self) -> &mut Self {
            self.session.on_connected(self.now);
            self
        }

        /// Advance time to the next armed tick and run it with `sample` on
        /// the line.
        fn tick(&mut self, sample: crate::testing::Sample) -> &mut Self {
            self.line.push(sample);
            self.now += POLL;
            assert!(self.session.fire_if_due(self.now), "no tick was due");
            self
        }
    }

    #[test]
    fn starts_idle_without_polling() {
        let fx = Fixture::new();
        assert!(!fx.session.usb_connected());
        assert!(!fx.session.port_open());
        assert_eq!(fx.session.last_baud_rate(), 0);
        assert!(!fx.session.is_polling());
        assert_eq!(fx.session.id(), "ttyACM0");
    }

    #[test]
    fn connect_arms_first_tick_one_interval_later() {
        let mut fx = Fixture::new();
        fx.connect();
        assert!(fx.session.usb_connected());
        assert_eq!(fx.session.next_tick(), Some(fx.now + POLL));
        assert!(!fx.session.fire_if_due(fx.now));
        assert_eq!(fx.line.dtr_reads(), 0);
    }

    #[test]
    fn duplicate_connect_keeps_a_single_tick() {
        let mut fx = Fixture::new();
        fx.connect();
        let first = fx.session.next_tick();
        fx.now += Duration::from_millis(30);
        fx.connect();
        assert_eq!(fx.session.next_tick(), first);
    }

    #[test]
    fn tracks_latest_baud_rate_while_open() {
        let mut fx = Fixture::new();
        fx.connect();
        for &baud in &[9600, 115_200, 115_200, 1200, 57_600] {
            fx.tick(Open(baud));
            assert!(fx.session.port_open());
            assert_eq!(fx.session.last_baud_rate(), baud);
        }
        assert!(!fx.trigger.is_pending());
    }

    #[test]
    fn every_tick_rearms_while_connected() {
        let mut fx = Fixture::new();
        fx.connect();
        fx.tick(Closed).tick(DtrError).tick(Open(9600));
        assert_eq!(fx.session.next_tick(), Some(fx.now + POLL));
        assert_eq!(fx.line.dtr_reads(), 3);
    }

    #[test]
    fn disconnect_resets_and_stops_polling() {
        let mut fx = Fixture::new();
        fx.connect();
        fx.tick(Open(1200));
        fx.session.on_disconnected();
        assert!(!fx.session.usb_connected());
        assert!(!fx.session.port_open());
        assert_eq!(fx.session.last_baud_rate(), 0);
        assert!(!fx.session.is_polling());
        assert!(!fx.session.fire_if_due(fx.now + POLL * 10));
        assert_eq!(fx.line.dtr_reads(), 1);
    }

    #[test]
    fn stale_tick_after_disconnect_is_ignored() {
        let mut fx = Fixture::new();
        fx.connect();
        fx.tick(Open(1200));
        fx.session.on_disconnected();
        fx.line.push(Closed);
        fx.session.on_tick(fx.now + POLL);
        assert_eq!(fx.line.dtr_reads(), 1);
        assert!(!fx.session.is_polling());
        assert!(!fx.trigger.is_pending());
    }

    #[test]
    fn disconnect_while_idle_is_harmless() {
        let mut fx = Fixture::new();
        fx.session.on_disconnected();
        assert!(!fx.session.usb_connected());
        assert!(!fx.session.is_polling());
    }

    #[test]
    fn close_after_1200_submits_reboot() {
        let mut fx = Fixture::new();
        fx.connect();
        fx.tick(Open(1200));
        assert!(!fx.trigger.is_pending());
        fx.tick(Closed);
        assert!(fx.trigger.is_pending());
        assert!(!fx.session.port_open());
        assert_eq!(fx.session.last_baud_rate(), 1200);
    }

    #[test]
    fn close_may_come_several_ticks_later() {
        let mut fx = Fixture::new();
        fx.connect();
        fx.tick(Open(1200)).tick(Open(1200)).tick(Open(1200));
        assert!(!fx.trigger.is_pending());
        fx.tick(Closed);
        assert!(fx.trigger.is_pending());
    }

    #[test]
    fn close_at_other_baud_rate_does_nothing() {
        let mut fx = Fixture::new();
        fx.connect();
        fx.tick(Open(9600)).tick(Closed).tick(Closed);
        assert!(!fx.trigger.is_pending());
        assert!(fx.session.is_polling());
    }

    #[test]
    fn later_baud_rate_overrides_1200() {
        let mut fx = Fixture::new();
        fx.connect();
        fx.tick(Open(1200)).tick(Open(115_200)).tick(Closed);
        assert!(!fx.trigger.is_pending());
    }

    #[test]
    fn closed_port_never_updates_baud_rate() {
        let mut fx = Fixture::new();
        fx.connect();
        fx.tick(Closed);
        assert_eq!(fx.session.last_baud_rate(), 0);
        assert!(!fx.session.port_open());
    }

    #[test]
    fn dtr_read_failure_changes_nothing() {
        let mut fx = Fixture::new();
        fx.connect();
        fx.tick(Open(1200));
        fx.tick(DtrError);
        assert!(fx.session.port_open());
        assert_eq!(fx.session.last_baud_rate(), 1200);
        assert!(fx.session.is_polling());
        assert!(!fx.trigger.is_pending());
    }

    #[test]
    fn baud_read_failure_keeps_previous_rate() {
        let mut fx = Fixture::new();
        fx.connect();
        fx.tick(Open(1200)).tick(BaudError);
        assert!(fx.session.port_open());
        assert_eq!(fx.session.last_baud_rate(), 1200);
        fx.tick(Closed);
        assert!(fx.trigger.is_pending());
    }

    #[test]
    fn connect_event_routing() {
        let mut fx = Fixture::new();
        fx.session.on_event(ConnectionEvent::Connected, fx.now);
        assert!(fx.session.usb_connected());
        fx.session.on_event(ConnectionEvent::Disconnected, fx.now);
        assert!(!fx.session.usb_connected());
    }
}
