//! Registry of the monitored serial endpoints.
//!
//! Connection events are delivered by endpoint identity; the registry routes
//! them to the matching session. It also drives the poll cycle of all its
//! sessions by firing the ticks that are due and telling the caller when the
//! next one will be.
//!
//! All sessions of a registry share one [`DeferredReboot`]: the device reboots
//! once, whichever endpoint saw the touch.

use std::time::Instant;

use log::{info, warn};

use crate::{
    connection::ConnectionEvent,
    error::{Error, Result},
    line_control::LineControl,
    session::{EndpointId, Session},
    settings::Settings,
    trigger::DeferredReboot,
};

#[derive(Debug)]
pub struct Registry {
    settings: Settings,
    trigger: DeferredReboot,
    sessions: Vec<Session>,
}

impl Registry {
    pub fn new(settings: Settings, trigger: DeferredReboot) -> Self {
        Registry {
            settings,
            trigger,
            sessions: Vec::new(),
        }
    }

    /// Start monitoring a ready endpoint. The new session stays idle until its
    /// first connected event.
    pub fn register(
        &mut self,
        id: impl Into<EndpointId>,
        endpoint: Box<dyn LineControl>,
    ) -> Result<()> {
        let id = id.into();
        if self.get(&id).is_some() {
            return Err(Error::DuplicateEndpoint(id));
        }
        info!("[{}] bootloader trigger initialized", id);
        self.sessions.push(Session::new(
            id,
            endpoint,
            &self.settings,
            self.trigger.clone(),
        ));
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id() == id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Deliver a connection event to the session monitoring `id`.
    pub fn dispatch(&mut self, id: &str, event: ConnectionEvent, now: Instant) -> Result<()> {
        match self.sessions.iter_mut().find(|s| s.id() == id) {
            Some(session) => {
                session.on_event(event, now);
                Ok(())
            }
            None => {
                warn!("dropping {:?} for unknown endpoint '{}'", event, id);
                Err(Error::UnknownEndpoint(id.to_owned()))
            }
        }
    }

    /// Run the poll ticks that are due at `now`. Returns how many ran.
    pub fn poll_due(&mut self, now: Instant) -> usize {
        let mut fired = 0;
        for session in self.sessions.iter_mut() {
            if session.fire_if_due(now) {
                fired += 1;
            }
        }
        fired
    }

    /// The earliest armed poll tick over all sessions.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.sessions.iter().filter_map(Session::next_tick).min()
    }

    pub fn trigger(&self) -> &DeferredReboot {
        &self.trigger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingsBuilder;
    use crate::testing::{RecordingReboot, Sample::*, ScriptedLine};
    use std::sync::Arc;
    use std::time::Duration;

    fn registry() -> Registry {
        let settings = SettingsBuilder::new()
            .poll_ms(100)
            .reboot_delay_ms(60_000)
            .finalize();
        let trigger = DeferredReboot::new(&settings, Arc::new(RecordingReboot::default()));
        Registry::new(settings, trigger)
    }

    #[test]
    fn rejects_duplicate_endpoint() {
        let mut reg = registry();
        reg.register("ttyACM0", Box::new(ScriptedLine::new())).unwrap();
        let err = reg
            .register("ttyACM0", Box::new(ScriptedLine::new()))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateEndpoint(ref id) if id == "ttyACM0"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn unknown_endpoint_is_reported() {
        let mut reg = registry();
        let err = reg
            .dispatch("ttyACM9", ConnectionEvent::Connected, Instant::now())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownEndpoint(_)));
    }

    #[test]
    fn routes_events_to_their_session() {
        let mut reg = registry();
        reg.register("ttyACM0", Box::new(ScriptedLine::new())).unwrap();
        reg.register("ttyACM1", Box::new(ScriptedLine::new())).unwrap();
        reg.dispatch("ttyACM1", ConnectionEvent::Connected, Instant::now())
            .unwrap();
        assert!(!reg.get("ttyACM0").unwrap().usb_connected());
        assert!(reg.get("ttyACM1").unwrap().usb_connected());
    }

    #[test]
    fn polls_only_connected_sessions_when_due() {
        let mut reg = registry();
        let (line0, line1) = (ScriptedLine::new(), ScriptedLine::new());
        reg.register("ttyACM0", Box::new(line0.clone())).unwrap();
        reg.register("ttyACM1", Box::new(line1.clone())).unwrap();
        assert_eq!(reg.next_deadline(), None);

        let t0 = Instant::now();
        reg.dispatch("ttyACM0", ConnectionEvent::Connected, t0)
            .unwrap();
        let deadline = t0 + Duration::from_millis(100);
        assert_eq!(reg.next_deadline(), Some(deadline));
        assert_eq!(reg.poll_due(t0), 0);
        assert_eq!(reg.poll_due(deadline), 1);
        assert_eq!(line0.dtr_reads(), 1);
        assert_eq!(line1.dtr_reads(), 0);
        assert_eq!(
            reg.next_deadline(),
            Some(deadline + Duration::from_millis(100))
        );
    }

    #[test]
    fn touch_on_any_endpoint_shares_one_reboot() {
        let mut reg = registry();
        let (line0, line1) = (ScriptedLine::new(), ScriptedLine::new());
        reg.register("ttyACM0", Box::new(line0.clone())).unwrap();
        reg.register("ttyACM1", Box::new(line1.clone())).unwrap();
        let mut now = Instant::now();
        reg.dispatch("ttyACM0", ConnectionEvent::Connected, now)
            .unwrap();
        reg.dispatch("ttyACM1", ConnectionEvent::Connected, now)
            .unwrap();

        line0.push(Open(1200)).push(Closed);
        line1.push(Open(1200)).push(Closed);
        for _ in 0..2 {
            now += Duration::from_millis(100);
            assert_eq!(reg.poll_due(now), 2);
        }
        assert!(reg.trigger().is_pending());
    }
}
