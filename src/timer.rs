//! A cancellable one-shot timer used to pace the line-control poll cycle.
//!
//! The timer does not run anything by itself. It only records a deadline; the
//! owner (the work queue) waits until the earliest deadline and then `fire`s
//! the timers that are due. Keeping arming, cancellation and firing explicit
//! makes the cancellation races observable in tests.

use std::time::{Duration, Instant};

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct PollTimer {
    deadline: Option<Instant>,
}

impl PollTimer {
    pub fn new() -> Self {
        PollTimer { deadline: None }
    }

    /// Arm the timer to expire `delay` after `now`. An already armed timer
    /// keeps its deadline; returns whether the timer was armed by this call.
    pub fn arm(&mut self, now: Instant, delay: Duration) -> bool {
        if self.deadline.is_some() {
            return false;
        }
        self.deadline = Some(now + delay);
        true
    }

    /// Disarm the timer. Returns whether it was armed.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_due(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(deadline) if deadline <= now)
    }

    /// Disarm the timer if it is due at `now`. Returns whether it fired.
    pub fn fire(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.deadline = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS_10: Duration = Duration::from_millis(10);

    #[test]
    fn starts_disarmed() {
        let timer = PollTimer::new();
        assert!(!timer.is_armed());
        assert_eq!(timer.deadline(), None);
        assert!(!timer.is_due(Instant::now()));
    }

    #[test]
    fn arm_keeps_existing_deadline() {
        let now = Instant::now();
        let mut timer = PollTimer::new();
        assert!(timer.arm(now, MS_10));
        assert!(!timer.arm(now + MS_10, MS_10));
        assert_eq!(timer.deadline(), Some(now + MS_10));
    }

    #[test]
    fn fires_once_when_due() {
        let now = Instant::now();
        let mut timer = PollTimer::new();
        timer.arm(now, MS_10);
        assert!(!timer.fire(now));
        assert!(timer.fire(now + MS_10));
        assert!(!timer.is_armed());
        assert!(!timer.fire(now + MS_10 * 2));
    }

    #[test]
    fn canceled_timer_never_fires() {
        let now = Instant::now();
        let mut timer = PollTimer::new();
        timer.arm(now, MS_10);
        assert!(timer.cancel());
        assert!(!timer.cancel());
        assert!(!timer.fire(now + MS_10));
    }
}
