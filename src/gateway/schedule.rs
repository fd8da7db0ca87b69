//! Fixed-interval schedules with an out-of-band trigger.

use crate::utils::Clock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Cloneable handle that makes a [`Schedule`] fire on its next check.
///
/// Safe to use from any thread. Triggering is a request: the schedule's owner
/// acts on it the next time it polls, never pre-emptively.
#[derive(Debug, Clone)]
pub struct ScheduleTrigger {
    forced: Arc<AtomicBool>,
}

impl ScheduleTrigger {
    /// Requests that the schedule fire on its next check.
    #[inline]
    pub fn trigger(&self) {
        self.forced.store(true, Ordering::Release);
    }

    /// True while a trigger is pending.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.forced.load(Ordering::Acquire)
    }
}

/// Interval timer polled by a supervisor duty cycle.
#[derive(Debug)]
pub struct Schedule {
    name: &'static str,
    interval_nanos: u64,
    next_due: Option<u64>,
    forced: Arc<AtomicBool>,
}

impl Schedule {
    /// Creates a stopped schedule.
    pub fn new(name: &'static str, interval: Duration) -> Self {
        Self {
            name,
            interval_nanos: u64::try_from(interval.as_nanos()).unwrap_or(u64::MAX),
            next_due: None,
            forced: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Schedule name, used in logs.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Arms the schedule one interval after `clock`'s current time.
    pub fn start(&mut self, clock: &dyn Clock) {
        self.next_due = Some(clock.nanos().saturating_add(self.interval_nanos));
    }

    /// True once [`Schedule::start`] has been called.
    #[inline]
    pub fn is_started(&self) -> bool {
        self.next_due.is_some()
    }

    /// Returns a trigger handle for other threads.
    pub fn trigger(&self) -> ScheduleTrigger {
        ScheduleTrigger {
            forced: Arc::clone(&self.forced),
        }
    }

    /// Makes the next check fire.
    #[inline]
    pub fn force_trigger(&self) {
        self.forced.store(true, Ordering::Release);
    }

    /// Returns `true` when the schedule is due or was triggered, and re-arms it
    /// one interval from now. A stopped schedule never fires; a trigger raised
    /// before start stays pending.
    pub fn check(&mut self, clock: &dyn Clock) -> bool {
        let Some(next_due) = self.next_due else {
            return false;
        };
        let now = clock.nanos();
        let forced = self.forced.swap(false, Ordering::AcqRel);
        if forced || now >= next_due {
            self.next_due = Some(now.saturating_add(self.interval_nanos));
            return true;
        }
        false
    }
}
