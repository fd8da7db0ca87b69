//! Time sources shared by the reader, the schedules and the tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Nanosecond time source.
///
/// The reader stamps every decoded frame with [`Clock::nanos`] and the gateway
/// supervisor measures its schedules and the silent-feed interval against the
/// same clock, so tests can drive both deterministically.
pub trait Clock: Send + Sync {
    /// Current time in nanoseconds since the Unix epoch.
    fn nanos(&self) -> u64;
}

/// Wall clock backed by [`SystemTime`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn nanos(&self) -> u64 {
        current_time_nanos()
    }
}

/// Returns the current wall-clock time in nanoseconds, or zero if the system
/// clock is set before the Unix epoch.
#[inline]
pub fn current_time_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Creates a clock reading `start_nanos`.
    pub fn new(start_nanos: u64) -> Self {
        Self {
            now: AtomicU64::new(start_nanos),
        }
    }

    /// Sets the absolute time.
    pub fn set(&self, nanos: u64) {
        self.now.store(nanos, Ordering::Release);
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let delta = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.now.fetch_add(delta, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn nanos(&self) -> u64 {
        self.now.load(Ordering::Acquire)
    }
}
