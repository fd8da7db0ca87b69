//! Cooperative interrupt tokens.
//!
//! Blocking supervisor calls (transport attach, snapshot fetch, handshake
//! waits, backoff sleeps) poll an [`Interrupt`]. The connect controller gives
//! each attempt a child token so its watchdog can cancel the attempt without
//! touching the caller's own token.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const SLEEP_SLICE: Duration = Duration::from_millis(1);

#[derive(Debug, Default)]
struct Flag {
    raised: AtomicBool,
    parent: Option<Interrupt>,
}

/// Shareable interrupt flag, optionally chained to a parent.
///
/// A child reports raised when it or any ancestor is raised. Raising a child
/// never affects its parent.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<Flag>,
}

impl Interrupt {
    /// Creates an unraised root token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a token that also observes `self`.
    pub fn child(&self) -> Self {
        Self {
            flag: Arc::new(Flag {
                raised: AtomicBool::new(false),
                parent: Some(self.clone()),
            }),
        }
    }

    /// Raises this token.
    #[inline]
    pub fn raise(&self) {
        self.flag.raised.store(true, Ordering::Release);
    }

    /// True when this token or an ancestor is raised.
    pub fn is_raised(&self) -> bool {
        self.flag.raised.load(Ordering::Acquire)
            || self.flag.parent.as_ref().is_some_and(Interrupt::is_raised)
    }

    /// Sleeps for `duration` unless raised first.
    ///
    /// Returns `true` when the full duration elapsed and `false` when the sleep
    /// was cut short.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_raised() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }
}
