//! Park handshake between the feed worker and its supervisor.
//!
//! The worker owns the book, the decoder and the transport while it runs.
//! The supervisor gains them only by parking the worker:
//!
//! 1. the supervisor raises `pause`, then bumps `epoch`;
//! 2. the worker, at the top of its next duty cycle, sees `pause`, records the
//!    epoch it observed in `acked` and returns without touching shared state;
//! 3. the supervisor waits until `acked` reaches its epoch, uses the shared
//!    state, and clears `pause` to hand it back.
//!
//! Stamping acknowledgements with an epoch means a park request can only be
//! satisfied by a worker that observed that request. A plain "is paused" flag
//! left over from an earlier request would let the supervisor proceed while
//! the worker is still mid-frame.
//!
//! `buffer` tells the worker whether offered records go to the replay queue or
//! to the distribution channel.

use super::error::ReaderError;
use super::interrupt::Interrupt;
use crossbeam::utils::Backoff;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Worker state as observed from either side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReaderState {
    /// Publishing to the distribution channel.
    Running,
    /// Parked at the top of its duty cycle; shared state belongs to the supervisor.
    Parked,
    /// Reading and decoding, with output diverted to the replay queue.
    Buffering,
}

#[derive(Debug)]
pub(crate) struct ParkHandshake {
    pause: AtomicBool,
    is_paused: AtomicBool,
    buffer: AtomicBool,
    epoch: AtomicU64,
    acked: AtomicU64,
    detached: AtomicBool,
}

impl ParkHandshake {
    /// A new reader starts parked and buffering until its first connect.
    pub(crate) fn new() -> Self {
        Self {
            pause: AtomicBool::new(true),
            is_paused: AtomicBool::new(false),
            buffer: AtomicBool::new(true),
            epoch: AtomicU64::new(0),
            acked: AtomicU64::new(0),
            detached: AtomicBool::new(false),
        }
    }

    /// Supervisor: requests a park and waits for the worker to acknowledge it.
    ///
    /// # Errors
    /// Returns [`ReaderError::Interrupted`] if `interrupt` is raised first. The
    /// park request stays raised in that case.
    pub(crate) fn park(&self, interrupt: &Interrupt) -> Result<(), ReaderError> {
        self.pause.store(true, Ordering::Release);
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        let backoff = Backoff::new();
        while self.acked.load(Ordering::Acquire) < epoch
            && !self.detached.load(Ordering::Acquire)
        {
            if interrupt.is_raised() {
                return Err(ReaderError::Interrupted);
            }
            backoff.snooze();
        }
        Ok(())
    }

    /// Supervisor: raises the park request without waiting.
    #[inline]
    pub(crate) fn request_pause(&self) {
        self.pause.store(true, Ordering::Release);
    }

    /// Supervisor: hands shared state back to the worker.
    #[inline]
    pub(crate) fn release(&self) {
        self.pause.store(false, Ordering::Release);
    }

    #[inline]
    pub(crate) fn set_buffering(&self, buffering: bool) {
        self.buffer.store(buffering, Ordering::Release);
    }

    #[inline]
    pub(crate) fn is_buffering(&self) -> bool {
        self.buffer.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn pause_requested(&self) -> bool {
        self.pause.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn is_paused(&self) -> bool {
        self.is_paused.load(Ordering::Acquire)
    }

    /// Worker: returns `true` when the worker must stay parked this cycle.
    ///
    /// Must be called before every access to shared state.
    #[inline]
    pub(crate) fn worker_should_park(&self) -> bool {
        if !self.pause.load(Ordering::Acquire) {
            if self.is_paused.load(Ordering::Relaxed) {
                self.is_paused.store(false, Ordering::Release);
            }
            return false;
        }
        let epoch = self.epoch.load(Ordering::Acquire);
        self.is_paused.store(true, Ordering::Release);
        self.acked.store(epoch, Ordering::Release);
        true
    }

    /// Worker: the worker is gone for good; every later park succeeds at once.
    pub(crate) fn detach_worker(&self) {
        self.is_paused.store(true, Ordering::Release);
        self.detached.store(true, Ordering::Release);
    }

    pub(crate) fn state(&self) -> ReaderState {
        if self.is_paused() && self.pause_requested() {
            ReaderState::Parked
        } else if self.is_buffering() {
            ReaderState::Buffering
        } else {
            ReaderState::Running
        }
    }
}
