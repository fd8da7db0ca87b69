//! Retrying connect with a per-attempt timeout and exponential backoff.

use super::channel::OutboundChannel;
use super::config::GatewayConfig;
use super::error::{AttemptError, ConnectError, ReaderError};
use super::interrupt::Interrupt;
use super::reader::{FeedGateway, SnapshotSource, SocketReaderControl};
use crate::book::Book;
use crate::telemetry;
use crossbeam::channel::{RecvTimeoutError, bounded};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// Upper bound for the backoff delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Something that can be connected by a blocking call.
pub trait Connect: Send {
    /// Performs one connect attempt. Should give up when `interrupt` is raised.
    ///
    /// # Errors
    /// Returns the [`ReaderError`] that made the attempt fail.
    fn connect(&mut self, interrupt: &Interrupt) -> Result<(), ReaderError>;
}

impl<G, B, C, S> Connect for SocketReaderControl<G, B, C, S>
where
    G: FeedGateway,
    B: Book,
    C: OutboundChannel,
    S: SnapshotSource<B>,
{
    #[inline]
    fn connect(&mut self, interrupt: &Interrupt) -> Result<(), ReaderError> {
        SocketReaderControl::connect(self, interrupt)
    }
}

/// Drives a [`Connect`] until it succeeds, the attempt budget runs out or the
/// caller interrupts.
///
/// Each attempt runs under a watchdog thread. When the watchdog fires it
/// raises a child interrupt private to that attempt, so the caller's own
/// interrupt is never raised or cleared by the controller.
#[derive(Debug, Clone)]
pub struct SocketConnectController {
    connect_timeout: Duration,
    max_reconnect_attempts: u32,
    initial_backoff: Duration,
}

impl SocketConnectController {
    /// Creates a controller making `1 + max_reconnect_attempts` attempts.
    pub fn new(
        connect_timeout: Duration,
        max_reconnect_attempts: u32,
        initial_backoff: Duration,
    ) -> Self {
        Self {
            connect_timeout,
            max_reconnect_attempts,
            initial_backoff,
        }
    }

    /// Creates a controller from the gateway configuration.
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(
            config.connect_timeout,
            config.max_reconnect_attempts,
            config.initial_backoff,
        )
    }

    /// Total attempts per [`SocketConnectController::connect`] call.
    #[inline]
    pub fn max_attempts(&self) -> u32 {
        self.max_reconnect_attempts.saturating_add(1)
    }

    /// Backoff that follows `current`: doubled, capped at [`MAX_BACKOFF`].
    #[inline]
    pub fn next_backoff(current: Duration) -> Duration {
        current.saturating_mul(2).min(MAX_BACKOFF)
    }

    /// Connects `connector`, retrying with backoff.
    ///
    /// Backoff starts at the initial delay on every call, so a success resets
    /// it for the next call. No sleep follows the final attempt.
    ///
    /// # Errors
    /// - [`ConnectError::Interrupted`] when `interrupt` is raised before or
    ///   during an attempt, or during a backoff sleep. The flag stays raised.
    /// - [`ConnectError::Exhausted`] when every attempt failed; carries the
    ///   last attempt's cause.
    pub fn connect<C: Connect + ?Sized>(
        &self,
        connector: &mut C,
        interrupt: &Interrupt,
    ) -> Result<(), ConnectError> {
        let max_attempts = self.max_attempts();
        let mut backoff = self.initial_backoff;
        let mut attempt = 0u32;

        loop {
            if interrupt.is_raised() {
                return Err(ConnectError::Interrupted);
            }
            attempt += 1;
            info!(attempt, max = max_attempts, "connecting feed");
            telemetry::connect_attempt();

            let cause = match self.attempt(connector, interrupt) {
                Ok(()) => {
                    telemetry::connect_success();
                    info!(attempt, "feed connect succeeded");
                    return Ok(());
                }
                Err(cause) => cause,
            };

            if interrupt.is_raised() {
                warn!(attempt, error = %cause, "connect interrupted by caller");
                return Err(ConnectError::Interrupted);
            }
            match &cause {
                AttemptError::Timeout { after } => {
                    telemetry::connect_timeout();
                    warn!(attempt, max = max_attempts, timeout = ?after, "feed connect timed out");
                }
                AttemptError::Failed(err) => {
                    telemetry::connect_failure();
                    warn!(attempt, max = max_attempts, error = %err, "feed connect failed");
                }
            }

            if attempt >= max_attempts {
                return Err(ConnectError::Exhausted {
                    attempts: attempt,
                    source: cause,
                });
            }

            info!(backoff = ?backoff, "backing off before next connect attempt");
            if !interrupt.sleep(backoff) {
                return Err(ConnectError::Interrupted);
            }
            backoff = Self::next_backoff(backoff);
        }
    }

    /// One attempt under a watchdog. A success that races with the watchdog
    /// counts as a timeout.
    fn attempt<C: Connect + ?Sized>(
        &self,
        connector: &mut C,
        interrupt: &Interrupt,
    ) -> Result<(), AttemptError> {
        let attempt_interrupt = interrupt.child();
        let timed_out = AtomicBool::new(false);
        let (done, done_rx) = bounded::<()>(1);
        let timeout = self.connect_timeout;

        let result = thread::scope(|scope| {
            scope.spawn(|| {
                if matches!(done_rx.recv_timeout(timeout), Err(RecvTimeoutError::Timeout)) {
                    timed_out.store(true, Ordering::Release);
                    attempt_interrupt.raise();
                }
            });
            let result = connector.connect(&attempt_interrupt);
            drop(done);
            result
        });

        if timed_out.load(Ordering::Acquire) {
            return Err(AttemptError::Timeout { after: timeout });
        }
        result.map_err(AttemptError::Failed)
    }
}
