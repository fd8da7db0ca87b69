//! Supervisor agent for one instrument feed.
//!
//! [`MarketInboundGateway`] owns the control half of a reader and a
//! [`SocketConnectController`]. Its duty cycle polls three schedules:
//!
//! - `reconnect`: disconnect, then connect through the controller. Forced
//!   early when the worker reports a lost connection, when the feed has been
//!   silent for longer than the configured limit, when the sanity check finds
//!   a crossed book, or on request from another thread.
//! - `keep_alive`: queue a control frame on the outbound writer.
//! - `sanity_check`: inspect the book while the worker is parked.

use super::agent::Agent;
use super::channel::OutboundChannel;
use super::config::GatewayConfig;
use super::controller::{Connect, SocketConnectController};
use super::error::{GatewayError, ReaderError};
use super::interrupt::Interrupt;
use super::reader::{FeedGateway, SnapshotSource, SocketReaderControl};
use super::schedule::{Schedule, ScheduleTrigger};
use super::writer::WriterHandle;
use crate::book::Book;
use crate::telemetry;
use crate::utils::Clock;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Reader operations the supervisor needs beyond [`Connect`].
pub trait SupervisedReader: Connect {
    /// Parks the worker and tears the session down.
    ///
    /// # Errors
    /// Returns the [`ReaderError`] raised by the teardown.
    fn disconnect(&mut self, interrupt: &Interrupt) -> Result<(), ReaderError>;

    /// Receive time of the most recent frame, or zero before the first one.
    fn last_recv_nanos(&self) -> u64;

    /// True once the worker reported a dead connection, until the next connect.
    fn connection_lost(&self) -> bool;

    /// Checks whether the best bid is at or above the best ask.
    ///
    /// # Errors
    /// Returns [`ReaderError::Interrupted`] if the worker could not be parked.
    fn book_is_crossed(&mut self, interrupt: &Interrupt) -> Result<bool, ReaderError>;
}

impl<G, B, C, S> SupervisedReader for SocketReaderControl<G, B, C, S>
where
    G: FeedGateway,
    B: Book,
    C: OutboundChannel,
    S: SnapshotSource<B>,
{
    #[inline]
    fn disconnect(&mut self, interrupt: &Interrupt) -> Result<(), ReaderError> {
        SocketReaderControl::disconnect(self, interrupt)
    }

    #[inline]
    fn last_recv_nanos(&self) -> u64 {
        SocketReaderControl::last_recv_nanos(self)
    }

    #[inline]
    fn connection_lost(&self) -> bool {
        SocketReaderControl::connection_lost(self)
    }

    fn book_is_crossed(&mut self, interrupt: &Interrupt) -> Result<bool, ReaderError> {
        self.inspect(interrupt, |book| book.is_crossed())
    }
}

/// Handles that let other threads poke a running gateway.
#[derive(Debug, Clone)]
pub struct GatewayTriggers {
    reconnect: ScheduleTrigger,
    keep_alive: ScheduleTrigger,
    shutdown: Interrupt,
}

impl GatewayTriggers {
    /// Reconnects on the gateway's next duty cycle.
    pub fn force_reconnect(&self) {
        telemetry::forced_reconnect();
        self.reconnect.trigger();
    }

    /// Sends a keep-alive on the gateway's next duty cycle.
    pub fn force_keep_alive(&self) {
        self.keep_alive.trigger();
    }

    /// Aborts any blocking connect, disconnect or backoff in progress. The
    /// gateway treats the abort as fatal and stops.
    pub fn shutdown(&self) {
        self.shutdown.raise();
    }
}

/// Supervisor for one instrument's [`SupervisedReader`].
pub struct MarketInboundGateway<R> {
    reader: R,
    controller: SocketConnectController,
    config: GatewayConfig,
    clock: Arc<dyn Clock>,
    interrupt: Interrupt,
    keep_alive_frame: Option<(WriterHandle, Bytes)>,
    connected_at: Option<u64>,
    reconnect: Schedule,
    keep_alive: Schedule,
    sanity_check: Schedule,
}

impl<R: SupervisedReader> MarketInboundGateway<R> {
    /// Creates a gateway. Schedules stay idle until [`Self::start`].
    ///
    /// `clock` must be the clock the reader stamps frames with, otherwise the
    /// silent-feed check compares unrelated timestamps.
    pub fn new(reader: R, config: GatewayConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            reader,
            controller: SocketConnectController::from_config(&config),
            reconnect: Schedule::new("reconnect", config.reconnect_interval),
            keep_alive: Schedule::new("keep_alive", config.keep_alive_interval),
            sanity_check: Schedule::new("sanity_check", config.sanity_check_interval),
            config,
            clock,
            interrupt: Interrupt::new(),
            keep_alive_frame: None,
            connected_at: None,
        }
    }

    /// Sends `frame` on `writer`'s control lane at every keep-alive.
    #[must_use = "builders do nothing unless consumed"]
    #[inline]
    pub fn with_keep_alive(mut self, writer: WriterHandle, frame: Bytes) -> Self {
        self.keep_alive_frame = Some((writer, frame));
        self
    }

    /// Configuration in use.
    #[inline]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Supervised reader.
    #[inline]
    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// True between a successful connect and the next disconnect.
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.connected_at.is_some()
    }

    /// Trigger handles for other threads.
    pub fn triggers(&self) -> GatewayTriggers {
        GatewayTriggers {
            reconnect: self.reconnect.trigger(),
            keep_alive: self.keep_alive.trigger(),
            shutdown: self.interrupt.clone(),
        }
    }

    /// Reconnects on the next duty cycle.
    pub fn force_reconnect(&self) {
        telemetry::forced_reconnect();
        self.reconnect.force_trigger();
    }

    /// Sends a keep-alive on the next duty cycle.
    pub fn force_keep_alive(&self) {
        self.keep_alive.force_trigger();
    }

    /// Connects, then arms the schedules.
    ///
    /// # Errors
    /// Returns [`GatewayError::Connect`] when every attempt failed.
    pub fn start(&mut self) -> Result<(), GatewayError> {
        self.connect()?;
        let clock = &*self.clock;
        self.reconnect.start(clock);
        self.keep_alive.start(clock);
        self.sanity_check.start(clock);
        info!(
            reconnect = ?self.config.reconnect_interval,
            keep_alive = ?self.config.keep_alive_interval,
            sanity_check = ?self.config.sanity_check_interval,
            "market inbound gateway started"
        );
        Ok(())
    }

    /// One supervisor duty cycle. Returns the number of schedules that fired.
    ///
    /// # Errors
    /// - [`GatewayError::Connect`] when a reconnect exhausted its attempts or
    ///   was interrupted.
    /// - [`GatewayError::Reader`] when the sanity check could not park the
    ///   worker.
    /// - [`GatewayError::Writer`] when the keep-alive frame could not be queued.
    pub fn poll(&mut self) -> Result<usize, GatewayError> {
        self.check_liveness();

        let mut fired = 0;
        if self.reconnect.check(&*self.clock) {
            fired += 1;
            self.reconnect_now()?;
        }
        if self.keep_alive.check(&*self.clock) {
            fired += 1;
            self.send_keep_alive()?;
        }
        if self.sanity_check.check(&*self.clock) {
            fired += 1;
            self.run_sanity_check()?;
        }
        Ok(fired)
    }

    /// Disconnects the reader. Uses a fresh interrupt so shutdown can still
    /// park a live worker.
    pub fn close(&mut self) {
        self.connected_at = None;
        if let Err(err) = self.reader.disconnect(&Interrupt::new()) {
            warn!(error = %err, "disconnect on close failed");
        }
        info!("market inbound gateway closed");
    }

    fn check_liveness(&self) {
        let Some(connected_at) = self.connected_at else {
            return;
        };
        if self.reader.connection_lost() {
            warn!("feed reported connection loss; forcing reconnect");
            self.force_reconnect();
            return;
        }
        let last_activity = self.reader.last_recv_nanos().max(connected_at);
        let silent_for = self.clock.nanos().saturating_sub(last_activity);
        if Duration::from_nanos(silent_for) > self.config.max_silent_interval {
            warn!(
                silent_for = ?Duration::from_nanos(silent_for),
                limit = ?self.config.max_silent_interval,
                "feed silent; forcing reconnect"
            );
            self.force_reconnect();
        }
    }

    fn connect(&mut self) -> Result<(), GatewayError> {
        self.controller.connect(&mut self.reader, &self.interrupt)?;
        self.connected_at = Some(self.clock.nanos());
        Ok(())
    }

    fn reconnect_now(&mut self) -> Result<(), GatewayError> {
        info!("reconnecting feed");
        self.connected_at = None;
        match self.reader.disconnect(&self.interrupt) {
            Ok(()) => {}
            Err(ReaderError::Interrupted) => return Err(ReaderError::Interrupted.into()),
            Err(err) => warn!(error = %err, "disconnect before reconnect failed"),
        }
        self.connect()
    }

    fn send_keep_alive(&self) -> Result<(), GatewayError> {
        let Some((writer, frame)) = &self.keep_alive_frame else {
            debug!("keep-alive due; no outbound writer configured");
            return Ok(());
        };
        writer.enqueue_control(frame.clone())?;
        debug!(len = frame.len(), "keep-alive queued");
        Ok(())
    }

    fn run_sanity_check(&mut self) -> Result<(), GatewayError> {
        if self.connected_at.is_none() || self.reader.connection_lost() {
            return Ok(());
        }
        if self.reader.book_is_crossed(&self.interrupt)? {
            warn!("book crossed; forcing reconnect");
            self.force_reconnect();
        } else {
            debug!("book sanity check passed");
        }
        Ok(())
    }
}

impl<R: SupervisedReader + 'static> Agent for MarketInboundGateway<R> {
    type Error = GatewayError;

    fn role_name(&self) -> &str {
        "market-inbound-gateway"
    }

    fn on_start(&mut self) -> Result<(), GatewayError> {
        self.start()
    }

    #[inline]
    fn do_work(&mut self) -> Result<usize, GatewayError> {
        self.poll()
    }

    fn on_close(&mut self) {
        self.close();
    }

    fn is_fatal(&self, error: &GatewayError) -> bool {
        error.is_fatal()
    }
}
