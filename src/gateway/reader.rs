//! Feed worker and its supervisor-side control half.
//!
//! A reader is built as two halves sharing one book, one decoder and one
//! transport:
//!
//! - [`SocketReader`] runs on the worker thread. Each [`SocketReader::do_work`]
//!   call polls the transport once, lets the [`FeedGateway`] decode the frame
//!   into the scratch record and offers every decoded record either to the
//!   book and the distribution channel or, during a connect window, to the
//!   replay queue.
//! - [`SocketReaderControl`] runs on the supervisor thread and performs the
//!   blocking connect, disconnect and inspection sequences.
//!
//! The halves never lock. The supervisor touches shared state only while the
//! worker is parked (see [`handshake`](super::handshake)).
//!
//! # Gapless connect
//!
//! [`SocketReaderControl::connect`] parks the worker, attaches the transport,
//! resets the book, then lets the worker run with output diverted into the
//! replay queue while the snapshot is fetched. It then parks the worker again,
//! installs the snapshot, replays every buffered record whose sequence is not
//! older than the snapshot's, and resumes live publishing. Nothing decoded
//! between subscribing and taking the snapshot is lost, and nothing reaches
//! the distribution channel before the book is consistent.

use super::channel::{OfferStatus, OutboundChannel};
use super::error::{ReaderError, TransportError};
use super::handshake::{ParkHandshake, ReaderState};
use super::interrupt::Interrupt;
use super::replay::{DEFAULT_REPLAY_CAPACITY, ReplayQueue};
use crate::book::Book;
use crate::telemetry;
use crate::utils::{Clock, SystemClock};
use crate::wire::{MarketRecord, VISIBLE_DEPTH};
use bytes::{Buf, Bytes};
use std::cell::UnsafeCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

/// Decoder-facing handle used to emit records from [`FeedGateway::handle_message`].
pub trait RecordSink {
    /// Scratch record to decode into. It is not cleared between offers.
    fn record_mut(&mut self) -> &mut MarketRecord;

    /// Receive time of the frame being decoded.
    fn recv_timestamp(&self) -> u64;

    /// Submits the scratch record.
    ///
    /// # Errors
    /// Returns [`ReaderError::ChannelClosed`] if the distribution channel is
    /// gone.
    fn offer(&mut self) -> Result<(), ReaderError>;
}

/// Exchange connection plus decoder, driven by the reader.
///
/// `read` and `handle_message` run on the worker thread. `attach` and `detach`
/// run on the supervisor thread while the worker is parked.
pub trait FeedGateway: Send + 'static {
    /// Opens the connection and subscribes. May block; should give up when
    /// `interrupt` is raised.
    ///
    /// # Errors
    /// Returns a [`TransportError`] when the session cannot be established.
    fn attach(&mut self, interrupt: &Interrupt) -> Result<(), TransportError>;

    /// Closes the connection.
    ///
    /// # Errors
    /// Returns a [`TransportError`] when teardown fails; the reader resets its
    /// state regardless.
    fn detach(&mut self) -> Result<(), TransportError>;

    /// Non-blocking read of the next frame. `Ok(None)` means no data yet.
    ///
    /// # Errors
    /// Returns [`TransportError::ConnectionLost`] once the remote end closed.
    fn read(&mut self) -> Result<Option<Bytes>, TransportError>;

    /// Decodes one message from the front of `frame`, advancing past it, and
    /// offers zero or more records through `sink`.
    ///
    /// # Errors
    /// Propagates errors from [`RecordSink::offer`].
    fn handle_message(
        &mut self,
        frame: &mut Bytes,
        sink: &mut dyn RecordSink,
    ) -> Result<(), ReaderError>;
}

/// Blocking source of a book snapshot, called during connect.
pub trait SnapshotSource<B>: Send {
    /// Fetches the current book. `Ok(None)` means the venue has no snapshot
    /// endpoint and the replayed updates alone rebuild the book.
    ///
    /// # Errors
    /// Returns a [`TransportError`] when the fetch fails.
    fn fetch_snapshot(&mut self, interrupt: &Interrupt) -> Result<Option<B>, TransportError>;
}

/// Snapshot source for venues that publish the full depth on every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSnapshot;

impl<B> SnapshotSource<B> for NoSnapshot {
    fn fetch_snapshot(&mut self, _interrupt: &Interrupt) -> Result<Option<B>, TransportError> {
        Ok(None)
    }
}

/// Point-in-time reader counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReaderStats {
    /// Records published to the distribution channel.
    pub published: u64,
    /// Records diverted into the replay queue.
    pub buffered: u64,
    /// Buffered records applied to the book after a snapshot.
    pub replayed: u64,
    /// Buffered records older than the snapshot.
    pub discarded: u64,
    /// Connect windows whose replay queue overflowed.
    pub overflows: u64,
    /// Successful connects.
    pub connects: u64,
}

#[derive(Debug, Default)]
struct Counters {
    published: AtomicU64,
    buffered: AtomicU64,
    replayed: AtomicU64,
    discarded: AtomicU64,
    overflows: AtomicU64,
    connects: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> ReaderStats {
        ReaderStats {
            published: self.published.load(Ordering::Relaxed),
            buffered: self.buffered.load(Ordering::Relaxed),
            replayed: self.replayed.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            overflows: self.overflows.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
        }
    }
}

/// Lock-free state both halves may touch at any time.
#[derive(Debug)]
struct Signals {
    handshake: ParkHandshake,
    replay: ReplayQueue,
    overflowed: AtomicBool,
    connection_lost: AtomicBool,
    last_recv_nanos: AtomicU64,
    counters: Counters,
}

/// State owned by whichever side holds the handshake.
struct Core<G, B, C> {
    gateway: G,
    book: B,
    channel: C,
    scratch: MarketRecord,
}

struct Shared<G, B, C> {
    signals: Signals,
    core: UnsafeCell<Core<G, B, C>>,
}

// SAFETY: `core` is only reached through `Shared::core_mut`, and every caller
// holds the park handshake: the worker between a `worker_should_park() ==
// false` check and its return from `do_work`, the supervisor between a
// successful `park` and the following `release`. The handshake's
// acquire/release pairs order those accesses, so `core` is never accessed
// from two threads at once.
unsafe impl<G: Send, B: Send, C: Send> Sync for Shared<G, B, C> {}

impl<G, B, C> Shared<G, B, C> {
    /// # Safety
    /// The caller must own shared state under the park handshake and must drop
    /// the returned reference before handing ownership back.
    #[allow(clippy::mut_from_ref)]
    #[inline]
    unsafe fn core_mut(&self) -> &mut Core<G, B, C> {
        // SAFETY: exclusivity is guaranteed by the caller per the contract above.
        unsafe { &mut *self.core.get() }
    }
}

/// Builder for a [`SocketReader`] / [`SocketReaderControl`] pair.
pub struct ReaderBuilder<G, B, C> {
    gateway: G,
    book: B,
    channel: C,
    clock: Arc<dyn Clock>,
    replay_capacity: usize,
}

impl<G, B, C> ReaderBuilder<G, B, C>
where
    G: FeedGateway,
    B: Book,
    C: OutboundChannel,
{
    /// Starts a builder with the system clock and the default replay capacity.
    pub fn new(gateway: G, book: B, channel: C) -> Self {
        Self {
            gateway,
            book,
            channel,
            clock: Arc::new(SystemClock),
            replay_capacity: DEFAULT_REPLAY_CAPACITY,
        }
    }

    /// Sets the clock used to stamp receive times.
    #[must_use = "builders do nothing unless consumed"]
    #[inline]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets how many records a connect window may buffer.
    #[must_use = "builders do nothing unless consumed"]
    #[inline]
    pub fn with_replay_capacity(mut self, capacity: usize) -> Self {
        self.replay_capacity = capacity;
        self
    }

    /// Builds both halves. The worker starts parked until the first connect.
    pub fn build<S>(self, snapshots: S) -> (SocketReader<G, B, C>, SocketReaderControl<G, B, C, S>)
    where
        S: SnapshotSource<B>,
    {
        let shared = Arc::new(Shared {
            signals: Signals {
                handshake: ParkHandshake::new(),
                replay: ReplayQueue::new(self.replay_capacity),
                overflowed: AtomicBool::new(false),
                connection_lost: AtomicBool::new(false),
                last_recv_nanos: AtomicU64::new(0),
                counters: Counters::default(),
            },
            core: UnsafeCell::new(Core {
                gateway: self.gateway,
                book: self.book,
                channel: self.channel,
                scratch: MarketRecord::new(),
            }),
        });
        let worker = SocketReader {
            shared: Arc::clone(&shared),
            clock: self.clock,
        };
        let control = SocketReaderControl { shared, snapshots };
        (worker, control)
    }
}

/// Worker half of a reader.
pub struct SocketReader<G, B, C> {
    shared: Arc<Shared<G, B, C>>,
    clock: Arc<dyn Clock>,
}

impl<G, B, C> SocketReader<G, B, C>
where
    G: FeedGateway,
    B: Book,
    C: OutboundChannel,
{
    /// Starts a [`ReaderBuilder`].
    pub fn builder(gateway: G, book: B, channel: C) -> ReaderBuilder<G, B, C> {
        ReaderBuilder::new(gateway, book, channel)
    }

    /// Runs one duty cycle and returns the number of messages handled.
    ///
    /// While parked this acknowledges the park request and returns `Ok(0)`
    /// without touching the transport or the book.
    ///
    /// # Errors
    /// - [`ReaderError::ConnectionLost`] or [`ReaderError::Transport`] when the
    ///   read fails. The worker parks itself and raises the connection-lost
    ///   signal; reconnecting is the supervisor's job.
    /// - [`ReaderError::ChannelClosed`] when the distribution channel is gone.
    pub fn do_work(&mut self) -> Result<usize, ReaderError> {
        let signals = &self.shared.signals;
        if signals.handshake.worker_should_park() {
            return Ok(0);
        }

        // SAFETY: not parked; the worker owns shared state until it returns
        // and checks the handshake again on the next cycle.
        let core = unsafe { self.shared.core_mut() };
        let Core {
            gateway,
            book,
            channel,
            scratch,
        } = core;

        let mut frame = match gateway.read() {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(0),
            Err(err) => return Err(lose_connection(signals, err)),
        };

        let mut handled = 0;
        while frame.has_remaining() {
            let remaining = frame.remaining();
            let now = self.clock.nanos();
            signals.last_recv_nanos.store(now, Ordering::Release);

            let mut sink = Offer {
                scratch: &mut *scratch,
                book: &mut *book,
                channel: &mut *channel,
                signals,
                recv_timestamp: now,
            };
            gateway.handle_message(&mut frame, &mut sink)?;

            if frame.remaining() == remaining {
                warn!(remaining, "feed gateway made no progress; dropping rest of frame");
                break;
            }
            handled += 1;
        }
        Ok(handled)
    }

    /// Observed worker state.
    #[inline]
    pub fn state(&self) -> ReaderState {
        self.shared.signals.handshake.state()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> ReaderStats {
        self.shared.signals.counters.snapshot()
    }
}

impl<G, B, C> Drop for SocketReader<G, B, C> {
    fn drop(&mut self) {
        self.shared.signals.handshake.detach_worker();
    }
}

fn lose_connection(signals: &Signals, err: TransportError) -> ReaderError {
    signals.connection_lost.store(true, Ordering::Release);
    signals.handshake.request_pause();
    match err {
        TransportError::ConnectionLost => {
            warn!("feed connection lost; parking until reconnect");
            ReaderError::ConnectionLost
        }
        other => {
            warn!(error = %other, "feed read failed; parking until reconnect");
            ReaderError::Transport(other)
        }
    }
}

struct Offer<'a, B, C> {
    scratch: &'a mut MarketRecord,
    book: &'a mut B,
    channel: &'a mut C,
    signals: &'a Signals,
    recv_timestamp: u64,
}

impl<B: Book, C: OutboundChannel> RecordSink for Offer<'_, B, C> {
    #[inline]
    fn record_mut(&mut self) -> &mut MarketRecord {
        &mut *self.scratch
    }

    #[inline]
    fn recv_timestamp(&self) -> u64 {
        self.recv_timestamp
    }

    fn offer(&mut self) -> Result<(), ReaderError> {
        self.scratch.timestamp_recv = self.recv_timestamp;
        let signals = self.signals;

        if signals.handshake.is_buffering() {
            if signals.replay.push(&*self.scratch).is_ok() {
                signals.counters.buffered.fetch_add(1, Ordering::Relaxed);
            } else if !signals.overflowed.swap(true, Ordering::AcqRel) {
                signals.counters.overflows.fetch_add(1, Ordering::Relaxed);
                telemetry::replay_overflow();
                error!(
                    capacity = signals.replay.capacity(),
                    sequence = self.scratch.sequence,
                    "replay queue overflow; connect attempt will be abandoned"
                );
            }
            return Ok(());
        }

        let changed = self.book.update_from(&*self.scratch);
        self.scratch.set_depth(
            changed
                .filter(|&depth| depth < VISIBLE_DEPTH)
                .and_then(|depth| u8::try_from(depth).ok()),
        );
        self.book.write_to(&mut *self.scratch);
        publish(&mut *self.channel, &*self.scratch)?;
        signals.counters.published.fetch_add(1, Ordering::Relaxed);
        telemetry::record_published();
        Ok(())
    }
}

/// Busy-retries through back-pressure.
#[inline]
fn publish<C: OutboundChannel>(channel: &mut C, record: &MarketRecord) -> Result<(), ReaderError> {
    loop {
        match channel.offer(record) {
            OfferStatus::Accepted => return Ok(()),
            OfferStatus::BackPressured => std::hint::spin_loop(),
            OfferStatus::Closed => {
                error!(sequence = record.sequence, "distribution channel closed");
                return Err(ReaderError::ChannelClosed);
            }
        }
    }
}

/// Supervisor half of a reader.
pub struct SocketReaderControl<G, B, C, S> {
    shared: Arc<Shared<G, B, C>>,
    snapshots: S,
}

impl<G, B, C, S> SocketReaderControl<G, B, C, S>
where
    G: FeedGateway,
    B: Book,
    C: OutboundChannel,
    S: SnapshotSource<B>,
{
    /// Runs the gapless connect sequence. Blocks until the worker publishes
    /// live again.
    ///
    /// On failure the worker is left parked with buffering on, so a partially
    /// built book never reaches the distribution channel. An attempt that got
    /// past `attach` detaches the transport before returning.
    ///
    /// # Errors
    /// - [`ReaderError::Interrupted`] if `interrupt` is raised during a
    ///   handshake wait.
    /// - [`ReaderError::Transport`] if attaching or the snapshot fetch fails.
    /// - [`ReaderError::ConnectionLost`] if the feed dropped while the
    ///   snapshot was being fetched.
    /// - [`ReaderError::ReplayOverflow`] if the worker buffered more records
    ///   than the replay queue holds.
    pub fn connect(&mut self, interrupt: &Interrupt) -> Result<(), ReaderError> {
        let mut attached = false;
        let result = self.run_connect(interrupt, &mut attached);
        if let Err(err) = &result {
            debug!(error = %err, attached, "connect attempt abandoned; worker left parked");
            self.abandon(attached);
        }
        result
    }

    fn run_connect(
        &mut self,
        interrupt: &Interrupt,
        attached: &mut bool,
    ) -> Result<(), ReaderError> {
        let signals = &self.shared.signals;
        signals.handshake.set_buffering(true);
        signals.handshake.park(interrupt)?;

        {
            // SAFETY: parked; the reference is dropped before `release`.
            let core = unsafe { self.shared.core_mut() };
            core.gateway.attach(interrupt)?;
            *attached = true;
            core.book.reset();
            core.scratch.reset();
        }
        signals.replay.clear();
        signals.overflowed.store(false, Ordering::Release);
        signals.connection_lost.store(false, Ordering::Release);
        signals.handshake.release();
        debug!("transport attached; buffering while the snapshot is fetched");

        let snapshot = self.snapshots.fetch_snapshot(interrupt)?;
        signals.handshake.park(interrupt)?;

        if signals.connection_lost.load(Ordering::Acquire) {
            signals.replay.clear();
            return Err(ReaderError::ConnectionLost);
        }
        if signals.overflowed.load(Ordering::Acquire) {
            signals.replay.clear();
            return Err(ReaderError::ReplayOverflow {
                capacity: signals.replay.capacity(),
            });
        }

        // SAFETY: parked again; the reference is dropped before `release`.
        let core = unsafe { self.shared.core_mut() };
        if let Some(snapshot) = &snapshot {
            core.book.copy_from(snapshot);
        }

        let floor = snapshot.as_ref().map(Book::sequence_number);
        let mut replayed = 0u64;
        let mut discarded = 0u64;
        signals.replay.drain(|record| {
            if floor.is_none_or(|floor| record.sequence >= floor) {
                core.book.update_from(record);
                replayed += 1;
            } else {
                discarded += 1;
            }
        });

        let counters = &signals.counters;
        counters.replayed.fetch_add(replayed, Ordering::Relaxed);
        counters.discarded.fetch_add(discarded, Ordering::Relaxed);
        counters.connects.fetch_add(1, Ordering::Relaxed);
        telemetry::records_replayed(replayed);
        telemetry::records_discarded(discarded);

        signals.handshake.set_buffering(false);
        signals.handshake.release();
        info!(
            replayed,
            discarded,
            snapshot_sequence = ?floor,
            "feed connected"
        );
        Ok(())
    }

    /// Leaves the worker parked and, when the attempt had attached, tears the
    /// session down the way [`disconnect`](Self::disconnect) does.
    fn abandon(&mut self, attached: bool) {
        let signals = &self.shared.signals;
        signals.handshake.set_buffering(true);
        if !attached {
            signals.handshake.request_pause();
            return;
        }

        // The attempt's interrupt may already be raised. A worker that is
        // polled or dropped always acknowledges, so wait on a fresh token.
        if let Err(err) = signals.handshake.park(&Interrupt::new()) {
            warn!(error = %err, "could not park the worker; transport left attached");
            return;
        }
        // SAFETY: parked; the worker stays parked after this returns.
        let core = unsafe { self.shared.core_mut() };
        if let Err(err) = core.gateway.detach() {
            warn!(error = %err, "transport detach failed after an abandoned connect");
        }
        core.book.reset();
        signals.replay.clear();
    }

    /// Parks the worker, detaches the transport and empties the book and the
    /// replay queue. The worker stays parked until the next connect.
    ///
    /// # Errors
    /// - [`ReaderError::Interrupted`] if `interrupt` is raised while waiting.
    /// - [`ReaderError::Transport`] if detaching fails. State is reset anyway.
    pub fn disconnect(&mut self, interrupt: &Interrupt) -> Result<(), ReaderError> {
        let signals = &self.shared.signals;
        signals.handshake.set_buffering(true);
        signals.handshake.park(interrupt)?;

        // SAFETY: parked; the worker stays parked after this returns.
        let core = unsafe { self.shared.core_mut() };
        let detached = core.gateway.detach();
        core.book.reset();
        signals.replay.clear();

        match detached {
            Ok(()) => {
                info!("feed disconnected");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "transport detach failed; reader state reset anyway");
                Err(err.into())
            }
        }
    }

    /// Parks the worker, runs `inspect` against the book and restores the
    /// previous park state. A worker that lost its connection stays parked.
    ///
    /// # Errors
    /// Returns [`ReaderError::Interrupted`] if `interrupt` is raised while
    /// waiting for the worker.
    pub fn inspect<R>(
        &mut self,
        interrupt: &Interrupt,
        inspect: impl FnOnce(&B) -> R,
    ) -> Result<R, ReaderError> {
        let signals = &self.shared.signals;
        let was_parked = signals.handshake.pause_requested();
        signals.handshake.park(interrupt)?;

        let result = {
            // SAFETY: parked; the reference is dropped before `release`.
            let core = unsafe { self.shared.core_mut() };
            inspect(&core.book)
        };

        if !was_parked && !signals.connection_lost.load(Ordering::Acquire) {
            signals.handshake.release();
        }
        Ok(result)
    }

    /// Observed worker state.
    #[inline]
    pub fn state(&self) -> ReaderState {
        self.shared.signals.handshake.state()
    }

    /// Receive time of the most recent frame, or zero before the first one.
    #[inline]
    pub fn last_recv_nanos(&self) -> u64 {
        self.shared.signals.last_recv_nanos.load(Ordering::Acquire)
    }

    /// True once the worker reported a dead connection, until the next connect.
    #[inline]
    pub fn connection_lost(&self) -> bool {
        self.shared.signals.connection_lost.load(Ordering::Acquire)
    }

    /// Capacity of the replay queue.
    #[inline]
    pub fn replay_capacity(&self) -> usize {
        self.shared.signals.replay.capacity()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> ReaderStats {
        self.shared.signals.counters.snapshot()
    }
}
