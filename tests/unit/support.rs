//! Scripted transports, snapshot sources and helpers shared by the
//! integration tests.

use bytes::{Bytes, BytesMut};
use crossbeam::channel::{Receiver, Sender, TryRecvError, unbounded};
use marketfeed_rs::prelude::*;
use marketfeed_rs::wire::RECORD_LEN;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Single-level delta.
pub fn delta(sequence: u64, side: Side, price: i64, size: i64) -> MarketRecord {
    let mut record = MarketRecord::new();
    record.sequence = sequence;
    record.set_action(Action::Modify);
    record.set_side(side);
    record.price = price;
    record.size = size;
    record
}

/// Concatenates encoded records into one transport frame.
pub fn frame_of(records: &[MarketRecord]) -> Bytes {
    let mut frame = BytesMut::with_capacity(records.len() * RECORD_LEN);
    for record in records {
        frame.extend_from_slice(&record.encode());
    }
    frame.freeze()
}

// ---------------------------------------------------------------------------
// Scripted transport
// ---------------------------------------------------------------------------

/// Test-side view of a [`ScriptedFeed`].
#[derive(Debug)]
pub struct FeedScript {
    frames: Sender<Bytes>,
    pending: Receiver<Bytes>,
    attached: AtomicBool,
    pub attaches: AtomicUsize,
    pub detaches: AtomicUsize,
    pub reads_while_detached: AtomicUsize,
    pub decoded: AtomicU64,
    fail_attaches: AtomicUsize,
    hang_attach: AtomicBool,
    lose_connection: AtomicBool,
    stall: AtomicBool,
}

impl FeedScript {
    /// Queues one frame for the worker.
    pub fn push(&self, records: &[MarketRecord]) {
        self.frames.send(frame_of(records)).expect("frame queue");
    }

    /// Queues raw bytes for the worker.
    pub fn push_raw(&self, frame: Bytes) {
        self.frames.send(frame).expect("frame queue");
    }

    /// True once the worker has read every queued frame.
    pub fn drained(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Makes the next `count` attaches fail.
    pub fn fail_next_attaches(&self, count: usize) {
        self.fail_attaches.store(count, Ordering::Release);
    }

    /// Makes every attach block until it is interrupted.
    pub fn hang_attaches(&self, hang: bool) {
        self.hang_attach.store(hang, Ordering::Release);
    }

    /// Makes the next read report a closed connection.
    pub fn drop_connection(&self) {
        self.lose_connection.store(true, Ordering::Release);
    }

    /// Makes the decoder stop consuming bytes.
    pub fn stall_decoder(&self, stall: bool) {
        self.stall.store(stall, Ordering::Release);
    }
}

/// [`FeedGateway`] fed from a [`FeedScript`]; each frame holds whole encoded
/// records.
#[derive(Debug)]
pub struct ScriptedFeed {
    script: Arc<FeedScript>,
    frames: Receiver<Bytes>,
}

impl ScriptedFeed {
    pub fn new() -> (Self, Arc<FeedScript>) {
        let (sender, receiver) = unbounded();
        let script = Arc::new(FeedScript {
            frames: sender,
            pending: receiver.clone(),
            attached: AtomicBool::new(false),
            attaches: AtomicUsize::new(0),
            detaches: AtomicUsize::new(0),
            reads_while_detached: AtomicUsize::new(0),
            decoded: AtomicU64::new(0),
            fail_attaches: AtomicUsize::new(0),
            hang_attach: AtomicBool::new(false),
            lose_connection: AtomicBool::new(false),
            stall: AtomicBool::new(false),
        });
        let feed = Self {
            script: Arc::clone(&script),
            frames: receiver,
        };
        (feed, script)
    }
}

impl FeedGateway for ScriptedFeed {
    fn attach(&mut self, interrupt: &Interrupt) -> Result<(), TransportError> {
        let script = &self.script;
        script.attaches.fetch_add(1, Ordering::AcqRel);
        if script.hang_attach.load(Ordering::Acquire) {
            while !interrupt.is_raised() {
                thread::sleep(Duration::from_millis(1));
            }
            return Err(TransportError::Interrupted);
        }
        let failing = script.fail_attaches.load(Ordering::Acquire);
        if failing > 0 {
            script.fail_attaches.store(failing - 1, Ordering::Release);
            return Err(TransportError::Protocol {
                message: "subscription rejected".to_string(),
            });
        }
        script.attached.store(true, Ordering::Release);
        Ok(())
    }

    fn detach(&mut self) -> Result<(), TransportError> {
        self.script.detaches.fetch_add(1, Ordering::AcqRel);
        self.script.attached.store(false, Ordering::Release);
        Ok(())
    }

    fn read(&mut self) -> Result<Option<Bytes>, TransportError> {
        let script = &self.script;
        if !script.attached.load(Ordering::Acquire) {
            script.reads_while_detached.fetch_add(1, Ordering::AcqRel);
            return Ok(None);
        }
        if script.lose_connection.swap(false, Ordering::AcqRel) {
            script.attached.store(false, Ordering::Release);
            return Err(TransportError::ConnectionLost);
        }
        match self.frames.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(TransportError::ConnectionLost),
        }
    }

    fn handle_message(
        &mut self,
        frame: &mut Bytes,
        sink: &mut dyn RecordSink,
    ) -> Result<(), ReaderError> {
        if self.script.stall.load(Ordering::Acquire) {
            return Ok(());
        }
        if frame.len() < RECORD_LEN {
            return Err(TransportError::Protocol {
                message: format!("truncated record: {} bytes", frame.len()),
            }
            .into());
        }
        let chunk = frame.split_to(RECORD_LEN);
        let record = MarketRecord::decode(&chunk).map_err(|err| TransportError::Protocol {
            message: err.to_string(),
        })?;
        *sink.record_mut() = record;
        sink.offer()?;
        self.script.decoded.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Snapshot sources
// ---------------------------------------------------------------------------

/// Returns a fixed snapshot once the worker has read every queued frame, so
/// the records pushed before the connect land in the replay queue.
pub struct SnapshotAfterDrain<B> {
    pub script: Arc<FeedScript>,
    pub snapshot: Option<B>,
    pub calls: Arc<AtomicUsize>,
}

impl<B: Book + Clone> SnapshotSource<B> for SnapshotAfterDrain<B> {
    fn fetch_snapshot(&mut self, interrupt: &Interrupt) -> Result<Option<B>, TransportError> {
        self.calls.fetch_add(1, Ordering::AcqRel);
        let deadline = Instant::now() + Duration::from_secs(5);
        while !self.script.drained() {
            if interrupt.is_raised() {
                return Err(TransportError::Interrupted);
            }
            if Instant::now() > deadline {
                return Err(TransportError::Protocol {
                    message: "worker never drained the feed".to_string(),
                });
            }
            thread::sleep(Duration::from_millis(1));
        }
        Ok(self.snapshot.clone())
    }
}

/// Drops the connection while the worker is buffering, then reports no
/// snapshot once the worker has seen the drop.
pub struct DropDuringSnapshot {
    pub script: Arc<FeedScript>,
}

impl<B> SnapshotSource<B> for DropDuringSnapshot {
    fn fetch_snapshot(&mut self, interrupt: &Interrupt) -> Result<Option<B>, TransportError> {
        self.script.drop_connection();
        // The scripted read clears `attached` when it reports the drop.
        while self.script.is_attached() {
            if interrupt.is_raised() {
                return Err(TransportError::Interrupted);
            }
            thread::sleep(Duration::from_millis(1));
        }
        Ok(None)
    }
}

/// Snapshot endpoint that always fails.
#[derive(Debug, Default)]
pub struct FailingSnapshot;

impl<B> SnapshotSource<B> for FailingSnapshot {
    fn fetch_snapshot(&mut self, _interrupt: &Interrupt) -> Result<Option<B>, TransportError> {
        Err(TransportError::Protocol {
            message: "snapshot endpoint unavailable".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Threads
// ---------------------------------------------------------------------------

/// Routes log output through the test harness; later calls are no-ops.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Polls `condition` for up to five seconds.
pub fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

/// Collects `count` records from `receiver`, waiting up to five seconds.
pub fn collect(receiver: &Receiver<MarketRecord>, count: usize) -> Vec<MarketRecord> {
    let mut records = Vec::with_capacity(count);
    while records.len() < count {
        match receiver.recv_timeout(Duration::from_secs(5)) {
            Ok(record) => records.push(record),
            Err(_) => break,
        }
    }
    records
}

/// Runs `control.connect` on a scoped thread while the calling thread drives
/// `worker` by hand.
pub fn connect_driving<G, B, C, S>(
    worker: &mut SocketReader<G, B, C>,
    control: &mut SocketReaderControl<G, B, C, S>,
) -> Result<(), ReaderError>
where
    G: FeedGateway,
    B: Book,
    C: OutboundChannel,
    S: SnapshotSource<B>,
{
    thread::scope(|scope| {
        let connect = scope.spawn(|| control.connect(&Interrupt::new()));
        while !connect.is_finished() {
            let _ = worker.do_work();
            thread::yield_now();
        }
        connect.join().expect("connect thread panicked")
    })
}
