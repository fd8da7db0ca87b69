// demos/src/bin/simulated_feed.rs
//
// Runs the full ingestion pipeline against an in-process exchange simulator:
//
// - a venue thread random-walks its own book and streams level deltas to
//   subscribers
// - the reader worker decodes, applies and publishes every delta
// - the inbound gateway connects with a snapshot, sends keep-alives and is
//   forced to reconnect half way through
// - the main thread consumes the published records and counts sequence
//   jumps. Updates that arrive while a connect is in progress are folded into
//   the book without being republished, so each reconnect shows up as exactly
//   one jump and the next record already carries the consistent book.
//
// Run this example with:
//   cargo run --bin simulated_feed
//   (from the demos directory)

use bytes::{Bytes, BytesMut};
use crossbeam::channel::{Receiver, Sender, TryRecvError, bounded};
use marketfeed_rs::prelude::*;
use marketfeed_rs::wire::RECORD_LEN;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const MID: i64 = 10_000;
const RECORDS_PER_FRAME: usize = 32;

/// Exchange-side state: the venue's own book and its subscriber channel.
struct Venue {
    book: Mutex<IncrementalBook>,
    subscribed: AtomicBool,
    updates: Sender<MarketRecord>,
}

impl Venue {
    fn snapshot(&self) -> IncrementalBook {
        self.book
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Small xorshift generator; the demo needs movement, not statistics.
struct Walk(u64);

impl Walk {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn below(&mut self, bound: u64) -> i64 {
        i64::try_from(self.next() % bound).unwrap_or_default()
    }
}

fn run_venue(venue: Arc<Venue>, stop: Arc<AtomicBool>) {
    let mut walk = Walk(0x9E37_79B9_7F4A_7C15);
    let mut sequence = 0u64;
    while !stop.load(Ordering::Acquire) {
        let mut record = MarketRecord::new();
        let bid = walk.next() % 2 == 0;
        let price = if bid {
            MID - 1 - walk.below(20)
        } else {
            MID + 1 + walk.below(20)
        };
        let size = if walk.below(5) == 0 { 0 } else { 1 + walk.below(50) };

        {
            // The update and its sequence number are published under the
            // same lock the snapshot is taken with.
            let mut book = venue.book.lock().unwrap_or_else(PoisonError::into_inner);
            sequence += 1;
            record.sequence = sequence;
            record.set_action(Action::Modify);
            record.set_side(if bid { Side::Bid } else { Side::Ask });
            record.price = price;
            record.size = size;
            book.update_from(&record);
            if venue.subscribed.load(Ordering::Acquire) {
                let _ = venue.updates.try_send(record);
            }
        }
        thread::sleep(Duration::from_micros(200));
    }
}

/// Client side of the simulated session.
struct SimulatedFeed {
    venue: Arc<Venue>,
    updates: Receiver<MarketRecord>,
}

impl FeedGateway for SimulatedFeed {
    fn attach(&mut self, _interrupt: &Interrupt) -> Result<(), TransportError> {
        while self.updates.try_recv().is_ok() {}
        self.venue.subscribed.store(true, Ordering::Release);
        info!("subscribed to simulated venue");
        Ok(())
    }

    fn detach(&mut self) -> Result<(), TransportError> {
        self.venue.subscribed.store(false, Ordering::Release);
        info!("unsubscribed from simulated venue");
        Ok(())
    }

    fn read(&mut self) -> Result<Option<Bytes>, TransportError> {
        let mut frame = BytesMut::new();
        for _ in 0..RECORDS_PER_FRAME {
            match self.updates.try_recv() {
                Ok(record) => frame.extend_from_slice(&record.encode()),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Err(TransportError::ConnectionLost),
            }
        }
        Ok((!frame.is_empty()).then(|| frame.freeze()))
    }

    fn handle_message(
        &mut self,
        frame: &mut Bytes,
        sink: &mut dyn RecordSink,
    ) -> Result<(), ReaderError> {
        let chunk = frame.split_to(RECORD_LEN.min(frame.len()));
        let record = MarketRecord::decode(&chunk).map_err(|err| TransportError::Protocol {
            message: err.to_string(),
        })?;
        *sink.record_mut() = record;
        sink.offer()
    }
}

struct VenueSnapshots(Arc<Venue>);

impl SnapshotSource<IncrementalBook> for VenueSnapshots {
    fn fetch_snapshot(
        &mut self,
        _interrupt: &Interrupt,
    ) -> Result<Option<IncrementalBook>, TransportError> {
        // Let a few updates land in the replay queue first.
        thread::sleep(Duration::from_millis(20));
        let snapshot = self.0.snapshot();
        info!(sequence = snapshot.sequence_number(), "snapshot fetched");
        Ok(Some(snapshot))
    }
}

/// Outbound socket stand-in.
struct LoggingSink;

impl FrameSink for LoggingSink {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        debug!(frame = %String::from_utf8_lossy(frame), "frame sent to venue");
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("Starting simulated feed example");

    let (updates, feed_updates) = bounded(4096);
    let venue = Arc::new(Venue {
        book: Mutex::new(IncrementalBook::default()),
        subscribed: AtomicBool::new(false),
        updates,
    });
    let stop_venue = Arc::new(AtomicBool::new(false));
    let venue_thread = {
        let venue = Arc::clone(&venue);
        let stop = Arc::clone(&stop_venue);
        thread::spawn(move || run_venue(venue, stop))
    };

    let (published, consumer) = bounded(4096);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let feed = SimulatedFeed {
        venue: Arc::clone(&venue),
        updates: feed_updates,
    };
    let (worker, control) = SocketReader::builder(
        feed,
        IncrementalBook::default(),
        CrossbeamChannel::new(published),
    )
    .with_clock(Arc::clone(&clock))
    .build(VenueSnapshots(Arc::clone(&venue)));

    let (writer, writer_handle) = SocketWriter::new(LoggingSink);
    let config = GatewayConfig::default()
        .with_keep_alive_interval(Duration::from_secs(1))
        .with_sanity_check_interval(Duration::from_millis(500));
    config.validate()?;
    let gateway = MarketInboundGateway::new(control, config, clock)
        .with_keep_alive(writer_handle, Bytes::from_static(b"ping"));
    let triggers = gateway.triggers();

    let reader = AgentRunner::start(worker)?;
    let writer = AgentRunner::start(writer)?;
    let supervisor = AgentRunner::start(gateway)?;

    let started = Instant::now();
    let mut received = 0u64;
    let mut jumps = 0u64;
    let mut last_sequence: Option<u64> = None;
    let mut reconnect_forced = false;

    while started.elapsed() < Duration::from_secs(4) {
        if !reconnect_forced && started.elapsed() > Duration::from_secs(2) {
            info!("forcing a reconnect");
            triggers.force_reconnect();
            reconnect_forced = true;
        }
        let Ok(record) = consumer.recv_timeout(Duration::from_millis(100)) else {
            continue;
        };
        received += 1;
        if let Some(last) = last_sequence.filter(|&last| record.sequence != last + 1) {
            jumps += 1;
            info!(last, next = record.sequence, "sequence jump after reconnect");
        }
        last_sequence = Some(record.sequence);

        if received % 1_000 == 0 {
            info!(
                received,
                sequence = record.sequence,
                best_bid = %PriceLevel::from(record.bids[0]),
                best_ask = %PriceLevel::from(record.asks[0]),
                "top of book"
            );
        }
    }

    supervisor.join()?;
    reader.join()?;
    writer.join()?;
    stop_venue.store(true, Ordering::Release);
    let _ = venue_thread.join();

    info!(received, jumps, "simulated feed example finished");
    Ok(())
}
