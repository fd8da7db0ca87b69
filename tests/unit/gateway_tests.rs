//! Integration tests for the inbound gateway supervisor.

use super::support::*;
use bytes::Bytes;
use crossbeam::channel::bounded;
use marketfeed_rs::prelude::*;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const START: u64 = 1_700_000_000_000_000_000;

#[derive(Debug, Default)]
struct StubState {
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    inspections: AtomicUsize,
    fail_connects: AtomicBool,
    lost: AtomicBool,
    crossed: AtomicBool,
    last_recv: AtomicU64,
}

impl StubState {
    fn connects(&self) -> usize {
        self.connects.load(Ordering::Acquire)
    }

    fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
struct StubReader(Arc<StubState>);

impl Connect for StubReader {
    fn connect(&mut self, _interrupt: &Interrupt) -> Result<(), ReaderError> {
        if self.0.fail_connects.load(Ordering::Acquire) {
            return Err(ReaderError::ConnectionLost);
        }
        self.0.connects.fetch_add(1, Ordering::AcqRel);
        self.0.lost.store(false, Ordering::Release);
        Ok(())
    }
}

impl SupervisedReader for StubReader {
    fn disconnect(&mut self, _interrupt: &Interrupt) -> Result<(), ReaderError> {
        self.0.disconnects.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn last_recv_nanos(&self) -> u64 {
        self.0.last_recv.load(Ordering::Acquire)
    }

    fn connection_lost(&self) -> bool {
        self.0.lost.load(Ordering::Acquire)
    }

    fn book_is_crossed(&mut self, _interrupt: &Interrupt) -> Result<bool, ReaderError> {
        self.0.inspections.fetch_add(1, Ordering::AcqRel);
        Ok(self.0.crossed.load(Ordering::Acquire))
    }
}

#[derive(Debug, Default)]
struct Recorded(Vec<Vec<u8>>);

impl FrameSink for Recorded {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.0.push(frame.to_vec());
        Ok(())
    }
}

/// Every schedule far away, single attempt per connect.
fn quiet_config() -> GatewayConfig {
    GatewayConfig::default()
        .with_reconnect_interval(Duration::from_secs(12 * 60 * 60))
        .with_keep_alive_interval(Duration::from_secs(60 * 60))
        .with_sanity_check_interval(Duration::from_secs(60 * 60))
        .with_max_silent_interval(Duration::from_secs(60 * 60))
        .with_max_reconnect_attempts(0)
        .with_initial_backoff(Duration::from_millis(1))
        .with_connect_timeout(Duration::from_secs(1))
}

fn started(
    config: GatewayConfig,
) -> (
    MarketInboundGateway<StubReader>,
    Arc<StubState>,
    Arc<ManualClock>,
) {
    let state = Arc::new(StubState::default());
    let clock = Arc::new(ManualClock::new(START));
    let mut gateway =
        MarketInboundGateway::new(StubReader(Arc::clone(&state)), config, clock.clone());
    gateway.start().expect("start");
    (gateway, state, clock)
}

// ---------------------------------------------------------------------------
// Start
// ---------------------------------------------------------------------------

#[test]
fn schedules_stay_idle_until_start() {
    let state = Arc::new(StubState::default());
    let clock = Arc::new(ManualClock::new(START));
    let mut gateway =
        MarketInboundGateway::new(StubReader(Arc::clone(&state)), quiet_config(), clock.clone());

    gateway.force_reconnect();
    clock.advance(Duration::from_secs(24 * 60 * 60));
    assert_eq!(gateway.poll().expect("idle poll"), 0);
    assert_eq!(state.connects(), 0);
    assert!(!gateway.is_connected());

    gateway.start().expect("start");
    assert_eq!(state.connects(), 1);
    assert!(gateway.is_connected());
    // The trigger raised before start is still pending.
    assert_eq!(gateway.poll().expect("poll"), 1);
    assert_eq!(state.connects(), 2);
    assert_eq!(gateway.poll().expect("poll"), 0);
}

#[test]
fn failed_start_is_fatal() {
    let state = Arc::new(StubState::default());
    state.fail_connects.store(true, Ordering::Release);
    let mut gateway = MarketInboundGateway::new(
        StubReader(Arc::clone(&state)),
        quiet_config(),
        Arc::new(ManualClock::new(START)),
    );

    let err = gateway.start().expect_err("connect fails");
    assert!(err.is_fatal());
    assert!(matches!(
        err,
        GatewayError::Connect(ConnectError::Exhausted { attempts: 1, .. })
    ));
}

// ---------------------------------------------------------------------------
// Reconnect
// ---------------------------------------------------------------------------

#[test]
fn reconnects_on_the_reconnect_interval() {
    let config = quiet_config().with_reconnect_interval(Duration::from_secs(600));
    let (mut gateway, state, clock) = started(config);

    clock.advance(Duration::from_secs(599));
    assert_eq!(gateway.poll().expect("poll"), 0);
    clock.advance(Duration::from_secs(1));
    assert_eq!(gateway.poll().expect("poll"), 1);
    assert_eq!(state.disconnects(), 1);
    assert_eq!(state.connects(), 2);
}

#[test]
fn silent_feed_forces_a_reconnect() {
    let config = quiet_config().with_max_silent_interval(Duration::from_secs(5));
    let (mut gateway, state, clock) = started(config);

    clock.advance(Duration::from_secs(5));
    assert_eq!(gateway.poll().expect("at the limit"), 0);
    clock.advance(Duration::from_secs(1));
    assert_eq!(gateway.poll().expect("past the limit"), 1);
    assert_eq!(state.connects(), 2);

    // Fresh traffic keeps the feed alive.
    state.last_recv.store(clock.nanos(), Ordering::Release);
    clock.advance(Duration::from_secs(3));
    state.last_recv.store(clock.nanos(), Ordering::Release);
    clock.advance(Duration::from_secs(3));
    assert_eq!(gateway.poll().expect("poll"), 0);
    assert_eq!(state.connects(), 2);
}

#[test]
fn lost_connection_forces_a_reconnect() {
    let (mut gateway, state, _clock) = started(quiet_config());

    state.lost.store(true, Ordering::Release);
    assert_eq!(gateway.poll().expect("poll"), 1);
    assert_eq!(state.connects(), 2);
    assert_eq!(gateway.poll().expect("poll"), 0);
}

#[test]
fn triggers_work_from_another_thread() {
    let (mut gateway, state, _clock) = started(quiet_config());
    let triggers = gateway.triggers();

    thread::spawn(move || triggers.force_reconnect())
        .join()
        .expect("trigger thread");
    assert_eq!(gateway.poll().expect("poll"), 1);
    assert_eq!(state.connects(), 2);
}

#[test]
fn exhausted_reconnect_is_fatal() {
    let (mut gateway, state, _clock) = started(quiet_config());

    state.fail_connects.store(true, Ordering::Release);
    gateway.force_reconnect();
    let err = gateway.poll().expect_err("reconnect fails");
    assert!(err.is_fatal());
    assert!(matches!(
        err,
        GatewayError::Connect(ConnectError::Exhausted { .. })
    ));
    assert!(!gateway.is_connected());
}

#[test]
fn shutdown_interrupts_a_reconnect() {
    let (mut gateway, state, _clock) = started(quiet_config());
    let triggers = gateway.triggers();

    triggers.shutdown();
    triggers.force_reconnect();
    let err = gateway.poll().expect_err("interrupted");
    assert!(matches!(err, GatewayError::Connect(ConnectError::Interrupted)));
    assert!(err.is_fatal());
    assert_eq!(state.connects(), 1);
}

// ---------------------------------------------------------------------------
// Keep-alive and sanity checks
// ---------------------------------------------------------------------------

#[test]
fn keep_alive_queues_a_control_frame() {
    let (mut writer, handle) = SocketWriter::new(Recorded::default());
    let config = quiet_config().with_keep_alive_interval(Duration::from_secs(30));
    let (gateway, _state, clock) = started(config);
    let mut gateway = gateway.with_keep_alive(handle, Bytes::from_static(b"ping"));

    clock.advance(Duration::from_secs(30));
    assert_eq!(gateway.poll().expect("poll"), 1);
    gateway.force_keep_alive();
    assert_eq!(gateway.poll().expect("poll"), 1);

    assert_eq!(writer.do_work().expect("write"), 2);
    assert_eq!(writer.sink().0, vec![b"ping".to_vec(), b"ping".to_vec()]);
}

#[test]
fn full_control_lane_is_not_fatal() {
    let (_writer, handle) = SocketWriter::with_limits(Recorded::default(), 1, 64);
    let (gateway, _state, _clock) = started(quiet_config());
    let mut gateway = gateway.with_keep_alive(handle, Bytes::from_static(b"ping"));

    gateway.force_keep_alive();
    assert_eq!(gateway.poll().expect("first keep-alive"), 1);
    gateway.force_keep_alive();
    let err = gateway.poll().expect_err("lane is full");
    assert!(!err.is_fatal());
    assert!(matches!(
        err,
        GatewayError::Writer(WriterError::QueueFull {
            lane: Lane::Control
        })
    ));
}

#[test]
fn crossed_book_forces_a_reconnect() {
    let config = quiet_config().with_sanity_check_interval(Duration::from_secs(60));
    let (mut gateway, state, clock) = started(config);

    clock.advance(Duration::from_secs(60));
    assert_eq!(gateway.poll().expect("healthy check"), 1);
    assert_eq!(state.inspections.load(Ordering::Acquire), 1);
    assert_eq!(state.connects(), 1);

    state.crossed.store(true, Ordering::Release);
    clock.advance(Duration::from_secs(60));
    assert_eq!(gateway.poll().expect("crossed check"), 1);
    assert_eq!(state.connects(), 1);
    assert_eq!(gateway.poll().expect("reconnect"), 1);
    assert_eq!(state.connects(), 2);
}

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

#[test]
fn gateway_and_reader_run_as_agents() {
    init_logging();
    let (feed, script) = ScriptedFeed::new();
    let (sender, receiver) = bounded(64);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (worker, control) =
        SocketReader::builder(feed, IncrementalBook::default(), CrossbeamChannel::new(sender))
            .with_clock(Arc::clone(&clock))
            .build(NoSnapshot);

    let reader = AgentRunner::start(worker).expect("spawn reader");
    let supervisor = AgentRunner::start(MarketInboundGateway::new(
        control,
        GatewayConfig::default(),
        clock,
    ))
    .expect("spawn gateway");
    assert_eq!(supervisor.name(), "market-inbound-gateway");

    // Records that arrive during the connect window are replayed, not
    // published, so keep sending until one comes through live.
    let mut sequence = 0u64;
    let published = loop {
        sequence += 1;
        script.push(&[delta(sequence, Side::Bid, 100, 1)]);
        if let Ok(record) = receiver.recv_timeout(Duration::from_millis(20)) {
            break record;
        }
        assert!(sequence < 250, "gateway never went live");
    };
    assert_eq!(published.bids[0].price, 100);

    supervisor.join().expect("gateway stops cleanly");
    assert!(!script.is_attached());
    assert_eq!(script.detaches.load(Ordering::Acquire), 1);
    reader.join().expect("reader stops cleanly");
}
