//! # Gapless Market Data Gateway
//!
//! Building blocks for ingesting an exchange's market-data feed, keeping a
//! consistent depth-bounded book per instrument and republishing every update
//! with the book's visible levels attached, across reconnects, without gaps.
//!
//! ## Key Features
//!
//! - **Gapless reconnect**: the feed worker buffers decoded records while the
//!   supervisor fetches a snapshot, then replays only the records at or after
//!   the snapshot's sequence number before publishing live again.
//!
//! - **Lock-free handoff**: the worker and its supervisor share the book
//!   through a park handshake built on atomics. The hot path never takes a
//!   lock.
//!
//! - **Two book variants**: [`SnapshotBook`] for venues that send the full
//!   visible depth with every update, [`IncrementalBook`] for venues that send
//!   level diffs.
//!
//! - **Fixed-layout records**: [`MarketRecord`] is a `repr(C)` value that
//!   encodes to and decodes from raw bytes without allocation.
//!
//! - **Supervision**: retries with exponential backoff and a per-attempt
//!   timeout, periodic reconnects, silent-feed detection, keep-alives and
//!   crossed-book sanity checks.
//!
//! ## Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`wire`] | [`MarketRecord`], level entries, null sentinels |
//! | [`book`] | [`Book`] contract, [`BookSide`], both book variants |
//! | [`gateway`] | reader, connect controller, supervisor, writer, agents |
//! | [`prelude`] | everything above in one import |
//!
//! ## Logging
//!
//! Every component logs through [`tracing`] with structured fields. Install
//! any subscriber to see them; nothing is printed otherwise.
//!
//! ## Metrics
//!
//! With the `metrics` feature enabled, connect attempts, publishes, replays and
//! overflows are counted through the [`metrics`](https://docs.rs/metrics)
//! facade under the `marketfeed_` prefix.

pub mod book;
pub mod gateway;
pub mod prelude;
mod telemetry;
pub mod utils;
pub mod wire;

pub use book::{Book, BookSide, IncrementalBook, PriceLevel, SideKind, SideUpdate, SnapshotBook};
pub use gateway::{
    Agent, AgentRunner, ConnectError, FeedGateway, GatewayConfig, GatewayError,
    MarketInboundGateway, ReaderError, SocketConnectController, SocketReader,
    SocketReaderControl, SocketWriter, TransportError, WriterError,
};
pub use utils::{Clock, ManualClock, SystemClock, current_time_nanos};
pub use wire::{Action, LevelEntry, MarketRecord, RecordFlags, Side, WireError};
