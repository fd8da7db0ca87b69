//! # Feed Gateway
//!
//! Ingests one instrument's market data from an exchange connection, keeps a
//! consistent book and republishes every record with the book's visible
//! levels attached.
//!
//! ## Threads
//!
//! | Agent | Owns | Does |
//! |-------|------|------|
//! | [`SocketReader`] | transport reads, book updates | decode, apply, publish |
//! | [`MarketInboundGateway`] | [`SocketReaderControl`] | connect, reconnect, keep-alive, sanity checks |
//! | [`SocketWriter`] | outbound socket writes | subscriptions, pings |
//!
//! Each agent runs on its own thread through an [`AgentRunner`]. The reader
//! and its control half coordinate through a lock-free park handshake: the
//! supervisor only touches the book and the transport while the worker is
//! parked, and every connect replays what the worker buffered while the
//! snapshot was fetched, so subscribers never see a gap.
//!
//! ## Example
//!
//! ```rust,no_run
//! use marketfeed_rs::prelude::*;
//! # fn wire<G: FeedGateway>(gateway: G) -> Result<(), Box<dyn std::error::Error>> {
//! let (sender, _receiver) = crossbeam::channel::bounded(1024);
//! let clock: std::sync::Arc<dyn Clock> = std::sync::Arc::new(SystemClock);
//! let (worker, control) = SocketReader::builder(gateway, IncrementalBook::default(), CrossbeamChannel::new(sender))
//!     .with_clock(clock.clone())
//!     .build(NoSnapshot);
//!
//! let reader = AgentRunner::start(worker)?;
//! let supervisor = AgentRunner::start(MarketInboundGateway::new(control, GatewayConfig::default(), clock))?;
//! # supervisor.join()?;
//! # reader.join()?;
//! # Ok(())
//! # }
//! ```

mod agent;
mod channel;
mod config;
mod controller;
mod error;
mod handshake;
mod inbound;
mod interrupt;
mod reader;
mod replay;
mod schedule;
mod writer;

pub use agent::{Agent, AgentRunner};
pub use channel::{CrossbeamChannel, OfferStatus, OutboundChannel};
pub use config::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_INITIAL_BACKOFF, DEFAULT_KEEP_ALIVE_INTERVAL,
    DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_MAX_SILENT_INTERVAL, DEFAULT_RECONNECT_INTERVAL,
    DEFAULT_SANITY_CHECK_INTERVAL, GatewayConfig,
};
pub use controller::{Connect, MAX_BACKOFF, SocketConnectController};
pub use error::{
    AttemptError, ConfigError, ConnectError, GatewayError, Lane, ReaderError, TransportError,
    WriterError,
};
pub use handshake::ReaderState;
pub use inbound::{GatewayTriggers, MarketInboundGateway, SupervisedReader};
pub use interrupt::Interrupt;
pub use reader::{
    FeedGateway, NoSnapshot, ReaderBuilder, ReaderStats, RecordSink, SnapshotSource,
    SocketReader, SocketReaderControl,
};
pub use replay::{DEFAULT_REPLAY_CAPACITY, ReplayFull, ReplayQueue};
pub use schedule::{Schedule, ScheduleTrigger};
pub use writer::{
    DEFAULT_LANE_CAPACITY, DEFAULT_MAX_FRAME_LEN, FrameSink, SocketWriter, WriterHandle,
};
