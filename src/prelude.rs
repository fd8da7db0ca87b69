//! Prelude module that re-exports commonly used types and traits.
//!
//! ```rust
//! use marketfeed_rs::prelude::*;
//! ```

// Records
pub use crate::wire::{
    Action, DEPTH_NULL, LevelEntry, MarketRecord, PRICE_NULL, RecordFlags, SEQUENCE_NULL, Side,
    VISIBLE_DEPTH, WireError,
};

// Books
pub use crate::book::{
    Book, BookSide, DEFAULT_MAX_LEVELS, IncrementalBook, PriceLevel, SideKind, SideUpdate,
    SnapshotBook,
};

// Reader and supervision
pub use crate::gateway::{
    Agent, AgentRunner, Connect, CrossbeamChannel, FeedGateway, GatewayConfig, GatewayTriggers,
    Interrupt, MarketInboundGateway, NoSnapshot, OfferStatus, OutboundChannel, ReaderBuilder,
    ReaderState, ReaderStats, RecordSink, SnapshotSource, SocketConnectController, SocketReader,
    SocketReaderControl, SupervisedReader,
};

// Outbound
pub use crate::gateway::{FrameSink, SocketWriter, WriterHandle};

// Errors
pub use crate::gateway::{
    AttemptError, ConfigError, ConnectError, GatewayError, Lane, ReaderError, TransportError,
    WriterError,
};

// Time
pub use crate::utils::{Clock, ManualClock, SystemClock};
