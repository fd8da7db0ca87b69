//! Depth-bounded, sequence-numbered order books.
//!
//! Two variants share the [`Book`] contract:
//!
//! - [`SnapshotBook`] for venues that publish the full visible depth on every
//!   update. Levels are copied positionally.
//! - [`IncrementalBook`] for venues that publish level diffs. Each side is a
//!   sorted [`BookSide`] bounded by a configured maximum depth.
//!
//! Both encode to and decode from a [`MarketRecord`](crate::wire::MarketRecord).

pub mod incremental;
pub mod level;
pub mod side;
pub mod snapshot;

pub use incremental::{DEFAULT_MAX_LEVELS, IncrementalBook};
pub use level::PriceLevel;
pub use side::{BookSide, SideKind, SideUpdate};
pub use snapshot::SnapshotBook;

use crate::wire::MarketRecord;
use std::cmp::Ordering;

/// Common behaviour of every book variant.
///
/// A book is owned by exactly one thread at a time; the reader handshake moves
/// ownership between the feed worker and its supervisor, so implementations
/// need no internal synchronization.
pub trait Book: Send + 'static {
    /// Sequence number of the last record applied, or
    /// [`SEQUENCE_NULL`](crate::wire::SEQUENCE_NULL) after a reset.
    fn sequence_number(&self) -> u64;

    /// Writes the sequence number and the visible levels into `record`.
    /// Positions past the current depth are written as absent levels.
    fn write_to(&self, record: &mut MarketRecord);

    /// Applies `record` and takes its sequence number.
    ///
    /// Returns the shallowest visible depth that changed, or `None` when no
    /// visible level moved.
    fn update_from(&mut self, record: &MarketRecord) -> Option<usize>;

    /// Drops every level and nulls the sequence number.
    fn reset(&mut self);

    /// Replaces this book's state with `other`'s.
    fn copy_from(&mut self, other: &Self)
    where
        Self: Sized;

    /// Best bid, if any.
    fn best_bid(&self) -> Option<PriceLevel>;

    /// Best ask, if any.
    fn best_ask(&self) -> Option<PriceLevel>;

    /// True when the best bid is at or through the best ask.
    fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => bid.price() >= ask.price(),
            _ => false,
        }
    }

    /// Orders two books by sequence number only.
    fn cmp_sequence(&self, other: &Self) -> Ordering
    where
        Self: Sized,
    {
        self.sequence_number().cmp(&other.sequence_number())
    }
}
