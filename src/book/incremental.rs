//! Book for venues that broadcast level diffs.

use super::{Book, BookSide, PriceLevel, SideKind, SideUpdate};
use crate::wire::{Action, MarketRecord, SEQUENCE_NULL, Side, VISIBLE_DEPTH};

/// Levels held per side unless configured otherwise.
pub const DEFAULT_MAX_LEVELS: usize = 128;

/// Book maintained by sorted insert, overwrite and removal.
///
/// A `Modify` record with a side and a price is a single-level delta of
/// `(price, size)`; a zero size removes the level. Any other `Modify` record is
/// loaded level by level from its bid and ask arrays. `Trade` records only move
/// the sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncrementalBook {
    sequence_number: u64,
    bids: BookSide,
    asks: BookSide,
}

impl Default for IncrementalBook {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LEVELS)
    }
}

impl IncrementalBook {
    /// Creates an empty book holding at most `max_levels` per side.
    pub fn new(max_levels: usize) -> Self {
        Self {
            sequence_number: SEQUENCE_NULL,
            bids: BookSide::new(SideKind::Bid, max_levels),
            asks: BookSide::new(SideKind::Ask, max_levels),
        }
    }

    /// Bid side.
    #[inline]
    pub fn bids(&self) -> &BookSide {
        &self.bids
    }

    /// Ask side.
    #[inline]
    pub fn asks(&self) -> &BookSide {
        &self.asks
    }

    /// Overwrites the sequence number.
    #[inline]
    pub fn set_sequence_number(&mut self, sequence_number: u64) {
        self.sequence_number = sequence_number;
    }

    /// Applies one bid level change.
    #[inline]
    pub fn update_bid(&mut self, price: i64, size: i64, count: i64) -> SideUpdate {
        self.bids.update(price, size, count)
    }

    /// Applies one ask level change.
    #[inline]
    pub fn update_ask(&mut self, price: i64, size: i64, count: i64) -> SideUpdate {
        self.asks.update(price, size, count)
    }

    #[inline]
    fn visible(update: SideUpdate) -> Option<usize> {
        update.index().filter(|&index| index < VISIBLE_DEPTH)
    }
}

impl Book for IncrementalBook {
    #[inline]
    fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    fn write_to(&self, record: &mut MarketRecord) {
        record.sequence = self.sequence_number;
        self.bids.write_to(&mut record.bids);
        self.asks.write_to(&mut record.asks);
    }

    fn update_from(&mut self, record: &MarketRecord) -> Option<usize> {
        self.sequence_number = record.sequence;
        if record.action() == Action::Trade {
            return None;
        }
        if record.is_level_delta() {
            let side = match record.side() {
                Side::Bid => &mut self.bids,
                _ => &mut self.asks,
            };
            return Self::visible(side.update(record.price, record.size, 1));
        }
        let bid = self.bids.update_from(&record.bids);
        let ask = self.asks.update_from(&record.asks);
        bid.into_iter()
            .chain(ask)
            .filter(|&index| index < VISIBLE_DEPTH)
            .min()
    }

    fn reset(&mut self) {
        self.sequence_number = SEQUENCE_NULL;
        self.bids.clear();
        self.asks.clear();
    }

    fn copy_from(&mut self, other: &Self) {
        self.sequence_number = other.sequence_number;
        self.bids.copy_from(&other.bids);
        self.asks.copy_from(&other.asks);
    }

    fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.best().copied()
    }

    fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.best().copied()
    }
}
