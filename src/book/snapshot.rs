//! Book for venues that broadcast the full visible depth on every update.

use super::{Book, PriceLevel};
use crate::wire::{Action, LevelEntry, MarketRecord, SEQUENCE_NULL, VISIBLE_DEPTH};

/// Fixed-depth book updated by positional copy.
///
/// The venue is trusted to send levels sorted; no searching or sorting is done
/// here. Depths beyond [`VISIBLE_DEPTH`] are held but never reach the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotBook {
    sequence_number: u64,
    bids: Vec<PriceLevel>,
    asks: Vec<PriceLevel>,
}

impl Default for SnapshotBook {
    fn default() -> Self {
        Self::new(VISIBLE_DEPTH)
    }
}

impl SnapshotBook {
    /// Creates an empty book holding `depth` levels per side.
    pub fn new(depth: usize) -> Self {
        Self {
            sequence_number: SEQUENCE_NULL,
            bids: vec![PriceLevel::empty(); depth],
            asks: vec![PriceLevel::empty(); depth],
        }
    }

    /// Levels per side.
    #[inline]
    pub fn depth(&self) -> usize {
        self.bids.len()
    }

    /// Bid levels by position.
    #[inline]
    pub fn bids(&self) -> &[PriceLevel] {
        &self.bids
    }

    /// Ask levels by position.
    #[inline]
    pub fn asks(&self) -> &[PriceLevel] {
        &self.asks
    }

    /// Overwrites the sequence number, e.g. when building a snapshot from a
    /// REST response.
    #[inline]
    pub fn set_sequence_number(&mut self, sequence_number: u64) {
        self.sequence_number = sequence_number;
    }

    /// Sets the bid at `position`. Returns whether it changed; positions past
    /// the depth are ignored.
    pub fn set_bid(&mut self, position: usize, price: i64, size: i64, count: i64) -> bool {
        self.bids
            .get_mut(position)
            .is_some_and(|level| level.update(price, size, count))
    }

    /// Sets the ask at `position`. Returns whether it changed; positions past
    /// the depth are ignored.
    pub fn set_ask(&mut self, position: usize, price: i64, size: i64, count: i64) -> bool {
        self.asks
            .get_mut(position)
            .is_some_and(|level| level.update(price, size, count))
    }

    fn copy_side(levels: &mut [PriceLevel], entries: &[LevelEntry; VISIBLE_DEPTH]) -> Option<usize> {
        let mut first_changed = None;
        for (position, (level, entry)) in levels.iter_mut().zip(entries).enumerate() {
            if level.update_from_entry(entry) && first_changed.is_none() {
                first_changed = Some(position);
            }
        }
        first_changed
    }

    fn write_side(levels: &[PriceLevel], out: &mut [LevelEntry; VISIBLE_DEPTH]) {
        for (position, slot) in out.iter_mut().enumerate() {
            *slot = levels
                .get(position)
                .map_or(LevelEntry::NULL, PriceLevel::to_entry);
        }
    }
}

impl Book for SnapshotBook {
    #[inline]
    fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    fn write_to(&self, record: &mut MarketRecord) {
        record.sequence = self.sequence_number;
        Self::write_side(&self.bids, &mut record.bids);
        Self::write_side(&self.asks, &mut record.asks);
    }

    fn update_from(&mut self, record: &MarketRecord) -> Option<usize> {
        self.sequence_number = record.sequence;
        if record.action() == Action::Trade {
            return None;
        }
        let bid = Self::copy_side(&mut self.bids, &record.bids);
        let ask = Self::copy_side(&mut self.asks, &record.asks);
        bid.into_iter().chain(ask).min()
    }

    fn reset(&mut self) {
        self.sequence_number = SEQUENCE_NULL;
        self.bids.iter_mut().for_each(PriceLevel::reset);
        self.asks.iter_mut().for_each(PriceLevel::reset);
    }

    fn copy_from(&mut self, other: &Self) {
        self.sequence_number = other.sequence_number;
        self.bids.clone_from(&other.bids);
        self.asks.clone_from(&other.asks);
    }

    fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.first().filter(|level| !level.is_empty()).copied()
    }

    fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.first().filter(|level| !level.is_empty()).copied()
    }
}
