//! Bounded, sorted container for one side of an incremental book.

use super::level::PriceLevel;
use crate::wire::{LevelEntry, VISIBLE_DEPTH};
use std::cmp::Ordering;

/// Which way a [`BookSide`] is sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SideKind {
    /// Descending prices, best bid first.
    Bid,
    /// Ascending prices, best ask first.
    Ask,
}

/// Outcome of [`BookSide::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideUpdate {
    /// The level at this index was inserted, overwritten or removed.
    Applied(usize),
    /// Removal of a price the side does not hold.
    NotPresent,
    /// Insert whose position falls at or past `max_levels`; dropped.
    BeyondCapacity(usize),
}

impl SideUpdate {
    /// Index touched by the update, if the side changed.
    #[inline]
    pub fn index(self) -> Option<usize> {
        match self {
            SideUpdate::Applied(index) => Some(index),
            SideUpdate::NotPresent | SideUpdate::BeyondCapacity(_) => None,
        }
    }
}

/// Price levels sorted best first, holding at most `max_levels` entries.
///
/// Lookups are binary searches; inserts and removals shift the tail. The
/// backing storage is allocated once at construction and never grows, so the
/// hot path does not allocate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookSide {
    kind: SideKind,
    max_levels: usize,
    levels: Vec<PriceLevel>,
}

impl BookSide {
    /// Creates an empty side holding at most `max_levels` levels.
    pub fn new(kind: SideKind, max_levels: usize) -> Self {
        Self {
            kind,
            max_levels,
            levels: Vec::with_capacity(max_levels),
        }
    }

    /// Sort direction.
    #[inline]
    pub fn kind(&self) -> SideKind {
        self.kind
    }

    /// Capacity bound.
    #[inline]
    pub fn max_levels(&self) -> usize {
        self.max_levels
    }

    /// Number of populated levels.
    #[inline]
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// True when no level is held.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Best level, if any.
    #[inline]
    pub fn best(&self) -> Option<&PriceLevel> {
        self.levels.first()
    }

    /// Level at `index`, best first.
    #[inline]
    pub fn level(&self, index: usize) -> Option<&PriceLevel> {
        self.levels.get(index)
    }

    /// Populated levels, best first.
    #[inline]
    pub fn levels(&self) -> &[PriceLevel] {
        &self.levels
    }

    /// Drops every level.
    #[inline]
    pub fn clear(&mut self) {
        self.levels.clear();
    }

    /// Replaces the contents with `other`'s, truncated to this side's capacity.
    pub fn copy_from(&mut self, other: &BookSide) {
        self.levels.clear();
        let take = other.levels.len().min(self.max_levels);
        self.levels.extend_from_slice(&other.levels[..take]);
    }

    fn search(&self, price: i64) -> Result<usize, usize> {
        self.levels
            .binary_search_by(|level| self.priority(level.price(), price))
    }

    /// Applies one level change.
    ///
    /// A non-zero `size` inserts or overwrites the level at `price`; a zero
    /// `size` removes it. Removing an absent price and inserting past the
    /// capacity bound leave the side untouched. At capacity, an insert ahead
    /// of the worst level pushes the worst level out.
    pub fn update(&mut self, price: i64, size: i64, count: i64) -> SideUpdate {
        match (self.search(price), size) {
            (Ok(index), 0) => {
                self.levels.remove(index);
                SideUpdate::Applied(index)
            }
            (Ok(index), _) => {
                self.levels[index].update(price, size, count);
                SideUpdate::Applied(index)
            }
            (Err(_), 0) => SideUpdate::NotPresent,
            (Err(index), _) if index >= self.max_levels => SideUpdate::BeyondCapacity(index),
            (Err(index), _) => {
                if self.levels.len() == self.max_levels {
                    self.levels.pop();
                }
                self.levels.insert(index, PriceLevel::new(price, size, count));
                SideUpdate::Applied(index)
            }
        }
    }

    /// Writes the visible levels, sentinel-filled past the current depth.
    pub fn write_to(&self, out: &mut [LevelEntry; VISIBLE_DEPTH]) {
        for (slot, index) in out.iter_mut().zip(0..) {
            *slot = self
                .levels
                .get(index)
                .map_or(LevelEntry::NULL, PriceLevel::to_entry);
        }
    }

    /// Applies each populated wire level as an [`BookSide::update`] and returns
    /// the shallowest index that changed. Null slots are skipped.
    pub fn update_from(&mut self, entries: &[LevelEntry]) -> Option<usize> {
        entries
            .iter()
            .filter(|entry| !entry.is_null())
            .filter_map(|entry| self.update(entry.price, entry.size, entry.count).index())
            .min()
    }

    /// Compares two prices by priority on this side: `Less` means `a` is better.
    #[inline]
    pub fn priority(&self, a: i64, b: i64) -> Ordering {
        match self.kind {
            SideKind::Bid => b.cmp(&a),
            SideKind::Ask => a.cmp(&b),
        }
    }
}
