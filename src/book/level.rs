//! A single aggregated price level.

use crate::wire::{COUNT_NULL, LevelEntry, PRICE_NULL, SIZE_NULL};
use std::fmt;

/// `(price, size, count)` triple with per-field "absent" sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PriceLevel {
    price: i64,
    size: i64,
    count: i64,
}

impl Default for PriceLevel {
    fn default() -> Self {
        Self::empty()
    }
}

impl PriceLevel {
    /// The absent level.
    pub const fn empty() -> Self {
        Self {
            price: PRICE_NULL,
            size: SIZE_NULL,
            count: COUNT_NULL,
        }
    }

    /// Creates a populated level.
    pub const fn new(price: i64, size: i64, count: i64) -> Self {
        Self { price, size, count }
    }

    /// Level price.
    #[inline]
    pub fn price(&self) -> i64 {
        self.price
    }

    /// Aggregated size.
    #[inline]
    pub fn size(&self) -> i64 {
        self.size
    }

    /// Order count.
    #[inline]
    pub fn count(&self) -> i64 {
        self.count
    }

    /// True when no level is held.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.price == PRICE_NULL
    }

    /// Overwrites all three fields and reports whether any of them changed.
    #[inline]
    pub fn update(&mut self, price: i64, size: i64, count: i64) -> bool {
        let changed = self.price != price || self.size != size || self.count != count;
        self.price = price;
        self.size = size;
        self.count = count;
        changed
    }

    /// Same as [`PriceLevel::update`] taking a wire entry.
    #[inline]
    pub fn update_from_entry(&mut self, entry: &LevelEntry) -> bool {
        self.update(entry.price, entry.size, entry.count)
    }

    /// Restores the sentinels.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::empty();
    }

    /// Wire representation of this level.
    #[inline]
    pub fn to_entry(&self) -> LevelEntry {
        LevelEntry::new(self.price, self.size, self.count)
    }
}

impl From<LevelEntry> for PriceLevel {
    fn from(entry: LevelEntry) -> Self {
        Self::new(entry.price, entry.size, entry.count)
    }
}

impl fmt::Display for PriceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "-")
        } else {
            write!(f, "{}x{} ({})", self.size, self.price, self.count)
        }
    }
}
