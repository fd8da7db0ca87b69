//! Fixed-layout market-by-price wire record.
//!
//! [`MarketRecord`] is the unit exchanged between the feed decoders, the
//! books and the distribution channel. It carries ten price levels per side
//! and is `#[repr(C)]` without padding, so it can be cast to and from bytes
//! with `zerocopy` and copied into the replay queue by value.
//!
//! Absent numeric fields hold the sentinels defined here rather than zero,
//! because zero is a legal size (removal) and a legal sequence number.

use bitflags::bitflags;
use bytes::Bytes;
use thiserror::Error;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Number of levels per side carried by every record.
pub const VISIBLE_DEPTH: usize = 10;

/// Price of an absent level.
pub const PRICE_NULL: i64 = i64::MAX;
/// Size of an absent level.
pub const SIZE_NULL: i64 = i64::MAX;
/// Order count of an absent level.
pub const COUNT_NULL: i64 = i64::MAX;
/// Sequence number of a record or book that has not seen any data.
pub const SEQUENCE_NULL: u64 = u64::MAX;
/// Timestamp that was never stamped.
pub const TIMESTAMP_NULL: u64 = u64::MAX;
/// Depth byte meaning "no visible level changed".
pub const DEPTH_NULL: u8 = u8::MAX;

/// Size in bytes of an encoded [`MarketRecord`].
pub const RECORD_LEN: usize = size_of::<MarketRecord>();

/// Errors raised when decoding a record from raw bytes.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum WireError {
    /// The buffer does not hold exactly one record.
    #[error("record length mismatch: expected {expected} bytes, got {actual}")]
    Length {
        /// Encoded record size.
        expected: usize,
        /// Length of the supplied buffer.
        actual: usize,
    },
}

/// Kind of event a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Action {
    /// A book change.
    #[default]
    Modify = 0,
    /// An execution print. Leaves the book levels untouched.
    Trade = 1,
}

impl Action {
    /// Decodes the raw header byte. Unknown values map to [`Action::Modify`].
    #[inline]
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Action::Trade,
            _ => Action::Modify,
        }
    }
}

/// Book side a record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Side {
    /// Buy side.
    Bid = 0,
    /// Sell side.
    Ask = 1,
    /// Not side specific, e.g. a full-depth update.
    #[default]
    None = 2,
}

impl Side {
    /// Decodes the raw header byte. Unknown values map to [`Side::None`].
    #[inline]
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Side::Bid,
            1 => Side::Ask,
            _ => Side::None,
        }
    }
}

bitflags! {
    /// Per-record flag bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RecordFlags: u8 {
        /// The record carries aggregated market-by-price levels.
        const MARKET_BY_PRICE = 1 << 0;
    }
}

/// One `(price, size, count)` triple as laid out on the wire.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct LevelEntry {
    /// Level price in ticks.
    pub price: i64,
    /// Aggregated size resting at the price.
    pub size: i64,
    /// Number of orders at the price.
    pub count: i64,
}

impl LevelEntry {
    /// The absent level.
    pub const NULL: Self = Self {
        price: PRICE_NULL,
        size: SIZE_NULL,
        count: COUNT_NULL,
    };

    /// Creates a populated level.
    #[inline]
    pub const fn new(price: i64, size: i64, count: i64) -> Self {
        Self { price, size, count }
    }

    /// True when this slot carries no level.
    #[inline]
    pub const fn is_null(&self) -> bool {
        self.price == PRICE_NULL
    }
}

impl Default for LevelEntry {
    fn default() -> Self {
        Self::NULL
    }
}

/// Ten-level market-by-price record.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct MarketRecord {
    action: u8,
    side: u8,
    depth: u8,
    flags: u8,
    /// Venue identifier.
    pub exchange_id: u16,
    _reserved: u16,
    /// Instrument identifier.
    pub security_id: u64,
    /// Exchange event time.
    pub timestamp_event: u64,
    /// Exchange send time.
    pub timestamp_sent: u64,
    /// Local receive time, stamped by the reader.
    pub timestamp_recv: u64,
    /// Exchange sequence number.
    pub sequence: u64,
    /// Price of the single-level delta or trade this record describes.
    pub price: i64,
    /// Size of the single-level delta or trade this record describes.
    pub size: i64,
    /// Bid levels, best first.
    pub bids: [LevelEntry; VISIBLE_DEPTH],
    /// Ask levels, best first.
    pub asks: [LevelEntry; VISIBLE_DEPTH],
}

impl Default for MarketRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketRecord {
    /// Creates a record with every field set to its null value.
    pub const fn new() -> Self {
        Self {
            action: Action::Modify as u8,
            side: Side::None as u8,
            depth: DEPTH_NULL,
            flags: 0,
            exchange_id: 0,
            _reserved: 0,
            security_id: 0,
            timestamp_event: TIMESTAMP_NULL,
            timestamp_sent: TIMESTAMP_NULL,
            timestamp_recv: TIMESTAMP_NULL,
            sequence: SEQUENCE_NULL,
            price: PRICE_NULL,
            size: SIZE_NULL,
            bids: [LevelEntry::NULL; VISIBLE_DEPTH],
            asks: [LevelEntry::NULL; VISIBLE_DEPTH],
        }
    }

    /// Restores every field to its null value, keeping the venue and
    /// instrument identifiers.
    pub fn reset(&mut self) {
        let exchange_id = self.exchange_id;
        let security_id = self.security_id;
        *self = Self::new();
        self.exchange_id = exchange_id;
        self.security_id = security_id;
    }

    /// Event kind.
    #[inline]
    pub fn action(&self) -> Action {
        Action::from_raw(self.action)
    }

    /// Sets the event kind.
    #[inline]
    pub fn set_action(&mut self, action: Action) {
        self.action = action as u8;
    }

    /// Side of a single-level delta or trade.
    #[inline]
    pub fn side(&self) -> Side {
        Side::from_raw(self.side)
    }

    /// Sets the side.
    #[inline]
    pub fn set_side(&mut self, side: Side) {
        self.side = side as u8;
    }

    /// Shallowest visible level changed by this record, if any.
    #[inline]
    pub fn depth(&self) -> Option<u8> {
        (self.depth != DEPTH_NULL).then_some(self.depth)
    }

    /// Sets the changed depth; `None` writes [`DEPTH_NULL`].
    #[inline]
    pub fn set_depth(&mut self, depth: Option<u8>) {
        self.depth = depth.unwrap_or(DEPTH_NULL);
    }

    /// Flag bits. Unknown bits are dropped.
    #[inline]
    pub fn flags(&self) -> RecordFlags {
        RecordFlags::from_bits_truncate(self.flags)
    }

    /// Replaces the flag bits.
    #[inline]
    pub fn set_flags(&mut self, flags: RecordFlags) {
        self.flags = flags.bits();
    }

    /// True when the record is a single-level delta: a side and a price are set.
    #[inline]
    pub fn is_level_delta(&self) -> bool {
        self.side() != Side::None && self.price != PRICE_NULL
    }

    /// Copies the record into an owned byte buffer.
    pub fn encode(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }

    /// Reads one record from `buf`, which must be exactly [`RECORD_LEN`] bytes.
    ///
    /// # Errors
    /// Returns [`WireError::Length`] when the buffer size does not match.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        Self::read_from_bytes(buf).map_err(|_| WireError::Length {
            expected: RECORD_LEN,
            actual: buf.len(),
        })
    }
}
