//! Bounded queue of records held back during a connect window.

use crate::wire::MarketRecord;
use crossbeam::queue::ArrayQueue;

/// Records the replay queue holds unless configured otherwise.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1 << 11;

/// The queue was full; the record was not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayFull;

/// Single-producer, single-consumer queue of record copies.
///
/// The worker pushes while the supervisor waits on the snapshot; the
/// supervisor drains after re-parking the worker. Records are stored by value
/// so the worker can reuse its scratch record immediately.
#[derive(Debug)]
pub struct ReplayQueue {
    records: ArrayQueue<MarketRecord>,
}

impl ReplayQueue {
    /// Creates an empty queue. A zero capacity is rounded up to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            records: ArrayQueue::new(capacity.max(1)),
        }
    }

    /// Slot count.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.records.capacity()
    }

    /// Records currently held.
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing is held.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Stores a copy of `record`.
    ///
    /// # Errors
    /// Returns [`ReplayFull`] when every slot is taken.
    #[inline]
    pub fn push(&self, record: &MarketRecord) -> Result<(), ReplayFull> {
        self.records.push(*record).map_err(|_| ReplayFull)
    }

    /// Pops every record in enqueue order into `consume` and returns how many
    /// were drained.
    pub fn drain(&self, mut consume: impl FnMut(&MarketRecord)) -> usize {
        let mut drained = 0;
        while let Some(record) = self.records.pop() {
            consume(&record);
            drained += 1;
        }
        drained
    }

    /// Discards everything held.
    pub fn clear(&self) {
        while self.records.pop().is_some() {}
    }
}
