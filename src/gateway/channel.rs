//! Distribution channel seam.

use crate::wire::MarketRecord;
use crossbeam::channel::{Sender, TrySendError};

/// Result of offering one record downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferStatus {
    /// The record was taken.
    Accepted,
    /// No room right now; offer the same record again.
    BackPressured,
    /// The channel will never accept another record.
    Closed,
}

/// Bounded, single-writer outbound channel for published records.
pub trait OutboundChannel: Send + 'static {
    /// Offers one record. Must not block.
    fn offer(&mut self, record: &MarketRecord) -> OfferStatus;
}

/// [`OutboundChannel`] over a bounded crossbeam channel.
#[derive(Debug, Clone)]
pub struct CrossbeamChannel {
    sender: Sender<MarketRecord>,
}

impl CrossbeamChannel {
    /// Wraps the sending half of a bounded channel.
    pub fn new(sender: Sender<MarketRecord>) -> Self {
        Self { sender }
    }
}

impl OutboundChannel for CrossbeamChannel {
    #[inline]
    fn offer(&mut self, record: &MarketRecord) -> OfferStatus {
        match self.sender.try_send(*record) {
            Ok(()) => OfferStatus::Accepted,
            Err(TrySendError::Full(_)) => OfferStatus::BackPressured,
            Err(TrySendError::Disconnected(_)) => OfferStatus::Closed,
        }
    }
}
