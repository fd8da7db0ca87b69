//! Optional `metrics` counters.
//!
//! With the `metrics` feature disabled every function here compiles to
//! nothing. With it enabled they feed whatever recorder the process installed.

#[cfg(feature = "metrics")]
mod names {
    pub const CONNECT_ATTEMPTS: &str = "marketfeed_connect_attempts_total";
    pub const CONNECT_SUCCESSES: &str = "marketfeed_connect_successes_total";
    pub const CONNECT_FAILURES: &str = "marketfeed_connect_failures_total";
    pub const CONNECT_TIMEOUTS: &str = "marketfeed_connect_timeouts_total";
    pub const RECORDS_PUBLISHED: &str = "marketfeed_records_published_total";
    pub const RECORDS_REPLAYED: &str = "marketfeed_records_replayed_total";
    pub const RECORDS_DISCARDED: &str = "marketfeed_records_discarded_total";
    pub const REPLAY_OVERFLOWS: &str = "marketfeed_replay_overflows_total";
    pub const FORCED_RECONNECTS: &str = "marketfeed_forced_reconnects_total";
}

#[inline]
pub(crate) fn connect_attempt() {
    #[cfg(feature = "metrics")]
    metrics::counter!(names::CONNECT_ATTEMPTS).increment(1);
}

#[inline]
pub(crate) fn connect_success() {
    #[cfg(feature = "metrics")]
    metrics::counter!(names::CONNECT_SUCCESSES).increment(1);
}

#[inline]
pub(crate) fn connect_failure() {
    #[cfg(feature = "metrics")]
    metrics::counter!(names::CONNECT_FAILURES).increment(1);
}

#[inline]
pub(crate) fn connect_timeout() {
    #[cfg(feature = "metrics")]
    metrics::counter!(names::CONNECT_TIMEOUTS).increment(1);
}

#[inline]
pub(crate) fn record_published() {
    #[cfg(feature = "metrics")]
    metrics::counter!(names::RECORDS_PUBLISHED).increment(1);
}

#[inline]
pub(crate) fn records_replayed(_count: u64) {
    #[cfg(feature = "metrics")]
    metrics::counter!(names::RECORDS_REPLAYED).increment(_count);
}

#[inline]
pub(crate) fn records_discarded(_count: u64) {
    #[cfg(feature = "metrics")]
    metrics::counter!(names::RECORDS_DISCARDED).increment(_count);
}

#[inline]
pub(crate) fn replay_overflow() {
    #[cfg(feature = "metrics")]
    metrics::counter!(names::REPLAY_OVERFLOWS).increment(1);
}

#[inline]
pub(crate) fn forced_reconnect() {
    #[cfg(feature = "metrics")]
    metrics::counter!(names::FORCED_RECONNECTS).increment(1);
}
