//! Supervisor configuration.

use super::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default interval between scheduled reconnects.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60);
/// Default interval between keep-alive frames.
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);
/// Default interval between book sanity checks.
pub const DEFAULT_SANITY_CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);
/// Default number of retries after the first connect attempt.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
/// Default silence after which the feed is considered dead.
pub const DEFAULT_MAX_SILENT_INTERVAL: Duration = Duration::from_secs(30);
/// Default first backoff delay.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
/// Default bound on a single connect attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timing and retry settings for one inbound gateway.
///
/// Durations are serialized as whole milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Interval between proactive reconnects.
    #[serde(rename = "reconnect_interval_ms", with = "millis")]
    pub reconnect_interval: Duration,
    /// Interval between keep-alive frames.
    #[serde(rename = "keep_alive_interval_ms", with = "millis")]
    pub keep_alive_interval: Duration,
    /// Interval between book sanity checks.
    #[serde(rename = "sanity_check_interval_ms", with = "millis")]
    pub sanity_check_interval: Duration,
    /// Retries after the first connect attempt.
    pub max_reconnect_attempts: u32,
    /// Feed silence that forces a reconnect.
    #[serde(rename = "max_silent_interval_ms", with = "millis")]
    pub max_silent_interval: Duration,
    /// First backoff delay; doubles per failed attempt.
    #[serde(rename = "initial_backoff_ms", with = "millis")]
    pub initial_backoff: Duration,
    /// Bound on a single connect attempt.
    #[serde(rename = "connect_timeout_ms", with = "millis")]
    pub connect_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
            sanity_check_interval: DEFAULT_SANITY_CHECK_INTERVAL,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            max_silent_interval: DEFAULT_MAX_SILENT_INTERVAL,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl GatewayConfig {
    /// Sets the scheduled reconnect interval.
    #[must_use = "builders do nothing unless consumed"]
    #[inline]
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Sets the keep-alive interval.
    #[must_use = "builders do nothing unless consumed"]
    #[inline]
    pub fn with_keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = interval;
        self
    }

    /// Sets the sanity-check interval.
    #[must_use = "builders do nothing unless consumed"]
    #[inline]
    pub fn with_sanity_check_interval(mut self, interval: Duration) -> Self {
        self.sanity_check_interval = interval;
        self
    }

    /// Sets the number of retries after the first connect attempt.
    #[must_use = "builders do nothing unless consumed"]
    #[inline]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Sets the feed silence that forces a reconnect.
    #[must_use = "builders do nothing unless consumed"]
    #[inline]
    pub fn with_max_silent_interval(mut self, interval: Duration) -> Self {
        self.max_silent_interval = interval;
        self
    }

    /// Sets the first backoff delay.
    #[must_use = "builders do nothing unless consumed"]
    #[inline]
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Sets the per-attempt connect timeout.
    #[must_use = "builders do nothing unless consumed"]
    #[inline]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Checks that every interval is usable. A zero initial backoff would
    /// never grow, so it is rejected too.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the first zero interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let intervals = [
            ("reconnect_interval", self.reconnect_interval),
            ("keep_alive_interval", self.keep_alive_interval),
            ("sanity_check_interval", self.sanity_check_interval),
            ("max_silent_interval", self.max_silent_interval),
            ("connect_timeout", self.connect_timeout),
            ("initial_backoff", self.initial_backoff),
        ];
        match intervals.iter().find(|(_, value)| value.is_zero()) {
            Some(&(field, _)) => Err(ConfigError::Invalid {
                field,
                reason: "must be greater than zero".to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Parses and validates a JSON document. Missing keys take their defaults.
    ///
    /// # Errors
    /// Returns [`ConfigError::Json`] for malformed documents and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
