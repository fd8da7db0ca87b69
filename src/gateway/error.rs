//! Error types for the ingestion gateway.
//!
//! Each layer has its own enum: [`TransportError`] for the exchange
//! connection, [`ReaderError`] for the feed worker and its control half,
//! [`ConnectError`] for the retrying connect controller, [`WriterError`] for
//! outbound frames and [`ConfigError`] for configuration loading.
//! [`GatewayError`] wraps them for the supervisor agent.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Failures of the exchange connection collaborators.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The remote end closed the connection.
    #[error("connection closed by the remote end")]
    ConnectionLost,

    /// A blocking call observed the interrupt and gave up.
    #[error("transport call interrupted")]
    Interrupted,

    /// Socket level failure.
    #[error("transport i/o error: {0}")]
    Io(#[from] io::Error),

    /// The venue answered with something the session cannot use, e.g. a
    /// rejected subscription or a malformed snapshot.
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of the failure.
        message: String,
    },
}

/// Failures of the socket reader, on either the worker or the control side.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReaderError {
    /// The feed connection dropped while the worker was reading.
    #[error("feed connection lost")]
    ConnectionLost,

    /// More records arrived during a connect window than the replay queue holds.
    #[error("replay queue overflowed its capacity of {capacity} records")]
    ReplayOverflow {
        /// Replay queue capacity.
        capacity: usize,
    },

    /// The distribution channel refuses all further records.
    #[error("distribution channel closed")]
    ChannelClosed,

    /// A handshake wait observed the interrupt.
    #[error("reader operation interrupted")]
    Interrupted,

    /// A transport collaborator failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ReaderError {
    /// True for conditions the worker cannot recover from by reconnecting.
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(self, ReaderError::ChannelClosed)
    }
}

/// Why a single connect attempt did not succeed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AttemptError {
    /// The watchdog fired before the attempt finished.
    #[error("connect attempt timed out after {after:?}")]
    Timeout {
        /// Configured connect timeout.
        after: Duration,
    },

    /// The connector returned an error.
    #[error("connect attempt failed: {0}")]
    Failed(#[source] ReaderError),
}

/// Failures of [`SocketConnectController::connect`](super::SocketConnectController::connect).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConnectError {
    /// The caller's interrupt was raised during an attempt or a backoff sleep.
    #[error("connect interrupted")]
    Interrupted,

    /// Every attempt failed.
    #[error("connect failed after {attempts} attempts")]
    Exhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Cause of the last attempt's failure.
        #[source]
        source: AttemptError,
    },
}

/// Outbound lane of a [`SocketWriter`](super::SocketWriter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    /// Subscriptions and other session data.
    Data,
    /// Pings, pongs and other control frames.
    Control,
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lane::Data => write!(f, "data"),
            Lane::Control => write!(f, "control"),
        }
    }
}

/// Failures of the outbound writer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriterError {
    /// The lane has no free slot.
    #[error("{lane} write queue is full")]
    QueueFull {
        /// Lane that rejected the frame.
        lane: Lane,
    },

    /// The frame exceeds the configured frame limit.
    #[error("frame of {len} bytes exceeds the {limit} byte limit")]
    FrameTooLarge {
        /// Frame length.
        len: usize,
        /// Configured limit.
        limit: usize,
    },

    /// The sink failed to write.
    #[error("socket write failed: {0}")]
    Io(#[from] io::Error),
}

/// Failures while loading a [`GatewayConfig`](super::GatewayConfig).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The document is not valid JSON for the configuration schema.
    #[error("invalid configuration document: {0}")]
    Json(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// Failures surfaced by the inbound gateway agent.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// Connecting or reconnecting failed.
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// A reader operation failed outside of a connect.
    #[error(transparent)]
    Reader(#[from] ReaderError),

    /// Queueing a keep-alive frame failed.
    #[error(transparent)]
    Writer(#[from] WriterError),
}

impl GatewayError {
    /// True when the gateway can no longer ingest the instrument, or was told
    /// to shut down.
    pub fn is_fatal(&self) -> bool {
        match self {
            GatewayError::Connect(_) | GatewayError::Reader(ReaderError::Interrupted) => true,
            GatewayError::Reader(err) => err.is_fatal(),
            GatewayError::Writer(_) => false,
        }
    }
}
