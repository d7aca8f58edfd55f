//! Error types for logger operations.

use std::io;
use thiserror::Error;

/// Errors surfaced by construction, lifecycle, and sink operations.
///
/// Runtime failures on the consumer path are reported through the configured
/// error handler rather than returned, so the consumer loop never stops.
/// Dropped records are counters, not errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Rejected configuration (capacity not a power of two, empty sink list,
    /// incompatible options).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// `start()` was called on a logger that is already running.
    #[error("logger already started")]
    AlreadyStarted,

    /// Operation on a logger after `close()`.
    #[error("logger already closed")]
    AlreadyClosed,

    /// A sink write failed.
    #[error("sink write failed: {0}")]
    SinkWrite(#[source] io::Error),

    /// A sink sync/flush failed.
    #[error("sink sync failed: {0}")]
    SinkSync(#[source] io::Error),

    /// An encoder refused a record.
    #[error("encoding failed: {0}")]
    Encoding(String),

    /// An encoded record exceeded the configured maximum byte size.
    #[error("encoded record is {len} bytes, exceeding the {max} byte limit")]
    BufferOverflow { len: usize, max: usize },

    /// A hook or encoder panicked; the consumer recovered.
    #[error("panic recovered on consumer thread: {0}")]
    PanicRecovered(String),
}

impl Error {
    /// Stable error code, used as the prefix by the default error handler.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidConfig(_) => "RINGLOG-E001",
            Error::AlreadyStarted => "RINGLOG-E002",
            Error::AlreadyClosed => "RINGLOG-E003",
            Error::SinkWrite(_) => "RINGLOG-E004",
            Error::SinkSync(_) => "RINGLOG-E005",
            Error::Encoding(_) => "RINGLOG-E006",
            Error::BufferOverflow { .. } => "RINGLOG-E007",
            Error::PanicRecovered(_) => "RINGLOG-E008",
        }
    }

    /// Returns `true` for lifecycle misuse rather than I/O failure.
    #[inline]
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Error::AlreadyStarted | Error::AlreadyClosed)
    }

    /// Returns `true` if the error came from the sink layer.
    #[inline]
    pub fn is_sink(&self) -> bool {
        matches!(self, Error::SinkWrite(_) | Error::SinkSync(_))
    }
}

/// Convenience alias for fallible logger operations.
pub type Result<T> = std::result::Result<T, Error>;
