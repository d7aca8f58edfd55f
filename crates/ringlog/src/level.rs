use crate::Error;
use std::fmt;
use std::str::FromStr;

/// Log severity level.
///
/// Levels are totally ordered: `Debug < Info < Warn < Error < DPanic <
/// Panic < Fatal`. The `i8` discriminants are stable and appear on the wire
/// wherever a numeric encoding is requested, so they must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i8)]
pub enum Level {
    /// Verbose diagnostics, normally disabled in production.
    Debug = -1,
    /// Default operational level.
    Info = 0,
    /// Something unexpected that the process can tolerate.
    Warn = 1,
    /// A failure that needs attention but not termination.
    Error = 2,
    /// Panics in development mode, logs as an error otherwise.
    DPanic = 3,
    /// Logs and then invokes the host panic callback.
    Panic = 4,
    /// Logs, syncs, and then invokes the host exit callback.
    Fatal = 5,
}

impl Level {
    /// All levels in ascending severity order.
    pub const ALL: [Level; 7] = [
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::DPanic,
        Level::Panic,
        Level::Fatal,
    ];

    /// Lowercase rendering used by the JSON encoder.
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::DPanic => "dpanic",
            Level::Panic => "panic",
            Level::Fatal => "fatal",
        }
    }

    /// Uppercase rendering used by the console encoder.
    #[inline]
    pub fn as_str_upper(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::DPanic => "DPANIC",
            Level::Panic => "PANIC",
            Level::Fatal => "FATAL",
        }
    }

    /// Returns `true` if a record at `other` passes a gate set to `self`.
    #[inline]
    pub fn enabled(self, other: Level) -> bool {
        other >= self
    }

    /// Whether a record at this level triggers the host panic callback
    /// after publishing. `DPanic` only does so in development mode.
    #[inline]
    pub fn should_panic(self, development: bool) -> bool {
        match self {
            Level::Panic => true,
            Level::DPanic => development,
            _ => false,
        }
    }

    /// Levels that trigger the host exit callback after syncing.
    #[inline]
    pub fn should_exit(self) -> bool {
        matches!(self, Level::Fatal)
    }

    /// The stable numeric encoding of this level.
    #[inline]
    pub fn as_i8(self) -> i8 {
        self as i8
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" | "err" => Ok(Level::Error),
            "dpanic" => Ok(Level::DPanic),
            "panic" => Ok(Level::Panic),
            "fatal" => Ok(Level::Fatal),
            other => Err(Error::InvalidConfig(format!("unknown level: {other}"))),
        }
    }
}
