//! Inclusive millisecond windows.

use std::fmt;

use thiserror::Error;

/// Raised when a window would end before it starts.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("range start {start_ms} is after end {end_ms}")]
pub struct RangeError {
    pub start_ms: i64,
    pub end_ms: i64,
}

/// `[start_ms, end_ms]`, both ends inclusive, epoch milliseconds.
///
/// Always satisfies `start_ms <= end_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeRange {
    start_ms: i64,
    end_ms: i64,
}

impl TimeRange {
    pub fn new(start_ms: i64, end_ms: i64) -> Result<Self, RangeError> {
        if start_ms > end_ms {
            return Err(RangeError { start_ms, end_ms });
        }
        Ok(Self { start_ms, end_ms })
    }

    pub const fn start_ms(&self) -> i64 {
        self.start_ms
    }

    pub const fn end_ms(&self) -> i64 {
        self.end_ms
    }

    pub const fn contains(&self, ts_ms: i64) -> bool {
        self.start_ms <= ts_ms && ts_ms <= self.end_ms
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start_ms, self.end_ms)
    }
}
