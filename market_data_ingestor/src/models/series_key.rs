//! Identity of one cached series.

use std::fmt;

use crate::models::interval::{Interval, Step};

/// `(symbol_pair, interval)`; one ordered collection in the store per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    /// Upstream trading pair, e.g. `"BTCUSDT"`.
    pub symbol_pair: String,
    pub interval: Interval,
}

impl SeriesKey {
    pub fn new(symbol_pair: impl Into<String>, interval: Interval) -> Self {
        Self {
            symbol_pair: symbol_pair.into(),
            interval,
        }
    }

    pub const fn step(&self) -> Step {
        self.interval.step()
    }

    /// Collection name in the store, `"{pair}:{interval}"`.
    pub fn storage_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.symbol_pair, self.interval)
    }
}
