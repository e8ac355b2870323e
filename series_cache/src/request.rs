//! Turning user input into a [`SeriesKey`] and [`TimeRange`].

use chrono::DateTime;
use market_data_ingestor::models::{interval::Interval, range::TimeRange, series_key::SeriesKey};

use crate::{config::Config, errors::CacheError};

/// A validated series request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesRequest {
    /// Symbol as the caller spelled it, upper-cased.
    pub symbol: String,
    /// Upstream series.
    pub key: SeriesKey,
    /// Window to serve, end already snapped.
    pub range: TimeRange,
}

impl SeriesRequest {
    /// Validates raw request parameters against `config`.
    ///
    /// `end_ms` must be strictly after `start_ms`. For fixed steps it is then
    /// floored to a bucket boundary so a still-open bucket is never requested
    /// past its open time; calendar intervals keep the end as given.
    pub fn resolve(
        config: &Config,
        symbol: &str,
        interval_label: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Self, CacheError> {
        let pair = config
            .pair_for(symbol)
            .ok_or_else(|| CacheError::UnknownSymbol(symbol.to_string()))?;
        let interval: Interval = interval_label.parse()?;

        if end_ms <= start_ms {
            return Err(CacheError::InvalidRange(format!(
                "end {end_ms} must be after start {start_ms}"
            )));
        }

        let snapped = interval.step().snap_to_last_closed(end_ms);
        let range = TimeRange::new(start_ms, snapped)?;

        Ok(Self {
            symbol: symbol.trim().to_uppercase(),
            key: SeriesKey::new(pair, interval),
            range,
        })
    }
}

/// Parses epoch milliseconds or an RFC 3339 timestamp.
pub fn parse_timestamp_ms(input: &str) -> Result<i64, CacheError> {
    let input = input.trim();
    if let Ok(ms) = input.parse::<i64>() {
        return Ok(ms);
    }
    DateTime::parse_from_rfc3339(input)
        .map(|dt| dt.timestamp_millis())
        .map_err(|e| CacheError::InvalidRange(format!("bad timestamp {input:?}: {e}")))
}
