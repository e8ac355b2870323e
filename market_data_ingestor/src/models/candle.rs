//! Canonical in-memory representation of one kline bucket.
//!
//! Every [`KlineSource`](crate::providers::KlineSource) record ends up as a
//! [`CandlePoint`] after [`normalize_kline`](crate::normalize::normalize_kline),
//! and this is also the shape persisted in the cache.

use serde::{Deserialize, Serialize};

/// A single OHLCV bucket plus the exchange's volume breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandlePoint {
    /// Inclusive bucket start, epoch ms. Unique within a series.
    pub open_time: i64,
    /// Bucket end as reported by the upstream, epoch ms.
    pub close_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Base asset volume.
    pub volume: f64,
    /// Quote asset volume.
    pub quote_volume: f64,
    /// Number of trades in the bucket.
    pub trades: u64,
    pub taker_buy_base: f64,
    pub taker_buy_quote: f64,
}
