//! Kline models and upstream access for the backfill cache.
//!
//! - [`models`]: canonical candle, interval/step, time range and series key types.
//! - [`normalize`]: raw upstream rows and chart samples → [`models::candle::CandlePoint`].
//! - [`providers`]: the page-level [`providers::KlineSource`] trait, the Binance REST
//!   and DeFiLlama chart implementations, a per-pair router, and the paginated
//!   fetcher that drives any source.

pub mod models;
pub mod normalize;
pub mod providers;
