//! Read-through cache of exchange klines.
//!
//! [`cache::SeriesCache`] serves candles for a series and window from a
//! [`store::SeriesStore`], computes the missing sub-ranges with
//! [`gaps::compute_missing_ranges`], and backfills them from an upstream
//! [`market_data_ingestor::providers::KlineSource`] before answering.

#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod db;
pub mod errors;
pub mod gaps;
pub mod inflight;
pub mod request;
#[allow(missing_docs)]
pub mod schema;
pub mod store;

pub use cache::{CachePolicy, SeriesCache};
pub use errors::CacheError;
