//! DeFiLlama coin price charts as a [`crate::providers::KlineSource`].
//!
//! The chart endpoint returns bare `(timestamp, price)` samples. Each sample is
//! normalized into a flat candle for its bucket and handed to the pagination
//! layer in the same row layout the kline endpoints use.

pub mod params;
pub mod provider;
pub mod response;

pub use provider::{DEFAULT_BASE_URL, DefiLlamaConfig, DefiLlamaProvider};
