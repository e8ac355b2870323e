//! Binance spot REST kline source (`GET /api/v3/klines`).

pub mod params;
pub mod provider;

pub use provider::{BinanceConfig, BinanceProvider, DEFAULT_BASE_URL};
