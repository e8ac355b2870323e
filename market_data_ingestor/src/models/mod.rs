pub mod candle;
pub mod interval;
pub mod range;
pub mod raw_kline;
pub mod series_key;
