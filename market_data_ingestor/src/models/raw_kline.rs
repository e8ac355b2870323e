//! Upstream kline record as it comes off the wire.
//!
//! The REST API returns each bucket as a fixed-position JSON array:
//!
//! | idx | field            | idx | field              |
//! |-----|------------------|-----|--------------------|
//! | 0   | open time (ms)   | 6   | close time (ms)    |
//! | 1   | open             | 7   | quote volume       |
//! | 2   | high             | 8   | number of trades   |
//! | 3   | low              | 9   | taker buy base     |
//! | 4   | close            | 10  | taker buy quote    |
//! | 5   | volume           | 11  | unused             |
//!
//! Prices and volumes are usually quoted strings, times and counts plain numbers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{models::candle::CandlePoint, normalize::MalformedRecordError};

pub const OPEN_TIME: usize = 0;
pub const OPEN: usize = 1;
pub const HIGH: usize = 2;
pub const LOW: usize = 3;
pub const CLOSE: usize = 4;
pub const VOLUME: usize = 5;
pub const CLOSE_TIME: usize = 6;
pub const QUOTE_VOLUME: usize = 7;
pub const TRADES: usize = 8;
pub const TAKER_BUY_BASE: usize = 9;
pub const TAKER_BUY_QUOTE: usize = 10;

/// One raw kline row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawKline(pub Vec<Value>);

impl RawKline {
    pub fn open_time(&self) -> Result<i64, MalformedRecordError> {
        self.int_field(OPEN_TIME, "open_time")
    }

    /// Close time, the pagination cursor source.
    pub fn close_time(&self) -> Result<i64, MalformedRecordError> {
        self.int_field(CLOSE_TIME, "close_time")
    }

    pub(crate) fn int_field(
        &self,
        index: usize,
        name: &'static str,
    ) -> Result<i64, MalformedRecordError> {
        let value = self.field(index, name)?;
        let parsed = match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| MalformedRecordError::NotNumeric {
            name,
            index,
            value: value.to_string(),
        })
    }

    pub(crate) fn float_field(
        &self,
        index: usize,
        name: &'static str,
    ) -> Result<f64, MalformedRecordError> {
        let value = self.field(index, name)?;
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed
            .filter(|v| v.is_finite())
            .ok_or_else(|| MalformedRecordError::NotNumeric {
                name,
                index,
                value: value.to_string(),
            })
    }

    fn field(&self, index: usize, name: &'static str) -> Result<&Value, MalformedRecordError> {
        match self.0.get(index) {
            Some(Value::Null) | None => Err(MalformedRecordError::MissingField { name, index }),
            Some(v) => Ok(v),
        }
    }
}

/// Re-encodes a candle in the upstream row layout (prices as strings).
impl From<&CandlePoint> for RawKline {
    fn from(c: &CandlePoint) -> Self {
        RawKline(vec![
            Value::from(c.open_time),
            Value::from(c.open.to_string()),
            Value::from(c.high.to_string()),
            Value::from(c.low.to_string()),
            Value::from(c.close.to_string()),
            Value::from(c.volume.to_string()),
            Value::from(c.close_time),
            Value::from(c.quote_volume.to_string()),
            Value::from(c.trades),
            Value::from(c.taker_buy_base.to_string()),
            Value::from(c.taker_buy_quote.to_string()),
            Value::from("0"),
        ])
    }
}
