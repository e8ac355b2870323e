use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use crate::{
    models::{interval::Step, raw_kline::RawKline},
    normalize::{MalformedRecordError, normalize_price_point},
};

/// Body of `GET /chart/{coins}`.
#[derive(Debug, Deserialize)]
pub struct ChartResponse {
    #[serde(default)]
    pub coins: HashMap<String, CoinChart>,
}

/// Samples for one coin id.
#[derive(Debug, Deserialize)]
pub struct CoinChart {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub prices: Vec<PriceSample>,
}

/// One chart sample.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PriceSample {
    /// Unix seconds.
    pub timestamp: i64,
    pub price: f64,
}

impl ChartResponse {
    /// Samples of `coin` as kline rows, one per bucket of `step`, ascending.
    ///
    /// Samples falling in the same bucket collapse to the latest one. Rows opening
    /// after `end_ms` are dropped. A coin absent from the body yields no rows.
    pub fn into_rows(
        mut self,
        coin: &str,
        step: Step,
        end_ms: i64,
    ) -> Result<Vec<RawKline>, MalformedRecordError> {
        let Some(chart) = self.coins.remove(coin) else {
            return Ok(Vec::new());
        };

        let mut by_open = BTreeMap::new();
        for sample in chart.prices {
            let candle = normalize_price_point(sample.timestamp, sample.price, step)?;
            if candle.open_time <= end_ms {
                by_open.insert(candle.open_time, candle);
            }
        }
        Ok(by_open.values().map(RawKline::from).collect())
    }
}
