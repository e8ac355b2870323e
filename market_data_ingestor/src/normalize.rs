//! Upstream records → [`CandlePoint`].
//!
//! Two record shapes are supported: full kline rows ([`normalize_kline`]) and
//! bare `(timestamp, price)` chart points ([`normalize_price_point`]).
//!
//! Normalization is all-or-nothing per record: a record that cannot be mapped is
//! reported, never skipped, because a dropped bucket would leave a hole in the
//! cached series that later gap analysis cannot tell apart from real data.

use thiserror::Error;

use crate::models::{
    candle::CandlePoint,
    interval::Step,
    raw_kline::{
        CLOSE, HIGH, LOW, OPEN, QUOTE_VOLUME, RawKline, TAKER_BUY_BASE, TAKER_BUY_QUOTE, TRADES,
        VOLUME,
    },
};

/// An upstream record that does not fit the kline layout.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MalformedRecordError {
    #[error("kline field {name} (index {index}) is missing")]
    MissingField { name: &'static str, index: usize },

    #[error("kline field {name} (index {index}) is not numeric: {value}")]
    NotNumeric {
        name: &'static str,
        index: usize,
        value: String,
    },

    #[error("price point at {timestamp_s}s has a non-finite price: {price}")]
    BadPrice { timestamp_s: i64, price: String },

    #[error("price point timestamp {timestamp_s}s is out of range")]
    TimestampOutOfRange { timestamp_s: i64 },
}

/// Maps one raw kline into the canonical candle.
///
/// The row carries its own open and close times, which are kept verbatim; an
/// upstream grid anchored away from the epoch is accepted as-is.
pub fn normalize_kline(raw: &RawKline, _step: Step) -> Result<CandlePoint, MalformedRecordError> {
    let open_time = raw.open_time()?;
    let close_time = raw.close_time()?;

    let trades = raw.int_field(TRADES, "trades")?;
    let trades = u64::try_from(trades).map_err(|_| MalformedRecordError::NotNumeric {
        name: "trades",
        index: TRADES,
        value: trades.to_string(),
    })?;

    Ok(CandlePoint {
        open_time,
        close_time,
        open: raw.float_field(OPEN, "open")?,
        high: raw.float_field(HIGH, "high")?,
        low: raw.float_field(LOW, "low")?,
        close: raw.float_field(CLOSE, "close")?,
        volume: raw.float_field(VOLUME, "volume")?,
        quote_volume: raw.float_field(QUOTE_VOLUME, "quote_volume")?,
        trades,
        taker_buy_base: raw.float_field(TAKER_BUY_BASE, "taker_buy_base")?,
        taker_buy_quote: raw.float_field(TAKER_BUY_QUOTE, "taker_buy_quote")?,
    })
}

/// Normalizes a whole page, failing on the first bad row.
pub fn normalize_all(
    raws: &[RawKline],
    step: Step,
) -> Result<Vec<CandlePoint>, MalformedRecordError> {
    raws.iter().map(|raw| normalize_kline(raw, step)).collect()
}

/// Maps a chart price sample (unix seconds, price) into a flat candle.
///
/// The sample is placed in the bucket of `step` containing it. Open, high, low
/// and close all equal the price; volumes and trade count are zero.
pub fn normalize_price_point(
    timestamp_s: i64,
    price: f64,
    step: Step,
) -> Result<CandlePoint, MalformedRecordError> {
    if !price.is_finite() {
        return Err(MalformedRecordError::BadPrice {
            timestamp_s,
            price: price.to_string(),
        });
    }
    let ts_ms = timestamp_s
        .checked_mul(1_000)
        .ok_or(MalformedRecordError::TimestampOutOfRange { timestamp_s })?;
    let open_time = step.floor(ts_ms);
    let close_time = step.next_boundary(open_time).saturating_sub(1);

    Ok(CandlePoint {
        open_time,
        close_time,
        open: price,
        high: price,
        low: price,
        close: price,
        volume: 0.0,
        quote_volume: 0.0,
        trades: 0,
        taker_buy_base: 0.0,
        taker_buy_quote: 0.0,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::interval::Interval;

    fn binance_row() -> RawKline {
        serde_json::from_value(json!([
            1_499_040_000_000_i64,
            "0.01634790",
            "0.80000000",
            "0.01575800",
            "0.01577100",
            "148976.11427815",
            1_499_644_799_999_i64,
            "2434.19055334",
            308,
            "1756.87402397",
            "28.46694368",
            "17928899.62484339"
        ]))
        .unwrap()
    }

    #[test]
    fn maps_every_position() {
        let c = normalize_kline(&binance_row(), Interval::Week1.step()).unwrap();
        assert_eq!(c.open_time, 1_499_040_000_000);
        assert_eq!(c.close_time, 1_499_644_799_999);
        assert_eq!(c.open, 0.0163479);
        assert_eq!(c.high, 0.8);
        assert_eq!(c.low, 0.015758);
        assert_eq!(c.close, 0.015771);
        assert_eq!(c.volume, 148976.11427815);
        assert_eq!(c.quote_volume, 2434.19055334);
        assert_eq!(c.trades, 308);
        assert_eq!(c.taker_buy_base, 1756.87402397);
        assert_eq!(c.taker_buy_quote, 28.46694368);
    }

    #[test]
    fn accepts_plain_json_numbers() {
        let raw: RawKline = serde_json::from_value(json!([
            0, 1.5, 2.0, 1.0, 1.75, 10, 999, 17.5, 4, 6, 9.5
        ]))
        .unwrap();
        let c = normalize_kline(&raw, Step::Fixed(1_000)).unwrap();
        assert_eq!(c.close, 1.75);
        assert_eq!(c.trades, 4);
    }

    #[test]
    fn non_numeric_price_is_an_error() {
        let mut raw = binance_row();
        raw.0[2] = json!("not-a-price");
        let err = normalize_kline(&raw, Interval::Week1.step()).unwrap_err();
        assert_eq!(
            err,
            MalformedRecordError::NotNumeric {
                name: "high",
                index: 2,
                value: "\"not-a-price\"".into()
            }
        );
    }

    #[test]
    fn truncated_row_reports_missing_field() {
        let mut raw = binance_row();
        raw.0.truncate(9);
        let err = normalize_kline(&raw, Interval::Week1.step()).unwrap_err();
        assert_eq!(
            err,
            MalformedRecordError::MissingField {
                name: "taker_buy_base",
                index: 9
            }
        );
    }

    #[test]
    fn keeps_rows_off_the_epoch_grid() {
        // 3d buckets upstream are anchored at the listing date, not at 1970-01-01
        let raw: RawKline = serde_json::from_value(json!([
            1_502_928_000_000_i64,
            "4261.48",
            "4485.39",
            "4200.74",
            "4427.30",
            "63.19",
            1_503_187_199_999_i64,
            "275598.74",
            1_208,
            "50.43",
            "219950.70",
            "0"
        ]))
        .unwrap();
        let step = Interval::Day3.step();
        assert_ne!(step.floor(1_502_928_000_000), 1_502_928_000_000);

        let c = normalize_kline(&raw, step).unwrap();

        assert_eq!(c.open_time, 1_502_928_000_000);
        assert_eq!(c.close_time, 1_503_187_199_999);
        assert_eq!(c.close, 4427.30);
    }

    #[test]
    fn price_point_fills_its_bucket() {
        // 2023-09-14T06:44:00Z
        let c = normalize_price_point(1_694_673_840, 1.0012, Interval::Hour8.step()).unwrap();
        assert_eq!(c.open_time, 1_694_649_600_000);
        assert_eq!(c.close_time, 1_694_678_399_999);
        assert_eq!((c.open, c.high, c.low, c.close), (1.0012, 1.0012, 1.0012, 1.0012));
        assert_eq!(c.trades, 0);
    }

    #[test]
    fn price_point_rejects_nan_and_overflow() {
        let step = Interval::Hour1.step();
        assert!(matches!(
            normalize_price_point(0, f64::NAN, step),
            Err(MalformedRecordError::BadPrice { .. })
        ));
        assert_eq!(
            normalize_price_point(i64::MAX, 1.0, step).unwrap_err(),
            MalformedRecordError::TimestampOutOfRange { timestamp_s: i64::MAX }
        );
    }

    #[test]
    fn one_bad_row_fails_the_page() {
        let good = binance_row();
        let mut bad = binance_row();
        bad.0[8] = json!(-3);
        assert!(normalize_all(&[good.clone()], Interval::Week1.step()).is_ok());
        assert!(normalize_all(&[good, bad], Interval::Week1.step()).is_err());
    }
}
