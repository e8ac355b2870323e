//! Upstream interval labels and the bucket [`Step`] each one implies.
//!
//! Fixed-size intervals (`1s` through `3d`) map to a millisecond width and use
//! plain integer math anchored at the Unix epoch. `1w` and `1M` are calendar
//! steps: weeks are Monday 00:00Z aligned and months start on the 1st at 00:00Z,
//! so their width varies and they are exempt from end-snapping.
//!
//! ```
//! use market_data_ingestor::models::interval::{Interval, Step};
//!
//! let iv: Interval = "1h".parse().unwrap();
//! assert_eq!(iv.step(), Step::Fixed(3_600_000));
//! assert_eq!(iv.step().snap_to_last_closed(7_300_000), 7_200_000);
//! assert!("1M".parse::<Interval>().unwrap().step().is_calendar());
//! ```

use std::{fmt, str::FromStr};

use chrono::{DateTime, Datelike, TimeZone, Utc};
use thiserror::Error;

/// Milliseconds in a second.
pub const MS_PER_SECOND: i64 = 1_000;
/// Milliseconds in a minute.
pub const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
/// Milliseconds in an hour.
pub const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
/// Milliseconds in a day.
pub const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;
/// Milliseconds in a week.
pub const MS_PER_WEEK: i64 = 7 * MS_PER_DAY;

/// shift so Monday 1969-12-29 00:00Z becomes index 0
const WEEK_MONDAY_ANCHOR_OFFSET_MS: i64 = 3 * MS_PER_DAY;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntervalError {
    #[error("unknown interval label: {0:?}")]
    UnknownLabel(String),
}

/// Kline interval as accepted by the upstream API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Interval {
    Sec1,
    Min1,
    Min3,
    Min5,
    Min15,
    Min30,
    Hour1,
    Hour2,
    Hour4,
    Hour6,
    Hour8,
    Hour12,
    Day1,
    Day3,
    Week1,
    Month1,
}

impl Interval {
    /// Every supported interval, shortest first.
    pub const ALL: [Interval; 16] = [
        Interval::Sec1,
        Interval::Min1,
        Interval::Min3,
        Interval::Min5,
        Interval::Min15,
        Interval::Min30,
        Interval::Hour1,
        Interval::Hour2,
        Interval::Hour4,
        Interval::Hour6,
        Interval::Hour8,
        Interval::Hour12,
        Interval::Day1,
        Interval::Day3,
        Interval::Week1,
        Interval::Month1,
    ];

    /// The wire label (`"1m"`, `"4h"`, `"1M"`, ...).
    pub const fn as_str(&self) -> &'static str {
        match self {
            Interval::Sec1 => "1s",
            Interval::Min1 => "1m",
            Interval::Min3 => "3m",
            Interval::Min5 => "5m",
            Interval::Min15 => "15m",
            Interval::Min30 => "30m",
            Interval::Hour1 => "1h",
            Interval::Hour2 => "2h",
            Interval::Hour4 => "4h",
            Interval::Hour6 => "6h",
            Interval::Hour8 => "8h",
            Interval::Hour12 => "12h",
            Interval::Day1 => "1d",
            Interval::Day3 => "3d",
            Interval::Week1 => "1w",
            Interval::Month1 => "1M",
        }
    }

    /// Bucket step for this interval.
    pub const fn step(&self) -> Step {
        match self {
            Interval::Sec1 => Step::Fixed(MS_PER_SECOND),
            Interval::Min1 => Step::Fixed(MS_PER_MINUTE),
            Interval::Min3 => Step::Fixed(3 * MS_PER_MINUTE),
            Interval::Min5 => Step::Fixed(5 * MS_PER_MINUTE),
            Interval::Min15 => Step::Fixed(15 * MS_PER_MINUTE),
            Interval::Min30 => Step::Fixed(30 * MS_PER_MINUTE),
            Interval::Hour1 => Step::Fixed(MS_PER_HOUR),
            Interval::Hour2 => Step::Fixed(2 * MS_PER_HOUR),
            Interval::Hour4 => Step::Fixed(4 * MS_PER_HOUR),
            Interval::Hour6 => Step::Fixed(6 * MS_PER_HOUR),
            Interval::Hour8 => Step::Fixed(8 * MS_PER_HOUR),
            Interval::Hour12 => Step::Fixed(12 * MS_PER_HOUR),
            Interval::Day1 => Step::Fixed(MS_PER_DAY),
            Interval::Day3 => Step::Fixed(3 * MS_PER_DAY),
            Interval::Week1 => Step::Calendar(CalendarUnit::Week),
            Interval::Month1 => Step::Calendar(CalendarUnit::Month),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = IntervalError;

    // labels are case sensitive: "1m" is a minute, "1M" a month
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim();
        Interval::ALL
            .into_iter()
            .find(|iv| iv.as_str() == label)
            .ok_or_else(|| IntervalError::UnknownLabel(s.to_string()))
    }
}

/// Calendar-sized bucket units (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarUnit {
    /// Monday-based week.
    Week,
    /// Calendar month.
    Month,
}

/// Distance between consecutive bucket open times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Constant width in milliseconds.
    Fixed(i64),
    /// Width follows the calendar.
    Calendar(CalendarUnit),
}

impl Step {
    /// Width in milliseconds for fixed steps.
    pub const fn fixed_ms(&self) -> Option<i64> {
        match self {
            Step::Fixed(ms) => Some(*ms),
            Step::Calendar(_) => None,
        }
    }

    pub const fn is_calendar(&self) -> bool {
        matches!(self, Step::Calendar(_))
    }

    /// Open time of the bucket containing `ts_ms`.
    pub fn floor(&self, ts_ms: i64) -> i64 {
        match self {
            Step::Fixed(ms) => ts_ms.div_euclid(*ms) * ms,
            Step::Calendar(CalendarUnit::Week) => week_start(week_index(ts_ms)),
            Step::Calendar(CalendarUnit::Month) => month_start(month_index(ts_ms)),
        }
    }

    /// Open time of the bucket after the one opening at `open_ms`.
    ///
    /// Fixed steps add the width verbatim, so `next_boundary(t) == t + step`
    /// even for a `t` that is not itself a boundary.
    pub fn next_boundary(&self, open_ms: i64) -> i64 {
        match self {
            Step::Fixed(ms) => open_ms.saturating_add(*ms),
            Step::Calendar(CalendarUnit::Week) => week_start(week_index(open_ms) + 1),
            Step::Calendar(CalendarUnit::Month) => month_start(month_index(open_ms) + 1),
        }
    }

    /// Open time of the bucket before the one opening at `open_ms`.
    pub fn prev_boundary(&self, open_ms: i64) -> i64 {
        match self {
            Step::Fixed(ms) => open_ms.saturating_sub(*ms),
            Step::Calendar(CalendarUnit::Week) => week_start(week_index(open_ms) - 1),
            Step::Calendar(CalendarUnit::Month) => month_start(month_index(open_ms) - 1),
        }
    }

    /// Snap `end_ms` down to the last fully closed bucket boundary.
    ///
    /// Calendar steps are passed through unchanged.
    pub fn snap_to_last_closed(&self, end_ms: i64) -> i64 {
        match self {
            Step::Fixed(ms) => end_ms.div_euclid(*ms) * ms,
            Step::Calendar(_) => end_ms,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Fixed(ms) => write!(f, "{ms}ms"),
            Step::Calendar(CalendarUnit::Week) => f.write_str("calendar week"),
            Step::Calendar(CalendarUnit::Month) => f.write_str("calendar month"),
        }
    }
}

// ----- week internals (Monday-aligned) -----

fn week_index(ts_ms: i64) -> i64 {
    ts_ms
        .saturating_add(WEEK_MONDAY_ANCHOR_OFFSET_MS)
        .div_euclid(MS_PER_WEEK)
}

fn week_start(idx: i64) -> i64 {
    idx.saturating_mul(MS_PER_WEEK)
        .saturating_sub(WEEK_MONDAY_ANCHOR_OFFSET_MS)
}

// ----- month internals (calendar-aware) -----

fn to_utc(ts_ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts_ms).unwrap_or(if ts_ms < 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

fn month_index(ts_ms: i64) -> i64 {
    // Linear month index relative to 1970-01 (index 0).
    let dt = to_utc(ts_ms);
    (dt.year() as i64 - 1970) * 12 + (dt.month0() as i64)
}

fn month_start(idx: i64) -> i64 {
    let year = 1970 + idx.div_euclid(12);
    let month = (idx.rem_euclid(12) + 1) as u32;
    i32::try_from(year)
        .ok()
        .and_then(|y| Utc.with_ymd_and_hms(y, month, 1, 0, 0, 0).single())
        .map_or(
            if idx < 0 { i64::MIN } else { i64::MAX },
            |dt| dt.timestamp_millis(),
        )
}
