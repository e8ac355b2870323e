use serde::Serialize;

use crate::{
    models::interval::{MS_PER_DAY, MS_PER_HOUR, MS_PER_MINUTE},
    providers::{InvalidQuerySnafu, PageQuery, ProviderError},
};

/// Query string of `GET /chart/{coins}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartParams {
    /// First sample, unix seconds.
    pub start: i64,
    /// Sample spacing, e.g. `4h`.
    pub period: String,
    /// Number of samples.
    pub span: u32,
}

/// Period notation for a fixed step in whole minutes, hours or days.
pub fn period_label(step_ms: i64) -> Option<String> {
    if step_ms <= 0 {
        return None;
    }
    if step_ms % MS_PER_DAY == 0 {
        Some(format!("{}d", step_ms / MS_PER_DAY))
    } else if step_ms % MS_PER_HOUR == 0 {
        Some(format!("{}h", step_ms / MS_PER_HOUR))
    } else if step_ms % MS_PER_MINUTE == 0 {
        Some(format!("{}m", step_ms / MS_PER_MINUTE))
    } else {
        None
    }
}

impl TryFrom<&PageQuery> for ChartParams {
    type Error = ProviderError;

    fn try_from(q: &PageQuery) -> Result<Self, Self::Error> {
        let step = q.interval.step();
        let Some((step_ms, period)) = step.fixed_ms().and_then(|ms| Some((ms, period_label(ms)?)))
        else {
            return InvalidQuerySnafu {
                message: format!("interval {} has no chart period", q.interval),
            }
            .fail();
        };
        if q.limit == 0 || q.start_ms > q.end_ms {
            return InvalidQuerySnafu {
                message: format!("empty chart window [{}, {}]", q.start_ms, q.end_ms),
            }
            .fail();
        }

        let buckets = (q.end_ms - q.start_ms) / step_ms + 1;
        let span = u32::try_from(buckets).unwrap_or(u32::MAX).min(q.limit);

        Ok(Self {
            start: q.start_ms.div_euclid(1_000),
            period,
            span,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::interval::Interval;

    fn query(interval: Interval, start_ms: i64, end_ms: i64, limit: u32) -> PageQuery {
        PageQuery {
            symbol_pair: "CUSDUSD".into(),
            interval,
            start_ms,
            end_ms,
            limit,
        }
    }

    #[test]
    fn period_labels() {
        assert_eq!(period_label(MS_PER_MINUTE * 15).as_deref(), Some("15m"));
        assert_eq!(period_label(MS_PER_HOUR * 8).as_deref(), Some("8h"));
        assert_eq!(period_label(MS_PER_DAY * 3).as_deref(), Some("3d"));
        assert_eq!(period_label(1_000), None);
    }

    #[test]
    fn span_counts_buckets_and_respects_limit() {
        let p = ChartParams::try_from(&query(Interval::Hour1, 0, 5 * MS_PER_HOUR, 1000)).unwrap();
        assert_eq!(p, ChartParams { start: 0, period: "1h".into(), span: 6 });

        let capped = ChartParams::try_from(&query(Interval::Min1, 0, MS_PER_DAY, 100)).unwrap();
        assert_eq!(capped.span, 100);
    }

    #[test]
    fn calendar_and_second_intervals_are_rejected() {
        for iv in [Interval::Sec1, Interval::Week1, Interval::Month1] {
            let err = ChartParams::try_from(&query(iv, 0, MS_PER_DAY, 10)).unwrap_err();
            assert!(matches!(err, ProviderError::InvalidQuery { .. }), "{iv}");
        }
    }
}
