use serde::Serialize;

use crate::providers::{InvalidQuerySnafu, PageQuery, ProviderError, pagination::MAX_PAGE_LIMIT};

/// Query string of `GET /api/v3/klines`.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KlinesParams<'a> {
    pub symbol: &'a str,
    pub interval: &'static str,
    pub start_time: i64,
    pub end_time: i64,
    pub limit: u32,
}

impl<'a> From<&'a PageQuery> for KlinesParams<'a> {
    fn from(q: &'a PageQuery) -> Self {
        Self {
            symbol: &q.symbol_pair,
            interval: q.interval.as_str(),
            start_time: q.start_ms,
            end_time: q.end_ms,
            limit: q.limit,
        }
    }
}

/// Rejects queries the endpoint would refuse anyway.
pub fn validate_query(q: &PageQuery) -> Result<(), ProviderError> {
    if q.symbol_pair.trim().is_empty() {
        return InvalidQuerySnafu {
            message: "symbol must not be empty",
        }
        .fail();
    }
    if q.limit == 0 || q.limit > MAX_PAGE_LIMIT {
        return InvalidQuerySnafu {
            message: format!("limit must be within 1..={MAX_PAGE_LIMIT}, got {}", q.limit),
        }
        .fail();
    }
    if q.start_ms > q.end_ms {
        return InvalidQuerySnafu {
            message: format!("startTime {} is after endTime {}", q.start_ms, q.end_ms),
        }
        .fail();
    }
    Ok(())
}
