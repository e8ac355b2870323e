//! Paginated backfill of one contiguous range.
//!
//! Pages are strictly sequential: each cursor comes from the close time of the
//! previous page's last row. Per page:
//!
//! - 429 → exponential backoff, same query, up to [`FetchPolicy::max_retries`]
//!   retries, then [`ProviderError::RateLimitExhausted`].
//! - empty page → done, the upstream has no more history.
//! - last close `>= range.end` or a short page → done.
//! - a full page ending before the cursor → done, the upstream is not advancing.
//! - otherwise advance to `last_close + 1` and wait the politeness delay.
//!
//! Transport and HTTP errors are returned as-is and never retried here.

use std::time::Duration;

use snafu::ResultExt;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{
    models::{range::TimeRange, raw_kline::RawKline, series_key::SeriesKey},
    providers::{
        KlineSource, MalformedSnafu, PageOutcome, PageQuery, ProviderError,
        RateLimitExhaustedSnafu,
    },
};

/// Largest page the upstream serves.
pub const MAX_PAGE_LIMIT: u32 = 1000;

/// Knobs for [`fetch_range`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Rows requested per page.
    pub page_limit: u32,
    /// Pause between consecutive pages of one range.
    pub politeness_delay: Duration,
    /// Retries of a single page after a 429 before giving up.
    pub max_retries: u32,
    /// First backoff after a 429; doubles on every retry.
    pub initial_backoff: Duration,
    /// Upper bound for the doubled backoff.
    pub max_backoff: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            page_limit: MAX_PAGE_LIMIT,
            politeness_delay: Duration::from_millis(120),
            max_retries: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

/// Fetches every raw kline in `range` for `key`, page by page.
///
/// Returned rows are in ascending time order. Coverage stops early, without
/// error, when the upstream runs out of data.
pub async fn fetch_range<S>(
    source: &S,
    key: &SeriesKey,
    range: TimeRange,
    policy: &FetchPolicy,
) -> Result<Vec<RawKline>, ProviderError>
where
    S: KlineSource + ?Sized,
{
    let mut out: Vec<RawKline> = Vec::new();
    let mut cursor = range.start_ms();

    while cursor <= range.end_ms() {
        let query = PageQuery {
            symbol_pair: key.symbol_pair.clone(),
            interval: key.interval,
            start_ms: cursor,
            end_ms: range.end_ms(),
            limit: policy.page_limit,
        };

        let page = fetch_page_with_backoff(source, &query, policy).await?;
        let Some(last) = page.last() else {
            debug!(series = %key, cursor, "empty page, upstream history exhausted");
            break;
        };
        let last_close = last.close_time().context(MalformedSnafu)?;
        let page_len = page.len();
        debug!(series = %key, cursor, rows = page_len, last_close, "page fetched");
        out.extend(page);

        if last_close >= range.end_ms() || page_len < policy.page_limit as usize {
            break;
        }
        if last_close < cursor {
            warn!(
                series = %key,
                cursor,
                last_close,
                "page did not advance past the cursor, stopping"
            );
            break;
        }

        cursor = last_close.saturating_add(1);
        if !policy.politeness_delay.is_zero() {
            sleep(policy.politeness_delay).await;
        }
    }

    Ok(out)
}

async fn fetch_page_with_backoff<S>(
    source: &S,
    query: &PageQuery,
    policy: &FetchPolicy,
) -> Result<Vec<RawKline>, ProviderError>
where
    S: KlineSource + ?Sized,
{
    let mut backoff = policy.initial_backoff;

    for attempt in 0..=policy.max_retries {
        match source.fetch_page(query).await? {
            PageOutcome::Records(records) => return Ok(records),
            PageOutcome::RateLimited { retry_after } => {
                if attempt == policy.max_retries {
                    break;
                }
                let wait = retry_after.map_or(backoff, |hint| hint.max(backoff));
                warn!(
                    symbol = %query.symbol_pair,
                    start_ms = query.start_ms,
                    attempt,
                    backoff_ms = wait.as_millis() as u64,
                    "rate limited (429), backing off"
                );
                sleep(wait).await;
                backoff = (backoff * 2).min(policy.max_backoff);
            }
        }
    }

    RateLimitExhaustedSnafu {
        attempts: policy.max_retries + 1,
    }
    .fail()
}
