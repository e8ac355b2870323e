//! The read-through cache: serve what the store has, backfill what it lacks.
//!
//! One [`SeriesCache::get_series`] call:
//!
//! 1. range-reads the store for the requested window;
//! 2. computes the missing sub-ranges;
//! 3. with nothing missing, returns the read as-is;
//! 4. otherwise takes the series lock, re-reads, and for every remaining gap
//!    fetches all pages, normalizes them and writes them back;
//! 5. merges cached and fresh points by open time, fresh winning, and returns
//!    them sorted and clipped to the requested window.
//!
//! Any failure aborts the call. Points written before the failure stay in the
//! store and are picked up by the next call.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use market_data_ingestor::{
    models::{candle::CandlePoint, range::TimeRange, series_key::SeriesKey},
    normalize::normalize_all,
    providers::{
        KlineSource,
        pagination::{FetchPolicy, fetch_range},
    },
};
use tokio::time::sleep;
use tracing::{debug, info};

use crate::{
    errors::CacheError, gaps::compute_missing_ranges, inflight::InflightRegistry,
    store::SeriesStore,
};

/// Tuning for [`SeriesCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    /// Pagination and retry settings for each gap.
    pub fetch: FetchPolicy,
    /// Pause between two gap backfills of one call.
    pub gap_delay: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            fetch: FetchPolicy::default(),
            gap_delay: Duration::from_millis(100),
        }
    }
}

/// Read-through cache over a [`SeriesStore`] backed by a [`KlineSource`].
pub struct SeriesCache {
    store: Arc<dyn SeriesStore>,
    source: Arc<dyn KlineSource>,
    policy: CachePolicy,
    inflight: InflightRegistry,
}

impl SeriesCache {
    /// Wires a cache from its store, upstream and policy.
    pub fn new(
        store: Arc<dyn SeriesStore>,
        source: Arc<dyn KlineSource>,
        policy: CachePolicy,
    ) -> Self {
        Self {
            store,
            source,
            policy,
            inflight: InflightRegistry::new(),
        }
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn SeriesStore> {
        &self.store
    }

    /// All candles of `key` with open time in `requested`, ascending.
    ///
    /// Buckets the upstream has no data for (before listing, not yet closed) are
    /// simply absent from the result.
    pub async fn get_series(
        &self,
        key: &SeriesKey,
        requested: TimeRange,
    ) -> Result<Vec<CandlePoint>, CacheError> {
        let step = key.step();

        let cached = self.store.range_query(key, requested).await?;
        if missing(requested, key, &cached).is_empty() {
            debug!(series = %key, %requested, points = cached.len(), "cache hit");
            return Ok(cached);
        }

        let _guard = self.inflight.acquire(&key.storage_key()).await;

        // another caller may have filled the gaps while we waited
        let cached = self.store.range_query(key, requested).await?;
        let gaps = missing(requested, key, &cached);
        if gaps.is_empty() {
            debug!(series = %key, %requested, "gaps filled by a concurrent backfill");
            return Ok(cached);
        }

        let mut fresh = Vec::new();
        for (i, gap) in gaps.iter().enumerate() {
            if i > 0 && !self.policy.gap_delay.is_zero() {
                sleep(self.policy.gap_delay).await;
            }

            let raws = fetch_range(self.source.as_ref(), key, *gap, &self.policy.fetch).await?;
            let points = normalize_all(&raws, step)?;
            self.store.upsert_many(key, &points).await?;
            info!(
                series = %key,
                start_ms = gap.start_ms(),
                end_ms = gap.end_ms(),
                fetched = points.len(),
                "gap backfilled"
            );
            fresh.extend(points);
        }

        Ok(merge(cached, fresh, requested))
    }
}

fn missing(requested: TimeRange, key: &SeriesKey, cached: &[CandlePoint]) -> Vec<TimeRange> {
    let opens: Vec<i64> = cached.iter().map(|p| p.open_time).collect();
    compute_missing_ranges(requested, &key.step(), &opens)
}

fn merge(
    cached: Vec<CandlePoint>,
    fresh: Vec<CandlePoint>,
    requested: TimeRange,
) -> Vec<CandlePoint> {
    let mut by_open: BTreeMap<i64, CandlePoint> = BTreeMap::new();
    for point in cached.into_iter().chain(fresh) {
        by_open.insert(point.open_time, point);
    }
    by_open
        .into_values()
        .filter(|p| requested.contains(p.open_time))
        .collect()
}
