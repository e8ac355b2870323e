use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use market_data_ingestor::models::{candle::CandlePoint, range::TimeRange, series_key::SeriesKey};
use tokio::sync::RwLock;

use super::{SeriesStore, StoreError};

/// In-process store. Points are kept serialized, the same way the SQLite
/// backend keeps them, so both backends round-trip through identical JSON.
#[derive(Debug, Default)]
pub struct MemoryStore {
    series: RwLock<HashMap<String, BTreeMap<i64, String>>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points held for `key`.
    pub async fn point_count(&self, key: &SeriesKey) -> usize {
        self.series
            .read()
            .await
            .get(&key.storage_key())
            .map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl SeriesStore for MemoryStore {
    async fn range_query(
        &self,
        key: &SeriesKey,
        range: TimeRange,
    ) -> Result<Vec<CandlePoint>, StoreError> {
        let guard = self.series.read().await;
        let Some(points) = guard.get(&key.storage_key()) else {
            return Ok(Vec::new());
        };
        points
            .range(range.start_ms()..=range.end_ms())
            .map(|(_, payload)| serde_json::from_str(payload).map_err(StoreError::from))
            .collect()
    }

    async fn upsert(&self, key: &SeriesKey, point: &CandlePoint) -> Result<(), StoreError> {
        let payload = serde_json::to_string(point)?;
        self.series
            .write()
            .await
            .entry(key.storage_key())
            .or_default()
            .insert(point.open_time, payload);
        Ok(())
    }
}
