//! Persistence of normalized candles, keyed by series and open time.
//!
//! The orchestrator only needs two operations: an inclusive range read, sorted by
//! open time, and an idempotent upsert. Two backends ship with the crate:
//! [`memory::MemoryStore`] and [`sqlite::SqliteStore`].

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use market_data_ingestor::models::{candle::CandlePoint, range::TimeRange, series_key::SeriesKey};
use thiserror::Error;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Failures of a [`SeriesStore`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Could not open the database.
    #[error("database connection failed: {0}")]
    Connection(#[from] diesel::ConnectionError),

    /// A query or statement failed.
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// A stored payload could not be (de)serialized.
    #[error("candle payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The blocking worker running a database call panicked or was cancelled.
    #[error("store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Keyed, ordered storage of [`CandlePoint`]s.
#[async_trait]
pub trait SeriesStore: Send + Sync {
    /// Points of `key` with `range.start <= open_time <= range.end`, ascending.
    async fn range_query(
        &self,
        key: &SeriesKey,
        range: TimeRange,
    ) -> Result<Vec<CandlePoint>, StoreError>;

    /// Writes `point`, replacing any existing point with the same open time.
    async fn upsert(&self, key: &SeriesKey, point: &CandlePoint) -> Result<(), StoreError>;

    /// Writes every point in order. Stops at the first failure; earlier writes stay.
    async fn upsert_many(&self, key: &SeriesKey, points: &[CandlePoint]) -> Result<(), StoreError> {
        for point in points {
            self.upsert(key, point).await?;
        }
        Ok(())
    }
}
