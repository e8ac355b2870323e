//! Diesel-backed SQLite store.
//!
//! One row per `(series_key, open_time)`; the candle itself is kept as a JSON
//! payload. Diesel is synchronous, so every call runs on the blocking pool while
//! holding the single shared connection.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use diesel::{prelude::*, upsert::excluded};
use market_data_ingestor::models::{candle::CandlePoint, range::TimeRange, series_key::SeriesKey};
use tokio::task::spawn_blocking;
use tracing::debug;

use super::{SeriesStore, StoreError};
use crate::{db::connection::connect_sqlite, schema::candle_points};

#[derive(Insertable)]
#[diesel(table_name = candle_points)]
struct NewCandleRow<'a> {
    series_key: &'a str,
    open_time: i64,
    payload: String,
}

/// [`SeriesStore`] over a migrated SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<SqliteConnection>>,
}

impl SqliteStore {
    /// Opens `database_url` with the crate's connection PRAGMAs.
    ///
    /// The schema must already exist; see [`crate::db::migrate::run_sqlite`].
    pub fn connect(database_url: &str) -> Result<Self, StoreError> {
        Ok(Self {
            conn: Arc::new(Mutex::new(connect_sqlite(database_url)?)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut *guard)
        })
        .await?
    }
}

fn rows_for<'a>(
    key: &'a str,
    points: &[CandlePoint],
) -> Result<Vec<NewCandleRow<'a>>, StoreError> {
    points
        .iter()
        .map(|p| {
            Ok(NewCandleRow {
                series_key: key,
                open_time: p.open_time,
                payload: serde_json::to_string(p)?,
            })
        })
        .collect()
}

fn write_rows(
    conn: &mut SqliteConnection,
    rows: &[NewCandleRow<'_>],
) -> Result<usize, StoreError> {
    let mut written = 0;
    for row in rows {
        written += diesel::insert_into(candle_points::table)
            .values(row)
            .on_conflict((candle_points::series_key, candle_points::open_time))
            .do_update()
            .set(candle_points::payload.eq(excluded(candle_points::payload)))
            .execute(conn)?;
    }
    Ok(written)
}

#[async_trait]
impl SeriesStore for SqliteStore {
    async fn range_query(
        &self,
        key: &SeriesKey,
        range: TimeRange,
    ) -> Result<Vec<CandlePoint>, StoreError> {
        let series = key.storage_key();
        let payloads: Vec<String> = self
            .with_conn(move |conn| {
                Ok(candle_points::table
                    .filter(candle_points::series_key.eq(series))
                    .filter(candle_points::open_time.between(range.start_ms(), range.end_ms()))
                    .order(candle_points::open_time.asc())
                    .select(candle_points::payload)
                    .load::<String>(conn)?)
            })
            .await?;

        payloads
            .iter()
            .map(|payload| serde_json::from_str(payload).map_err(StoreError::from))
            .collect()
    }

    async fn upsert(&self, key: &SeriesKey, point: &CandlePoint) -> Result<(), StoreError> {
        self.upsert_many(key, std::slice::from_ref(point)).await
    }

    /// Writes the batch in one transaction.
    async fn upsert_many(&self, key: &SeriesKey, points: &[CandlePoint]) -> Result<(), StoreError> {
        if points.is_empty() {
            return Ok(());
        }
        let series = key.storage_key();
        let points = points.to_vec();
        let written = self
            .with_conn(move |conn| {
                let rows = rows_for(&series, &points)?;
                conn.transaction(|conn| write_rows(conn, &rows))
            })
            .await?;
        debug!(series = %key, written, "candles upserted");
        Ok(())
    }
}
