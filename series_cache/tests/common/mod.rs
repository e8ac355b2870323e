#![allow(dead_code)]

use std::{
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use market_data_ingestor::{
    models::{candle::CandlePoint, raw_kline::RawKline},
    providers::{KlineSource, PageOutcome, PageQuery, ProviderError, UpstreamHttpSnafu},
};
use series_cache::{
    CachePolicy, SeriesCache,
    db::migrate,
    store::{SeriesStore, SqliteStore},
};
use tempfile::TempDir;

/// Deterministic candle for the bucket opening at `open_time`.
pub fn candle(open_time: i64, step_ms: i64) -> CandlePoint {
    let base = (open_time / step_ms) as f64;
    CandlePoint {
        open_time,
        close_time: open_time + step_ms - 1,
        open: 100.0 + base,
        high: 101.0 + base,
        low: 99.0 + base,
        close: 100.5 + base,
        volume: 10.0,
        quote_volume: 1_000.0,
        trades: 7,
        taker_buy_base: 4.0,
        taker_buy_quote: 400.0,
    }
}

/// Fake upstream serving one candle per fixed-width bucket inside `[first_open, last_open]`.
pub struct FakeSource {
    pub step_ms: i64,
    pub first_open: i64,
    pub last_open: i64,
    /// Successful calls allowed before every call answers HTTP 500.
    pub fail_after: Option<usize>,
    /// Simulated latency of each page.
    pub latency: Duration,
    /// Bucket whose row is served with a non-numeric high price.
    pub malformed_open: Option<i64>,
    calls: AtomicUsize,
    queries: Mutex<Vec<PageQuery>>,
}

impl FakeSource {
    pub fn new(step_ms: i64, first_open: i64, last_open: i64) -> Self {
        Self {
            step_ms,
            first_open,
            last_open,
            fail_after: None,
            latency: Duration::ZERO,
            malformed_open: None,
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<PageQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl KlineSource for FakeSource {
    async fn fetch_page(&self, query: &PageQuery) -> Result<PageOutcome, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.clone());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.fail_after.is_some_and(|limit| n >= limit) {
            return UpstreamHttpSnafu {
                status: 500u16,
                body: "internal error",
            }
            .fail();
        }

        let first = query.start_ms.max(self.first_open);
        let first = first + (self.step_ms - first.rem_euclid(self.step_ms)) % self.step_ms;
        let last = query.end_ms.min(self.last_open);

        let rows = (first..=last)
            .step_by(self.step_ms as usize)
            .take(query.limit as usize)
            .map(|open| {
                let mut row = RawKline::from(&candle(open, self.step_ms));
                if self.malformed_open == Some(open) {
                    row.0[2] = serde_json::Value::from("n/a");
                }
                row
            })
            .collect();
        Ok(PageOutcome::Records(rows))
    }
}

/// Policy without real-time waits.
pub fn quick_policy() -> CachePolicy {
    let mut policy = CachePolicy::default();
    policy.fetch.politeness_delay = Duration::ZERO;
    policy.gap_delay = Duration::ZERO;
    policy
}

pub fn cache_with(store: Arc<dyn SeriesStore>, source: Arc<FakeSource>) -> SeriesCache {
    SeriesCache::new(store, source, quick_policy())
}

pub struct TestDb {
    _dir: TempDir, // keep alive for the life of the test
    pub path: String,
}

/// Fresh migrated SQLite file and a store over it.
pub fn setup_sqlite() -> (TestDb, SqliteStore) {
    let dir = TempDir::new().expect("tempdir");
    let mut p = PathBuf::from(dir.path());
    p.push("test.db");
    let path = p.to_string_lossy().to_string();

    migrate::run_sqlite(&path).expect("migrations");
    let store = SqliteStore::connect(&path).expect("connect");
    (TestDb { _dir: dir, path }, store)
}
