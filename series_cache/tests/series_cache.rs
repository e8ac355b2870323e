mod common;

use std::{sync::Arc, time::Duration};

use common::{FakeSource, cache_with, candle, setup_sqlite};
use market_data_ingestor::models::{interval::Interval, range::TimeRange, series_key::SeriesKey};
use series_cache::{
    CacheError,
    store::{MemoryStore, SeriesStore},
};

const SEC: i64 = 1_000;

fn btc_1s() -> SeriesKey {
    SeriesKey::new("BTCUSDT", Interval::Sec1)
}

fn opens(points: &[market_data_ingestor::models::candle::CandlePoint]) -> Vec<i64> {
    points.iter().map(|p| p.open_time).collect()
}

#[tokio::test]
async fn empty_cache_backfills_and_writes_through() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(FakeSource::new(SEC, 0, 1_000_000));
    let cache = cache_with(store.clone(), source.clone());

    let got = cache
        .get_series(&btc_1s(), TimeRange::new(0, 2_999).unwrap())
        .await
        .unwrap();

    assert_eq!(opens(&got), vec![0, 1_000, 2_000]);
    assert_eq!(got[1], candle(1_000, SEC));
    assert_eq!(store.point_count(&btc_1s()).await, 3);
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn second_call_is_served_from_the_store() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(FakeSource::new(SEC, 0, 1_000_000));
    let cache = cache_with(store, source.clone());
    let range = TimeRange::new(0, 2_999).unwrap();

    let first = cache.get_series(&btc_1s(), range).await.unwrap();
    let second = cache.get_series(&btc_1s(), range).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(source.calls(), 1, "no upstream call once the range is cached");
}

#[tokio::test]
async fn only_the_hole_is_fetched() {
    let store = Arc::new(MemoryStore::new());
    let key = btc_1s();
    for t in [1_000, 2_000, 5_000, 6_000, 7_000] {
        store.upsert(&key, &candle(t, SEC)).await.unwrap();
    }
    let source = Arc::new(FakeSource::new(SEC, 0, 1_000_000));
    let cache = cache_with(store, source.clone());

    let got = cache
        .get_series(&key, TimeRange::new(1_000, 7_000).unwrap())
        .await
        .unwrap();

    assert_eq!(opens(&got), (1..=7).map(|i| i * SEC).collect::<Vec<_>>());
    let queries = source.queries();
    assert_eq!(queries.len(), 1);
    assert_eq!((queries[0].start_ms, queries[0].end_ms), (3_000, 4_000));
}

#[tokio::test]
async fn history_before_listing_is_absent_not_an_error() {
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(FakeSource::new(SEC, 5_000, 1_000_000));
    let cache = cache_with(store, source);

    let got = cache
        .get_series(&btc_1s(), TimeRange::new(0, 7_000).unwrap())
        .await
        .unwrap();

    assert_eq!(opens(&got), vec![5_000, 6_000, 7_000]);
}

#[tokio::test]
async fn failure_aborts_but_keeps_earlier_writes() {
    let store = Arc::new(MemoryStore::new());
    let key = btc_1s();
    store.upsert(&key, &candle(5_000, SEC)).await.unwrap();
    let mut source = FakeSource::new(SEC, 0, 1_000_000);
    source.fail_after = Some(1);
    let cache = cache_with(store.clone(), Arc::new(source));

    let err = cache
        .get_series(&key, TimeRange::new(0, 9_000).unwrap())
        .await
        .unwrap_err();

    assert!(err.is_upstream(), "got {err}");
    assert!(matches!(err, CacheError::Provider(ref e) if e.status() == Some(500)));
    // gap [0, 4000] landed before gap [6000, 9000] failed
    assert_eq!(store.point_count(&key).await, 6);
}

#[tokio::test]
async fn malformed_row_aborts_and_leaves_its_gap_unwritten() {
    let store = Arc::new(MemoryStore::new());
    let key = btc_1s();
    store.upsert(&key, &candle(5_000, SEC)).await.unwrap();
    let mut source = FakeSource::new(SEC, 0, 1_000_000);
    source.malformed_open = Some(7_000);
    let cache = cache_with(store.clone(), Arc::new(source));

    let err = cache
        .get_series(&key, TimeRange::new(0, 9_000).unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, CacheError::Malformed(_)), "got {err}");
    assert!(err.is_upstream());
    let stored = store
        .range_query(&key, TimeRange::new(0, 9_000).unwrap())
        .await
        .unwrap();
    // gap [0, 4000] was written; nothing of gap [6000, 9000] was
    assert_eq!(opens(&stored), vec![0, 1_000, 2_000, 3_000, 4_000, 5_000]);
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_backfill() {
    let store = Arc::new(MemoryStore::new());
    let mut source = FakeSource::new(SEC, 0, 1_000_000);
    source.latency = Duration::from_millis(50);
    let source = Arc::new(source);
    let cache = cache_with(store, source.clone());
    let key = btc_1s();
    let range = TimeRange::new(0, 9_999).unwrap();

    let (a, b) = tokio::join!(cache.get_series(&key, range), cache.get_series(&key, range));

    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn sqlite_backed_cache_round_trips() {
    let (_db, store) = setup_sqlite();
    let store = Arc::new(store);
    let source = Arc::new(FakeSource::new(SEC, 0, 1_000_000));
    let cache = cache_with(store.clone(), source.clone());
    let range = TimeRange::new(0, 4_000).unwrap();

    let first = cache.get_series(&btc_1s(), range).await.unwrap();
    let second = cache.get_series(&btc_1s(), range).await.unwrap();

    assert_eq!(opens(&first), vec![0, 1_000, 2_000, 3_000, 4_000]);
    assert_eq!(first, second);
    assert_eq!(source.calls(), 1);
}
