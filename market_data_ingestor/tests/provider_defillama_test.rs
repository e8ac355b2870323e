use std::{collections::HashMap, sync::Arc, time::Duration};

use httpmock::prelude::*;
use market_data_ingestor::{
    models::{interval::Interval, range::TimeRange, series_key::SeriesKey},
    normalize::normalize_all,
    providers::{
        KlineSource, PageOutcome, PageQuery, ProviderError,
        defillama::{DefiLlamaConfig, DefiLlamaProvider},
        pagination::{FetchPolicy, fetch_range},
        router::SourceRouter,
    },
};
use serde_json::json;

const COIN: &str = "celo:0x765DE816845861e75A25fCA122bb6898B8B1282a";
const HOUR: i64 = 3_600_000;

fn provider_for(server: &MockServer) -> DefiLlamaProvider {
    DefiLlamaProvider::with_config(DefiLlamaConfig {
        base_url: server.base_url(),
        request_timeout: Duration::from_secs(5),
        requests_per_minute: None,
        coins: HashMap::from([("CUSDUSD".to_string(), COIN.to_string())]),
    })
    .expect("provider")
}

fn query(interval: Interval, start_ms: i64, end_ms: i64) -> PageQuery {
    PageQuery {
        symbol_pair: "CUSDUSD".into(),
        interval,
        start_ms,
        end_ms,
        limit: 1000,
    }
}

fn chart(samples: &[(i64, f64)]) -> serde_json::Value {
    let prices: Vec<_> = samples
        .iter()
        .map(|(ts, price)| json!({ "timestamp": ts, "price": price }))
        .collect();
    let mut coins = serde_json::Map::new();
    coins.insert(COIN.to_string(), json!({ "symbol": "cUSD", "prices": prices }));
    json!({ "coins": coins })
}

#[tokio::test]
async fn chart_samples_become_hourly_candles() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("/chart/{COIN}"))
                .query_param("start", "0")
                .query_param("period", "1h")
                .query_param("span", "3");
            then.status(200)
                .json_body(chart(&[(0, 1.0), (3_600, 0.998), (7_200, 1.003)]));
        })
        .await;

    let outcome = provider_for(&server)
        .fetch_page(&query(Interval::Hour1, 0, 2 * HOUR))
        .await
        .expect("page");

    mock.assert_async().await;
    let PageOutcome::Records(rows) = outcome else {
        panic!("expected records, got {outcome:?}");
    };
    let candles = normalize_all(&rows, Interval::Hour1.step()).unwrap();
    let got: Vec<(i64, i64, f64)> =
        candles.iter().map(|c| (c.open_time, c.close_time, c.close)).collect();
    assert_eq!(
        got,
        vec![
            (0, HOUR - 1, 1.0),
            (HOUR, 2 * HOUR - 1, 0.998),
            (2 * HOUR, 3 * HOUR - 1, 1.003)
        ]
    );
}

#[tokio::test]
async fn unknown_coin_in_body_is_an_empty_page() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/chart/{COIN}"));
            then.status(200).json_body(json!({ "coins": {} }));
        })
        .await;

    let outcome = provider_for(&server)
        .fetch_page(&query(Interval::Hour1, 0, HOUR))
        .await
        .unwrap();

    assert_eq!(outcome, PageOutcome::Records(vec![]));
}

#[tokio::test]
async fn rate_limit_and_errors_map_like_kline_sources() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/chart/{COIN}")).query_param("period", "1h");
            then.status(429).header("Retry-After", "1");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/chart/{COIN}")).query_param("period", "1d");
            then.status(502).body("bad gateway");
        })
        .await;
    let provider = provider_for(&server);

    let limited = provider
        .fetch_page(&query(Interval::Hour1, 0, HOUR))
        .await
        .unwrap();
    assert_eq!(
        limited,
        PageOutcome::RateLimited {
            retry_after: Some(Duration::from_secs(1))
        }
    );

    let err = provider
        .fetch_page(&query(Interval::Day1, 0, HOUR))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(502));
}

#[tokio::test]
async fn unsupported_pair_or_interval_never_hits_the_network() {
    let server = MockServer::start_async().await;
    let any = server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(200).json_body(chart(&[]));
        })
        .await;
    let provider = provider_for(&server);

    let mut other_pair = query(Interval::Hour1, 0, HOUR);
    other_pair.symbol_pair = "BTCUSDT".into();
    let err = provider.fetch_page(&other_pair).await.unwrap_err();
    assert!(matches!(err, ProviderError::InvalidQuery { .. }));

    let err = provider
        .fetch_page(&query(Interval::Month1, 0, HOUR))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::InvalidQuery { .. }));

    any.assert_hits_async(0).await;
}

#[tokio::test]
async fn router_sends_the_chart_pair_to_defillama() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/chart/{COIN}"));
            then.status(200).json_body(chart(&[(0, 1.0), (3_600, 1.0)]));
        })
        .await;
    let chart_source: Arc<dyn KlineSource> = Arc::new(provider_for(&server));
    // fallback points at a closed port; reaching it would be a transport error
    let fallback = Arc::new(
        market_data_ingestor::providers::binance_rest::BinanceProvider::with_config(
            market_data_ingestor::providers::binance_rest::BinanceConfig {
                base_url: "http://127.0.0.1:9".into(),
                request_timeout: Duration::from_secs(1),
                requests_per_minute: None,
            },
        )
        .unwrap(),
    );
    let router = SourceRouter::new(fallback).route("CUSDUSD", chart_source);

    let key = SeriesKey::new("CUSDUSD", Interval::Hour1);
    let policy = FetchPolicy {
        politeness_delay: Duration::ZERO,
        ..FetchPolicy::default()
    };
    let rows = fetch_range(&router, &key, TimeRange::new(0, HOUR).unwrap(), &policy)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(rows.len(), 2);
}
