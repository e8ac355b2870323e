use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use market_data_ingestor::providers::{
    KlineSource, binance_rest::BinanceProvider, defillama::DefiLlamaProvider,
    router::SourceRouter,
};
use serde::Serialize;
use series_cache::{
    SeriesCache,
    config::{Config, load_config_path},
    db::migrate,
    request::{SeriesRequest, parse_timestamp_ms},
    store::{MemoryStore, SeriesStore, SqliteStore},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Kline backfill cache CLI")]
struct Cli {
    /// TOML config file; defaults apply when omitted.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<String>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Apply pending schema migrations to the configured database.
    Migrate,
    /// Serve a window from the cache, backfilling gaps, and print it as JSON.
    Fetch {
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        interval: String,
        /// Epoch milliseconds or RFC 3339.
        #[arg(long)]
        start: String,
        /// Epoch milliseconds or RFC 3339.
        #[arg(long)]
        end: String,
        /// Use a throwaway in-memory store instead of SQLite.
        #[arg(long)]
        memory: bool,
    },
}

#[derive(Serialize)]
struct SeriesResponse<'a> {
    symbol: &'a str,
    pair: &'a str,
    interval: &'a str,
    start_ms: i64,
    end_ms: i64,
    count: usize,
    points: &'a [market_data_ingestor::models::candle::CandlePoint],
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => load_config_path(path)?,
        None => series_cache::config::load_config_str("")?,
    };

    match cli.cmd {
        Cmd::Migrate => {
            let applied = migrate::run_sqlite(&cfg.cache.database_url)?;
            info!(applied = ?applied, "migrate done");
        }
        Cmd::Fetch {
            symbol,
            interval,
            start,
            end,
            memory,
        } => {
            let start_ms = parse_timestamp_ms(&start)?;
            let end_ms = parse_timestamp_ms(&end)?;
            let req = SeriesRequest::resolve(&cfg, &symbol, &interval, start_ms, end_ms)?;

            let cache = build_cache(&cfg, memory)?;
            let points = cache.get_series(&req.key, req.range).await?;

            let body = SeriesResponse {
                symbol: &req.symbol,
                pair: &req.key.symbol_pair,
                interval: req.key.interval.as_str(),
                start_ms: req.range.start_ms(),
                end_ms: req.range.end_ms(),
                count: points.len(),
                points: &points,
            };
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}

fn build_cache(cfg: &Config, memory: bool) -> Result<SeriesCache> {
    let store: Arc<dyn SeriesStore> = if memory {
        Arc::new(MemoryStore::new())
    } else {
        migrate::run_sqlite(&cfg.cache.database_url)?;
        Arc::new(
            SqliteStore::connect(&cfg.cache.database_url)
                .with_context(|| format!("opening {}", cfg.cache.database_url))?,
        )
    };
    let klines = Arc::new(BinanceProvider::with_config(cfg.binance_config())?);
    let charts = Arc::new(DefiLlamaProvider::with_config(cfg.defillama_config())?);
    let pairs: Vec<String> = charts.pairs().map(str::to_string).collect();
    let charts: Arc<dyn KlineSource> = charts;
    let router = pairs
        .into_iter()
        .fold(SourceRouter::new(klines), |router, pair| router.route(pair, charts.clone()));
    Ok(SeriesCache::new(store, Arc::new(router), cfg.cache_policy()))
}
