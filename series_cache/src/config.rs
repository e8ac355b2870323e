//! Service configuration: TOML file, defaults and environment overrides.
//!
//! Every key is optional; a missing file section falls back to the defaults below.
//!
//! ```toml
//! [upstream]
//! base_url = "https://api.binance.com"
//! page_limit = 1000
//! politeness_delay_ms = 120
//! request_timeout_ms = 20000
//! requests_per_minute = 1200   # 0 disables client-side throttling
//! max_retries = 5
//! initial_backoff_ms = 500
//! max_backoff_ms = 8000
//!
//! [cache]
//! database_url = "kline_cache.db"
//! gap_delay_ms = 100
//!
//! [defillama]
//! base_url = "https://coins.llama.fi"
//!
//! [defillama.coins]   # pairs served from price charts instead of klines
//! CUSDUSD = "celo:0x765DE816845861e75A25fCA122bb6898B8B1282a"
//!
//! [pairs]
//! BTC = "BTCUSDT"
//! ETH = "ETHUSDT"
//! CUSD = "CUSDUSD"
//! ```
//!
//! After parsing, `KLINE_CACHE_DATABASE_URL`, `KLINE_CACHE_UPSTREAM_URL` and
//! `KLINE_CACHE_DEFILLAMA_URL` replace `cache.database_url`, `upstream.base_url`
//! and `defillama.base_url` when set. Symbol keys are trimmed and upper-cased.

use std::{num::NonZeroU32, path::Path, time::Duration};

use anyhow::{Context, bail};
use indexmap::IndexMap;
use market_data_ingestor::providers::{
    binance_rest::{self, BinanceConfig},
    defillama::DefiLlamaConfig,
    pagination::{FetchPolicy, MAX_PAGE_LIMIT},
};
use serde::{Deserialize, Serialize};
use shared_utils::env::env_override;

use crate::cache::CachePolicy;

/// Overrides `cache.database_url`.
pub const DATABASE_URL_ENV: &str = "KLINE_CACHE_DATABASE_URL";
/// Overrides `upstream.base_url`.
pub const UPSTREAM_URL_ENV: &str = "KLINE_CACHE_UPSTREAM_URL";
/// Overrides `defillama.base_url`.
pub const DEFILLAMA_URL_ENV: &str = "KLINE_CACHE_DEFILLAMA_URL";

/// Whole configuration file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Upstream API access.
    pub upstream: UpstreamCfg,
    /// Local store and orchestration.
    pub cache: CacheCfg,
    /// Price-chart upstream for pairs without klines.
    pub defillama: DefiLlamaCfg,
    /// User-facing symbol -> upstream trading pair.
    pub pairs: IndexMap<String, String>,
}

/// `[upstream]` section.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpstreamCfg {
    pub base_url: String,
    pub page_limit: u32,
    pub politeness_delay_ms: u64,
    pub request_timeout_ms: u64,
    pub requests_per_minute: u32,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheCfg {
    pub database_url: String,
    pub gap_delay_ms: u64,
}

/// `[defillama]` section.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefiLlamaCfg {
    pub base_url: String,
    /// Trading pair -> coin id. Pairs listed here bypass the kline upstream.
    pub coins: IndexMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upstream: UpstreamCfg::default(),
            cache: CacheCfg::default(),
            defillama: DefiLlamaCfg::default(),
            pairs: IndexMap::from([
                ("BTC".to_string(), "BTCUSDT".to_string()),
                ("ETH".to_string(), "ETHUSDT".to_string()),
                ("CUSD".to_string(), "CUSDUSD".to_string()),
            ]),
        }
    }
}

impl Default for DefiLlamaCfg {
    fn default() -> Self {
        let defaults = DefiLlamaConfig::default();
        Self {
            base_url: defaults.base_url,
            coins: defaults.coins.into_iter().collect(),
        }
    }
}

impl Default for UpstreamCfg {
    fn default() -> Self {
        let fetch = FetchPolicy::default();
        Self {
            base_url: binance_rest::DEFAULT_BASE_URL.to_string(),
            page_limit: fetch.page_limit,
            politeness_delay_ms: fetch.politeness_delay.as_millis() as u64,
            request_timeout_ms: 20_000,
            requests_per_minute: 1_200,
            max_retries: fetch.max_retries,
            initial_backoff_ms: fetch.initial_backoff.as_millis() as u64,
            max_backoff_ms: fetch.max_backoff.as_millis() as u64,
        }
    }
}

impl Default for CacheCfg {
    fn default() -> Self {
        Self {
            database_url: "kline_cache.db".to_string(),
            gap_delay_ms: 100,
        }
    }
}

impl Config {
    /// Upstream pair for a user-facing symbol, case-insensitive.
    pub fn pair_for(&self, symbol: &str) -> Option<&str> {
        self.pairs
            .get(&symbol.trim().to_uppercase())
            .map(String::as_str)
    }

    /// Settings for [`market_data_ingestor::providers::binance_rest::BinanceProvider`].
    pub fn binance_config(&self) -> BinanceConfig {
        BinanceConfig {
            base_url: self.upstream.base_url.clone(),
            request_timeout: Duration::from_millis(self.upstream.request_timeout_ms),
            requests_per_minute: NonZeroU32::new(self.upstream.requests_per_minute),
        }
    }

    /// Settings for [`market_data_ingestor::providers::defillama::DefiLlamaProvider`].
    ///
    /// Shares the request timeout of `[upstream]`; no client-side throttling.
    pub fn defillama_config(&self) -> DefiLlamaConfig {
        DefiLlamaConfig {
            base_url: self.defillama.base_url.clone(),
            request_timeout: Duration::from_millis(self.upstream.request_timeout_ms),
            requests_per_minute: None,
            coins: self
                .defillama
                .coins
                .iter()
                .map(|(pair, coin)| (pair.clone(), coin.clone()))
                .collect(),
        }
    }

    /// Orchestrator policy derived from both sections.
    pub fn cache_policy(&self) -> CachePolicy {
        let u = &self.upstream;
        CachePolicy {
            fetch: FetchPolicy {
                page_limit: u.page_limit,
                politeness_delay: Duration::from_millis(u.politeness_delay_ms),
                max_retries: u.max_retries,
                initial_backoff: Duration::from_millis(u.initial_backoff_ms),
                max_backoff: Duration::from_millis(u.max_backoff_ms),
            },
            gap_delay: Duration::from_millis(self.cache.gap_delay_ms),
        }
    }
}

/// Parse, normalize and apply environment overrides.
pub fn load_config_str(s: &str) -> anyhow::Result<Config> {
    let mut cfg: Config = toml::from_str(s).context("parsing config TOML")?;
    normalize_config(&mut cfg)?;
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Read a config file from disk, then behave like [`load_config_str`].
pub fn load_config_path(path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    load_config_str(&raw).with_context(|| format!("loading config {}", path.display()))
}

/// Trims and upper-cases symbol keys, trims pairs, and range-checks numeric knobs.
pub fn normalize_config(cfg: &mut Config) -> anyhow::Result<()> {
    let mut pairs = IndexMap::with_capacity(cfg.pairs.len());
    for (symbol, pair) in std::mem::take(&mut cfg.pairs) {
        let symbol = symbol.trim().to_uppercase();
        let pair = pair.trim().to_string();
        if symbol.is_empty() || pair.is_empty() {
            bail!("pair mapping entries cannot be empty");
        }
        if pairs.insert(symbol.clone(), pair).is_some() {
            bail!("duplicate symbol after normalization: {symbol}");
        }
    }
    cfg.pairs = pairs;

    let mut coins = IndexMap::with_capacity(cfg.defillama.coins.len());
    for (pair, coin) in std::mem::take(&mut cfg.defillama.coins) {
        let (pair, coin) = (pair.trim().to_uppercase(), coin.trim().to_string());
        if pair.is_empty() || coin.is_empty() {
            bail!("defillama.coins entries cannot be empty");
        }
        coins.insert(pair, coin);
    }
    cfg.defillama.coins = coins;

    let u = &cfg.upstream;
    if u.page_limit == 0 || u.page_limit > MAX_PAGE_LIMIT {
        bail!("upstream.page_limit must be within 1..={MAX_PAGE_LIMIT}, got {}", u.page_limit);
    }
    if u.initial_backoff_ms > u.max_backoff_ms {
        bail!("upstream.initial_backoff_ms cannot exceed upstream.max_backoff_ms");
    }
    if u.request_timeout_ms == 0 {
        bail!("upstream.request_timeout_ms must be positive");
    }
    Ok(())
}

fn apply_env_overrides(cfg: &mut Config) {
    if let Some(url) = env_override(DATABASE_URL_ENV) {
        cfg.cache.database_url = url;
    }
    if let Some(url) = env_override(UPSTREAM_URL_ENV) {
        cfg.upstream.base_url = url;
    }
    if let Some(url) = env_override(DEFILLAMA_URL_ENV) {
        cfg.defillama.base_url = url;
    }
}
