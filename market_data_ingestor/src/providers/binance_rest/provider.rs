use std::{num::NonZeroU32, sync::Arc, time::Duration};

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::{Client, StatusCode, Url};
use snafu::ResultExt;
use tracing::debug;

use crate::{
    models::raw_kline::RawKline,
    providers::{
        ClientBuildSnafu, DecodeSnafu, InvalidBaseUrlSnafu, KlineSource, PageOutcome, PageQuery,
        ProviderError, ProviderInitError, TransportSnafu, UpstreamHttpSnafu,
        binance_rest::params::{KlinesParams, validate_query},
        retry_after,
    },
};

/// Public spot API host.
pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

const KLINES_PATH: &str = "/api/v3/klines";

/// Connection settings for [`BinanceProvider`].
#[derive(Debug, Clone)]
pub struct BinanceConfig {
    /// Scheme and host, e.g. `https://api.binance.com`.
    pub base_url: String,
    /// Per-request timeout applied by the HTTP client.
    pub request_timeout: Duration,
    /// Client-side request budget shared by every caller of this provider.
    /// `None` disables local throttling.
    pub requests_per_minute: Option<NonZeroU32>,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(20),
            requests_per_minute: Some(nonzero!(1200u32)),
        }
    }
}

pub struct BinanceProvider {
    client: Client,
    klines_url: String,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl BinanceProvider {
    /// Creates a provider against the public endpoint with default settings.
    pub fn new() -> Result<Self, ProviderInitError> {
        Self::with_config(BinanceConfig::default())
    }

    pub fn with_config(cfg: BinanceConfig) -> Result<Self, ProviderInitError> {
        let base = cfg.base_url.trim_end_matches('/');
        if Url::parse(base).is_err() {
            return InvalidBaseUrlSnafu {
                url: cfg.base_url.clone(),
            }
            .fail();
        }

        let client = Client::builder()
            .timeout(cfg.request_timeout)
            .user_agent(concat!("market_data_ingestor/", env!("CARGO_PKG_VERSION")))
            .build()
            .context(ClientBuildSnafu)?;

        let limiter = cfg
            .requests_per_minute
            .map(|rpm| Arc::new(RateLimiter::direct(Quota::per_minute(rpm))));

        Ok(Self {
            client,
            klines_url: format!("{base}{KLINES_PATH}"),
            limiter,
        })
    }
}

#[async_trait]
impl KlineSource for BinanceProvider {
    async fn fetch_page(&self, query: &PageQuery) -> Result<PageOutcome, ProviderError> {
        validate_query(query)?;

        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let params = KlinesParams::from(query);
        let response = self
            .client
            .get(&self.klines_url)
            .query(&params)
            .send()
            .await
            .context(TransportSnafu)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(PageOutcome::RateLimited {
                retry_after: retry_after(response.headers()),
            });
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown API error".to_string());
            return UpstreamHttpSnafu {
                status: status.as_u16(),
                body,
            }
            .fail();
        }

        let bytes = response.bytes().await.context(TransportSnafu)?;
        let records: Vec<RawKline> = serde_json::from_slice(&bytes).context(DecodeSnafu)?;
        debug!(
            symbol = %query.symbol_pair,
            interval = %query.interval,
            start_ms = query.start_ms,
            rows = records.len(),
            "klines page received"
        );
        Ok(PageOutcome::Records(records))
    }
}
