use std::{collections::HashMap, num::NonZeroU32, sync::Arc, time::Duration};

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, StatusCode, Url};
use snafu::ResultExt;
use tracing::debug;

use crate::providers::{
    ClientBuildSnafu, DecodeSnafu, InvalidBaseUrlSnafu, InvalidQuerySnafu, KlineSource,
    MalformedSnafu, PageOutcome, PageQuery, ProviderError, ProviderInitError, TransportSnafu,
    UpstreamHttpSnafu,
    defillama::{params::ChartParams, response::ChartResponse},
    retry_after,
};

/// Public coin price host.
pub const DEFAULT_BASE_URL: &str = "https://coins.llama.fi";

/// Connection settings for [`DefiLlamaProvider`].
#[derive(Debug, Clone)]
pub struct DefiLlamaConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub requests_per_minute: Option<NonZeroU32>,
    /// Trading pair -> DeFiLlama coin id (`chain:address`).
    pub coins: HashMap<String, String>,
}

impl Default for DefiLlamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(20),
            requests_per_minute: None,
            coins: HashMap::from([(
                "CUSDUSD".to_string(),
                "celo:0x765DE816845861e75A25fCA122bb6898B8B1282a".to_string(),
            )]),
        }
    }
}

pub struct DefiLlamaProvider {
    client: Client,
    base_url: String,
    coins: HashMap<String, String>,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl DefiLlamaProvider {
    pub fn with_config(cfg: DefiLlamaConfig) -> Result<Self, ProviderInitError> {
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

        Ok(Self {
            client,
            base_url: base.to_string(),
            coins: cfg.coins,
            limiter: cfg
                .requests_per_minute
                .map(|rpm| Arc::new(RateLimiter::direct(Quota::per_minute(rpm)))),
        })
    }

    /// Trading pairs this provider can serve.
    pub fn pairs(&self) -> impl Iterator<Item = &str> {
        self.coins.keys().map(String::as_str)
    }
}

#[async_trait]
impl KlineSource for DefiLlamaProvider {
    async fn fetch_page(&self, query: &PageQuery) -> Result<PageOutcome, ProviderError> {
        let Some(coin) = self.coins.get(&query.symbol_pair) else {
            return InvalidQuerySnafu {
                message: format!("no DeFiLlama coin for pair {}", query.symbol_pair),
            }
            .fail();
        };
        let params = ChartParams::try_from(query)?;

        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let response = self
            .client
            .get(format!("{}/chart/{coin}", self.base_url))
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
        let chart: ChartResponse = serde_json::from_slice(&bytes).context(DecodeSnafu)?;
        let rows = chart
            .into_rows(coin, query.interval.step(), query.end_ms)
            .context(MalformedSnafu)?;
        debug!(
            pair = %query.symbol_pair,
            period = %params.period,
            span = params.span,
            rows = rows.len(),
            "chart page received"
        );
        Ok(PageOutcome::Records(rows))
    }
}
