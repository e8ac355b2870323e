//! Provider abstraction for kline sources.
//!
//! This module defines the [`KlineSource`] trait, a page-level interface over a
//! market data vendor. A source answers exactly one bounded query at a time and
//! reports rate limiting as a [`PageOutcome`] instead of an error, so that the
//! retry and pagination policy lives in one place: [`pagination::fetch_range`].
//!
//! The trait is designed for async usage and supports dynamic dispatch
//! (`Arc<dyn KlineSource>`), which is how the cache orchestrator holds it.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use market_data_ingestor::providers::{KlineSource, PageOutcome, PageQuery, ProviderError};
//!
//! struct EmptySource;
//!
//! #[async_trait]
//! impl KlineSource for EmptySource {
//!     async fn fetch_page(&self, _query: &PageQuery) -> Result<PageOutcome, ProviderError> {
//!         Ok(PageOutcome::Records(vec![]))
//!     }
//! }
//! ```

pub mod binance_rest;
pub mod defillama;
pub mod pagination;
pub mod router;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use snafu::{Backtrace, Snafu};

use crate::{
    models::{interval::Interval, raw_kline::RawKline},
    normalize::MalformedRecordError,
};

/// One bounded page request: `[start_ms, end_ms]`, at most `limit` rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub symbol_pair: String,
    pub interval: Interval,
    pub start_ms: i64,
    pub end_ms: i64,
    pub limit: u32,
}

/// What a single page request produced.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    /// Rows in ascending open time. Empty means the upstream has nothing more.
    Records(Vec<RawKline>),
    /// HTTP 429. `retry_after` carries the server hint when one was sent.
    RateLimited { retry_after: Option<Duration> },
}

/// Page-level access to an upstream kline API.
#[async_trait]
pub trait KlineSource: Send + Sync {
    /// Issues one page request.
    ///
    /// # Returns
    ///
    /// * `Ok(PageOutcome::Records(..))` - The page, possibly empty.
    /// * `Ok(PageOutcome::RateLimited { .. })` - The upstream asked us to slow down.
    /// * `Err(ProviderError)` - Transport failure or a non-retryable HTTP status.
    async fn fetch_page(&self, query: &PageQuery) -> Result<PageOutcome, ProviderError>;
}

/// Errors that can occur during the creation of a provider instance
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// Base URL does not parse.
    #[snafu(display("Invalid upstream base URL: {url}"))]
    InvalidBaseUrl { url: String, backtrace: Backtrace },
}

/// Errors that can occur within a `KlineSource` implementation or while paginating.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// Network-level failure (connect, timeout, broken body).
    #[snafu(display("Upstream request failed: {source}"))]
    Transport {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// Any non-success status other than 429.
    #[snafu(display("Upstream returned HTTP {status}: {body}"))]
    UpstreamHttp {
        status: u16,
        body: String,
        backtrace: Backtrace,
    },

    /// Still rate limited after the retry budget was spent.
    #[snafu(display("Upstream still rate limited after {attempts} attempts"))]
    RateLimitExhausted { attempts: u32, backtrace: Backtrace },

    /// The payload parsed as JSON but a row is not a kline.
    #[snafu(display("Malformed upstream record: {source}"))]
    Malformed {
        source: MalformedRecordError,
        backtrace: Backtrace,
    },

    /// The payload is not the expected JSON shape.
    #[snafu(display("Could not decode upstream payload: {source}"))]
    Decode {
        source: serde_json::Error,
        backtrace: Backtrace,
    },

    /// The query was rejected before being sent.
    #[snafu(display("Invalid query for provider: {message}"))]
    InvalidQuery { message: String, backtrace: Backtrace },

    /// An error during provider configuration or initialization.
    #[snafu(display("Provider initialization error: {source}"))]
    Init {
        #[snafu(backtrace)]
        source: ProviderInitError,
    },
}

impl ProviderError {
    /// HTTP status when the upstream answered with one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::UpstreamHttp { status, .. } => Some(*status),
            ProviderError::RateLimitExhausted { .. } => Some(429),
            _ => None,
        }
    }
}

/// `Retry-After` in whole seconds, when the server sent a usable one.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
