use market_data_ingestor::{
    models::{interval::IntervalError, range::RangeError},
    normalize::MalformedRecordError,
    providers::ProviderError,
};
use thiserror::Error;

use crate::store::StoreError;

/// Everything [`crate::cache::SeriesCache::get_series`] and request resolution can fail with.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The upstream could not serve a gap.
    #[error("upstream fetch failed: {0}")]
    Provider(#[from] ProviderError),

    /// A fetched record did not normalize.
    #[error("upstream record rejected: {0}")]
    Malformed(#[from] MalformedRecordError),

    /// The store failed to read or write.
    #[error("cache store failed: {0}")]
    Store(#[from] StoreError),

    /// Symbol has no configured upstream pair.
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    /// Interval label is not supported.
    #[error(transparent)]
    InvalidInterval(#[from] IntervalError),

    /// Range is empty or inverted.
    #[error("invalid range: {0}")]
    InvalidRange(String),
}

impl From<RangeError> for CacheError {
    fn from(err: RangeError) -> Self {
        CacheError::InvalidRange(err.to_string())
    }
}

impl CacheError {
    /// Failure caused by the upstream (transport, HTTP status, rate limit or bad payload).
    pub fn is_upstream(&self) -> bool {
        matches!(self, CacheError::Provider(_) | CacheError::Malformed(_))
    }

    /// Failure caused by the caller's request rather than by the system.
    pub fn is_invalid_request(&self) -> bool {
        matches!(
            self,
            CacheError::UnknownSymbol(_)
                | CacheError::InvalidInterval(_)
                | CacheError::InvalidRange(_)
        )
    }
}
