//! Per-pair dispatch between several [`KlineSource`]s.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;

use crate::providers::{KlineSource, PageOutcome, PageQuery, ProviderError};

/// Sends each page to the source registered for its trading pair, or to the
/// fallback when none is.
pub struct SourceRouter {
    fallback: Arc<dyn KlineSource>,
    routes: HashMap<String, Arc<dyn KlineSource>>,
}

impl SourceRouter {
    pub fn new(fallback: Arc<dyn KlineSource>) -> Self {
        Self {
            fallback,
            routes: HashMap::new(),
        }
    }

    /// Serves `pair` from `source`.
    pub fn route(mut self, pair: impl Into<String>, source: Arc<dyn KlineSource>) -> Self {
        self.routes.insert(pair.into(), source);
        self
    }

    fn source_for(&self, pair: &str) -> &Arc<dyn KlineSource> {
        self.routes.get(pair).unwrap_or(&self.fallback)
    }
}

#[async_trait]
impl KlineSource for SourceRouter {
    async fn fetch_page(&self, query: &PageQuery) -> Result<PageOutcome, ProviderError> {
        self.source_for(&query.symbol_pair).fetch_page(query).await
    }
}
