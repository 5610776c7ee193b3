use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use super::source::{DataSource, Params};
use crate::cache::ResponseCache;
use crate::utils::UpstreamError;

/// Data source decorator that consults the response cache first
pub struct CachedSource {
    inner: Arc<dyn DataSource>,
    cache: Arc<ResponseCache>,
}

impl CachedSource {
    pub fn new(inner: Arc<dyn DataSource>, cache: Arc<ResponseCache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl DataSource for CachedSource {
    async fn fetch(&self, endpoint: &str, params: &Params) -> Result<Value, UpstreamError> {
        if let Some(cached) = self.cache.get(endpoint, params) {
            return Ok(cached);
        }

        let payload = self.inner.fetch(endpoint, params).await?;
        if let Err(e) = self.cache.put(endpoint, params, &payload) {
            warn!("Could not cache response for {}: {}", endpoint, e);
        }
        Ok(payload)
    }
}
