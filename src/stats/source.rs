use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::app::StatsApiConfig;
use crate::constants::{MAX_ERROR_MESSAGE_CHARS, STATS_BACKOFF_MAX_MS};
use crate::utils::{truncate_message, UpstreamError};

/// Query parameters of a stats request; ordered so keys are canonical
pub type Params = BTreeMap<String, String>;

/// Build a parameter set from key/value pairs
pub fn params<K: ToString, V: ToString>(pairs: &[(K, V)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Read-only access to the statistics service
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch one endpoint (relative to the API base) as JSON
    async fn fetch(&self, endpoint: &str, params: &Params) -> Result<Value, UpstreamError>;
}

/// How transient failures are retried
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &StatsApiConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.backoff_ms),
            max_backoff: Duration::from_millis(STATS_BACKOFF_MAX_MS),
        }
    }
}

/// Run `op`, retrying transient failures with exponential backoff.
/// Status and decode errors are returned immediately.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T, UpstreamError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, UpstreamError>>,
{
    let mut retry_delay = policy.initial_backoff;
    let mut retries = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && retries < policy.max_retries => {
                retries += 1;
                warn!(
                    "{} failed ({}), retry {}/{} in {:?}",
                    label, e, retries, policy.max_retries, retry_delay
                );
                tokio::time::sleep(retry_delay).await;
                retry_delay = (retry_delay * 2).min(policy.max_backoff);
            }
            Err(e) => return Err(e),
        }
    }
}

/// HTTP client for the public MLB Stats API
pub struct StatsApiClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl StatsApiClient {
    pub fn new(config: &StatsApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::from_config(config),
        })
    }

    async fn fetch_once(&self, url: &str, params: &Params) -> Result<Value, UpstreamError> {
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                message: truncate_message(body.trim(), MAX_ERROR_MESSAGE_CHARS),
            });
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Transient(e.to_string())
            } else {
                UpstreamError::Decode(e.to_string())
            }
        })
    }
}

#[async_trait]
impl DataSource for StatsApiClient {
    async fn fetch(&self, endpoint: &str, params: &Params) -> Result<Value, UpstreamError> {
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        debug!("GET {} {:?}", url, params);
        with_retry(self.retry, endpoint, || self.fetch_once(&url, params)).await
    }
}

fn classify_transport_error(e: reqwest::Error) -> UpstreamError {
    if e.is_connect() || e.is_timeout() || e.is_request() {
        UpstreamError::Transient(e.to_string())
    } else {
        UpstreamError::Decode(e.to_string())
    }
}
