use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::source::{DataSource, Params};
use crate::utils::UpstreamError;

/// In-memory data source for tests: canned payloads per endpoint
#[derive(Default)]
pub struct FakeSource {
    routes: Vec<(String, Params, Value)>,
    calls: AtomicUsize,
    requests: Mutex<Vec<(String, Params)>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every request to `endpoint` with `payload`
    pub fn route(self, endpoint: &str, payload: Value) -> Self {
        self.route_with(endpoint, Params::new(), payload)
    }

    /// Answer requests to `endpoint` whose params include all of `required`
    pub fn route_with(mut self, endpoint: &str, required: Params, payload: Value) -> Self {
        self.routes.push((endpoint.to_string(), required, payload));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(String, Params)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl DataSource for FakeSource {
    async fn fetch(&self, endpoint: &str, params: &Params) -> Result<Value, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push((endpoint.to_string(), params.clone()));

        self.routes
            .iter()
            .find(|(route, required, _)| {
                route == endpoint && required.iter().all(|(k, v)| params.get(k) == Some(v))
            })
            .map(|(_, _, payload)| payload.clone())
            .ok_or_else(|| UpstreamError::Status {
                status: 404,
                message: format!("no fake route for {}", endpoint),
            })
    }
}
