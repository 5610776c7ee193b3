use anyhow::{Context as _, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use super::extract::extract_code;
use super::prompt::{user_prompt, SYSTEM_PROMPT};
use crate::app::ModelSettings;
use crate::constants::{HEALTH_CHECK_TIMEOUT_SECS, MAX_ERROR_MESSAGE_CHARS};
use crate::utils::{truncate_message, GeneratorError};

/// What went wrong with the previous candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairContext {
    pub previous_code: String,
    /// Violation list or runtime error message
    pub failure: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub question: String,
    pub season: i32,
    pub repair: Option<RepairContext>,
}

impl GenerationRequest {
    pub fn new(question: impl Into<String>, season: i32) -> Self {
        Self {
            question: question.into(),
            season,
            repair: None,
        }
    }

    pub fn with_repair(mut self, repair: RepairContext) -> Self {
        self.repair = Some(repair);
        self
    }
}

/// Source of candidate scripts
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    /// Produce candidate code text. Enforcement is not this trait's job.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GeneratorError>;

    /// Provider/model label for status output
    fn describe(&self) -> String;

    /// Whether the backend is reachable right now
    async fn check_connection(&self) -> bool;
}

/// Code generator backed by an OpenAI-compatible chat endpoint (a LiteLLM proxy by default)
pub struct LlmCodeGenerator {
    client: Client,
    proxy_url: String,
    model_id: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: usize,
}

impl LlmCodeGenerator {
    pub fn new(settings: &ModelSettings) -> Result<Self> {
        let api_key = settings
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.is_empty());

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to build model HTTP client")?;

        Ok(Self {
            client,
            proxy_url: settings.proxy_url.trim_end_matches('/').to_string(),
            model_id: settings.model_id(),
            api_key,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }

    async fn probe(&self, client: &Client, path: &str) -> bool {
        let url = format!("{}{}", self.proxy_url, path);
        match self.authorized(client.get(&url)).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Probe of {} failed: {}", url, e);
                false
            }
        }
    }
}

#[async_trait]
impl CodeGenerator for LlmCodeGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GeneratorError> {
        let body = json!({
            "model": self.model_id,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt(request)},
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "stream": false,
        });

        let url = format!("{}/v1/chat/completions", self.proxy_url);
        debug!(
            "Requesting code from {} (repair: {})",
            self.model_id,
            request.repair.is_some()
        );

        let response = self
            .authorized(self.client.post(&url).json(&body))
            .send()
            .await
            .map_err(|e| {
                GeneratorError::Unavailable(format!("cannot reach model proxy at {}: {}", self.proxy_url, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| GeneratorError::BadResponse(e.to_string()))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GeneratorError::BadResponse("reply has no message content".to_string()))?;

        let code = extract_code(&content);
        info!("Generated {} bytes of script with {}", code.len(), self.model_id);
        Ok(code)
    }

    fn describe(&self) -> String {
        format!("{} via {}", self.model_id, self.proxy_url)
    }

    async fn check_connection(&self) -> bool {
        let Ok(client) = Client::builder()
            .timeout(Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS))
            .build()
        else {
            return false;
        };

        self.probe(&client, "/health").await || self.probe(&client, "/v1/models").await
    }
}

// Response structures for the OpenAI-compatible chat endpoint

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

/// Map a non-success proxy status: only server-side trouble means the
/// backend is unavailable; a rejected request is a bad reply for this attempt.
fn status_error(status: StatusCode, body: &str) -> GeneratorError {
    let detail = format!(
        "model proxy returned {}: {}",
        status.as_u16(),
        truncate_message(body, MAX_ERROR_MESSAGE_CHARS)
    );
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        GeneratorError::Unavailable(detail)
    } else {
        GeneratorError::BadResponse(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(proxy_url: &str) -> ModelSettings {
        ModelSettings {
            proxy_url: proxy_url.to_string(),
            api_key_env: None,
            timeout_secs: 2,
            ..ModelSettings::default()
        }
    }

    #[test]
    fn test_describe_names_model_and_proxy() {
        let generator = LlmCodeGenerator::new(&settings("http://localhost:4000/")).unwrap();
        let label = generator.describe();
        assert!(label.contains(&ModelSettings::default().model_id()));
        assert!(label.ends_with("http://localhost:4000"));
    }

    #[tokio::test]
    async fn test_unreachable_proxy_is_unavailable() {
        let generator = LlmCodeGenerator::new(&settings("http://127.0.0.1:9")).unwrap();
        let err = generator
            .generate(&GenerationRequest::new("who leads in saves", 2024))
            .await
            .unwrap_err();
        assert!(matches!(err, GeneratorError::Unavailable(_)));
        assert!(!generator.check_connection().await);
    }

    #[test]
    fn test_completion_decoding_tolerates_null_content() {
        let reply: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#).unwrap();
        assert!(reply.choices[0].message.content.is_none());
    }

    #[test]
    fn test_only_server_side_statuses_mean_unavailable() {
        assert!(matches!(
            status_error(StatusCode::SERVICE_UNAVAILABLE, "down"),
            GeneratorError::Unavailable(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, ""),
            GeneratorError::Unavailable(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST, "max_tokens too large"),
            GeneratorError::BadResponse(_)
        ));
        assert!(matches!(
            status_error(StatusCode::UNPROCESSABLE_ENTITY, "bad schema"),
            GeneratorError::BadResponse(msg) if msg.contains("422")
        ));
    }
}
