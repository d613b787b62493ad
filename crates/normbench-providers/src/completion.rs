//! HTTP client for llama.cpp-style completion servers
//!
//! Talks to `POST {base_url}/completion` with `{prompt, n_predict,
//! temperature, stop}` and reads the generated text from `content`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::ProviderError;
use crate::traits::{GenerationModel, GenerationParams};
use crate::Result;

const DEFAULT_LLM_URL: &str = "http://localhost:8080";

/// Completion server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Server base URL, without the `/completion` suffix
    pub base_url: String,
    /// Model label recorded in logs and artifacts
    pub model: String,
    /// Bearer token (optional for local servers)
    pub api_key: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl CompletionConfig {
    pub fn new(base_url: &str, model: &str) -> Self {
        CompletionConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
            timeout_secs: 120,
        }
    }

    /// Reads NORMBENCH_LLM_URL (default: http://localhost:8080) and
    /// NORMBENCH_LLM_API_KEY (optional).
    pub fn from_env(model: &str) -> Self {
        let base_url =
            std::env::var("NORMBENCH_LLM_URL").unwrap_or_else(|_| DEFAULT_LLM_URL.to_string());
        let mut config = Self::new(&base_url, model);
        config.api_key = std::env::var("NORMBENCH_LLM_API_KEY").ok();
        config
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    n_predict: u32,
    temperature: f32,
    stop: &'a [String],
}

#[derive(Deserialize)]
struct CompletionResponse {
    content: String,
}

/// Generation client for a completion server
pub struct CompletionClient {
    config: CompletionConfig,
    http_client: reqwest::Client,
}

impl CompletionClient {
    pub fn new(config: CompletionConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("normbench/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(CompletionClient {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }
}

#[async_trait]
impl GenerationModel for CompletionClient {
    fn model_id(&self) -> &str {
        &self.config.model
    }

    #[instrument(skip(self, prompt, params), fields(model = %self.config.model, max_tokens = params.max_tokens))]
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let url = format!("{}/completion", self.config.base_url);
        let request = CompletionRequest {
            prompt,
            n_predict: params.max_tokens,
            temperature: params.temperature,
            stop: &params.stop,
        };

        let mut builder = self.http_client.post(&url).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "completion request failed");
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CompletionResponse = response.json().await?;
        debug!(chars = parsed.content.len(), "completion received");
        Ok(parsed.content)
    }
}
