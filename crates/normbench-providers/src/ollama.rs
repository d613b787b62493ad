//! Ollama embedding provider
//!
//! Calls `POST {base_url}/api/embed` and checks every returned vector
//! against the declared model width.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::ProviderError;
use crate::traits::EmbeddingModel;
use crate::Result;

const DEFAULT_EMBED_URL: &str = "http://localhost:11434";

/// Ollama embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub base_url: String,
    /// Model name as known to the Ollama server
    pub model: String,
    /// Expected embedding width
    pub dimensions: usize,
    pub timeout_secs: u64,
}

impl OllamaConfig {
    pub fn new(base_url: &str, model: &str, dimensions: usize) -> Self {
        OllamaConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dimensions,
            timeout_secs: 30,
        }
    }

    /// Reads NORMBENCH_EMBED_URL (default: http://localhost:11434).
    pub fn from_env(model: &str, dimensions: usize) -> Self {
        let base_url =
            std::env::var("NORMBENCH_EMBED_URL").unwrap_or_else(|_| DEFAULT_EMBED_URL.to_string());
        Self::new(&base_url, model, dimensions)
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embedding client for an Ollama server
pub struct OllamaEmbedder {
    config: OllamaConfig,
    http_client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("normbench/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(OllamaEmbedder {
            config,
            http_client,
        })
    }

    #[instrument(skip(self, texts), fields(model = %self.config.model, count = texts.len()))]
    async fn request_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.config.base_url);
        let request = EmbedRequest {
            model: &self.config.model,
            input: texts,
        };

        let response = self.http_client.post(&url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "embedding request failed");
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbedResponse = response.json().await?;
        if parsed.embeddings.len() != texts.len() {
            return Err(ProviderError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }

        for vector in &parsed.embeddings {
            if vector.len() != self.config.dimensions {
                return Err(ProviderError::DimensionMismatch {
                    model: self.config.model.clone(),
                    expected: self.config.dimensions,
                    actual: vector.len(),
                });
            }
        }

        debug!("received {} embeddings", parsed.embeddings.len());
        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl EmbeddingModel for OllamaEmbedder {
    fn model_id(&self) -> &str {
        &self.config.model
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.request_embeddings(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ProviderError::InvalidResponse("empty embedding response".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request_embeddings(texts).await
    }
}
