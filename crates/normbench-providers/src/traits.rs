//! Capability traits consumed by the pipelines
//!
//! - `GenerationModel`: prompt in, raw text out
//! - `EmbeddingModel`: text in, fixed-width vector out

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Default output budget for a normalization answer
pub const DEFAULT_MAX_TOKENS: u32 = 128;

/// Decoding settings passed with every generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
    /// Stop sequences; generation ends before any of these
    #[serde(default)]
    pub stop: Vec<String>,
}

impl GenerationParams {
    /// Greedy decoding with the default token budget.
    pub fn deterministic() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: 0.0,
            stop: Vec::new(),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_stop(mut self, stop: impl Into<String>) -> Self {
        self.stop.push(stop.into());
        self
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::deterministic()
    }
}

/// A text-generation model.
///
/// Implementations must be deterministic when `params.temperature == 0`.
#[async_trait]
pub trait GenerationModel: Send + Sync {
    /// Identifier used in logs and artifacts
    fn model_id(&self) -> &str;

    /// Generate a completion for `prompt`; the text is returned unmodified.
    async fn generate(&self, prompt: &str, params: &GenerationParams)
        -> Result<String, ProviderError>;
}

/// A sentence-embedding model with a fixed output width.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Identifier used as part of the embedding cache key
    fn model_id(&self) -> &str;

    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Embed several texts, preserving order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}
