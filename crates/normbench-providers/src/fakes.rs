//! Deterministic in-memory providers (testing only)
//!
//! - `ScriptedGenerator`: answers by matching substrings of the prompt
//! - `EchoGenerator`: returns the rendered prompt
//! - `HashEmbedder`: token-hash bag-of-words vectors
//! - `FailingEmbedder`: always unavailable

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::traits::{EmbeddingModel, GenerationModel, GenerationParams};
use crate::Result;

#[derive(Debug, Clone)]
enum Outcome {
    Respond(String),
    Fail(String),
}

// ---------------------------------------------------------------------------
// ScriptedGenerator
// ---------------------------------------------------------------------------

/// Generator driven by `(needle, outcome)` rules.
///
/// The first rule whose needle occurs in the prompt wins; prompts matching no
/// rule get the default response.
#[derive(Debug)]
pub struct ScriptedGenerator {
    model_id: String,
    rules: Vec<(String, Outcome)>,
    delays: Vec<(String, Duration)>,
    default_response: String,
    prompts: Mutex<Vec<String>>,
    params: Mutex<Vec<GenerationParams>>,
}

impl ScriptedGenerator {
    pub fn new(model_id: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            rules: Vec::new(),
            delays: Vec::new(),
            default_response: String::new(),
            prompts: Mutex::new(Vec::new()),
            params: Mutex::new(Vec::new()),
        }
    }

    pub fn respond_when(mut self, needle: &str, response: &str) -> Self {
        self.rules
            .push((needle.to_string(), Outcome::Respond(response.to_string())));
        self
    }

    pub fn fail_when(mut self, needle: &str, message: &str) -> Self {
        self.rules
            .push((needle.to_string(), Outcome::Fail(message.to_string())));
        self
    }

    /// Sleep before answering prompts containing `needle`.
    pub fn delay_when(mut self, needle: &str, delay: Duration) -> Self {
        self.delays.push((needle.to_string(), delay));
        self
    }

    pub fn with_default(mut self, response: &str) -> Self {
        self.default_response = response.to_string();
        self
    }

    /// Every prompt received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Every parameter set received, in call order.
    pub fn params(&self) -> Vec<GenerationParams> {
        self.params
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[async_trait]
impl GenerationModel for ScriptedGenerator {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(prompt.to_string());
        self.params
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(params.clone());

        if let Some((_, delay)) = self.delays.iter().find(|(n, _)| prompt.contains(n.as_str())) {
            tokio::time::sleep(*delay).await;
        }

        match self
            .rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
        {
            Some((_, Outcome::Respond(text))) => Ok(text.clone()),
            Some((_, Outcome::Fail(message))) => Err(ProviderError::Unavailable(message.clone())),
            None => Ok(self.default_response.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// EchoGenerator
// ---------------------------------------------------------------------------

/// Returns the prompt it was given, so tests can inspect rendering.
#[derive(Debug, Default)]
pub struct EchoGenerator;

#[async_trait]
impl GenerationModel for EchoGenerator {
    fn model_id(&self) -> &str {
        "echo"
    }

    async fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<String> {
        Ok(prompt.to_string())
    }
}

// ---------------------------------------------------------------------------
// HashEmbedder
// ---------------------------------------------------------------------------

/// Bag-of-words embedder: each lowercase alphanumeric token is FNV-hashed
/// into a bucket, then the vector is L2-normalised.
#[derive(Debug)]
pub struct HashEmbedder {
    model_id: String,
    dimensions: usize,
    calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self {
            model_id: format!("hash-{dimensions}"),
            dimensions,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_model_id(mut self, model_id: &str) -> Self {
        self.model_id = model_id.to_string();
        self
    }

    /// Number of `embed` calls served.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    /// Synchronous variant used to build fixtures.
    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimensions];

        for token in text
            .to_ascii_lowercase()
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut h: u64 = 1469598103934665603;
            for b in token.as_bytes() {
                h ^= *b as u64;
                h = h.wrapping_mul(1099511628211);
            }
            v[(h as usize) % self.dimensions] += 1.0;
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

#[async_trait]
impl EmbeddingModel for HashEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.vector(text))
    }
}

// ---------------------------------------------------------------------------
// FailingEmbedder
// ---------------------------------------------------------------------------

/// Embedder that always fails.
#[derive(Debug)]
pub struct FailingEmbedder {
    dimensions: usize,
}

impl FailingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait]
impl EmbeddingModel for FailingEmbedder {
    fn model_id(&self) -> &str {
        "failing"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(ProviderError::Unavailable("embedding backend offline".into()))
    }
}
