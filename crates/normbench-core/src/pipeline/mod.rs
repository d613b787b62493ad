//! Pipelines: one input string in, one raw prediction out.
//!
//! Two kinds exist:
//! - `LlmPipeline`: render `{informal_name}` and generate
//! - `RagPipeline`: embed, search the vocabulary, render
//!   `{informal_name, vec_results}` and generate
//!
//! Each kind supplies a fixed variable set; templates are checked against it
//! once at construction.

pub mod cache;
pub mod llm;
pub mod rag;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::error::{BenchError, PipelineError, Result};
use crate::template::PromptTemplate;

pub use cache::EmbeddingCache;
pub use llm::{Generator, LlmPipeline};
pub use rag::{RagConfig, RagPipeline};

/// Pipeline variants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    Llm,
    Rag,
}

impl PipelineKind {
    /// Variables a pipeline of this kind puts in every template context.
    pub fn supplied_variables(&self) -> &'static [&'static str] {
        match self {
            PipelineKind::Llm => &["informal_name", "eot_token"],
            PipelineKind::Rag => &["informal_name", "eot_token", "vec_results"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineKind::Llm => "llm",
            PipelineKind::Rag => "rag",
        }
    }
}

/// Template context for `PipelineKind::Llm`.
#[derive(Debug, Clone, Serialize)]
pub struct LlmContext<'a> {
    pub informal_name: &'a str,
    pub eot_token: &'a str,
}

/// A ranked vocabulary term offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedCandidate {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Template context for `PipelineKind::Rag`.
#[derive(Debug, Clone, Serialize)]
pub struct RagContext<'a> {
    pub informal_name: &'a str,
    pub eot_token: &'a str,
    pub vec_results: Vec<RetrievedCandidate>,
}

/// Static description of a configured pipeline, recorded in artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDescription {
    pub kind: PipelineKind,
    pub generation_model: String,
    pub template: String,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_scores: Option<bool>,
}

/// A swappable unit of work mapping one input to one prediction.
#[async_trait]
pub trait Pipeline: Send + Sync {
    fn kind(&self) -> PipelineKind;

    fn describe(&self) -> PipelineDescription;

    /// Configuration check run by the harness before any row.
    fn validate(&self) -> Result<()>;

    /// Produce the raw, unmodified prediction for `input`.
    async fn run(&self, input: &str) -> std::result::Result<String, PipelineError>;

    /// `run` bounded by `timeout`. An elapsed bound is reported against the
    /// stage that was in progress; pipelines without a retrieval stage only
    /// ever time out in generation.
    async fn run_bounded(
        &self,
        input: &str,
        timeout: Duration,
    ) -> std::result::Result<String, PipelineError> {
        tokio::time::timeout(timeout, self.run(input))
            .await
            .unwrap_or_else(|_| Err(PipelineError::generation_timeout(input, timeout)))
    }
}

/// Fail when `template` declares a variable `kind` does not supply.
pub fn validate_template(template: &dyn PromptTemplate, kind: PipelineKind) -> Result<()> {
    let supplied = kind.supplied_variables();
    for variable in template.declared_variables() {
        if !supplied.contains(&variable.as_str()) {
            return Err(BenchError::TemplateVariableMissing {
                template: template.name().to_string(),
                variable: variable.clone(),
                kind: kind.as_str().to_string(),
            });
        }
    }
    Ok(())
}
