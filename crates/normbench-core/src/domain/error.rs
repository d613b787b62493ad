//! Error taxonomy for normbench.
//!
//! Configuration errors (`BenchError`) abort a run before any row is
//! processed. Stage errors (`PipelineError`, `MetricError`) are caught per
//! row and recorded as failure results.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors produced while compiling or rendering prompt templates.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template {name} failed to compile: {message}")]
    Syntax { name: String, message: String },

    #[error("template {name} failed to render: {message}")]
    Render { name: String, message: String },

    #[error("template {name} declares {variable} but it was not supplied")]
    MissingVariable { name: String, variable: String },
}

/// Configuration and fatal errors.
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("unknown embedding model: {0}")]
    UnknownModel(String),

    #[error("template {template} declares variable {variable}, which {kind} pipelines do not supply")]
    TemplateVariableMissing {
        template: String,
        variable: String,
        kind: String,
    },

    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("persist error: {0}")]
    Persist(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for normbench configuration-level operations.
pub type Result<T> = std::result::Result<T, BenchError>;

/// Stage of a row's unit of work that failed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Retrieval,
    Template,
    Generation,
    Metric,
    /// The row worker itself aborted.
    Internal,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Retrieval => "retrieval",
            FailureStage::Template => "template",
            FailureStage::Generation => "generation",
            FailureStage::Metric => "metric",
            FailureStage::Internal => "internal",
        }
    }
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pipeline could not turn an input into a prediction.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum PipelineError {
    #[error("generation failed for {input:?}: {cause}")]
    Generation { input: String, cause: String },

    #[error("retrieval failed for {input:?}: {cause}")]
    Retrieval { input: String, cause: String },

    #[error("prompt rendering failed for {input:?}: {cause}")]
    Template { input: String, cause: String },
}

impl PipelineError {
    pub fn stage(&self) -> FailureStage {
        match self {
            PipelineError::Generation { .. } => FailureStage::Generation,
            PipelineError::Retrieval { .. } => FailureStage::Retrieval,
            PipelineError::Template { .. } => FailureStage::Template,
        }
    }

    pub fn input(&self) -> &str {
        match self {
            PipelineError::Generation { input, .. }
            | PipelineError::Retrieval { input, .. }
            | PipelineError::Template { input, .. } => input,
        }
    }

    /// Retrieval did not finish within `timeout`.
    pub fn retrieval_timeout(input: &str, timeout: Duration) -> Self {
        PipelineError::Retrieval {
            input: input.to_string(),
            cause: format!("timed out after {} ms", timeout.as_millis()),
        }
    }

    /// Generation did not finish within `timeout`.
    pub fn generation_timeout(input: &str, timeout: Duration) -> Self {
        PipelineError::Generation {
            input: input.to_string(),
            cause: format!("timed out after {} ms", timeout.as_millis()),
        }
    }

    /// Template failures are deterministic and never worth another attempt.
    pub fn is_transient(&self) -> bool {
        !matches!(self, PipelineError::Template { .. })
    }
}

/// A metric could not compute a score.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum MetricError {
    #[error("metric {metric} terminology lookup failed: {cause}")]
    Lookup { metric: String, cause: String },
}
