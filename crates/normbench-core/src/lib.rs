//! normbench core library
//!
//! Pipelines, metrics and the evaluation harness for benchmarking LLM-based
//! term normalisation, plus the run artifact and its reporting helpers.

pub mod dataset;
pub mod domain;
pub mod execution;
pub mod harness;
pub mod metrics;
pub mod obs;
pub mod pipeline;
pub mod registry;
pub mod reporting;
pub mod scoring;
pub mod telemetry;
pub mod template;

pub use dataset::{CsvDataset, Dataset, VecDataset};

pub use domain::{
    BenchError, DatasetRow, EvaluationResult, EvaluationRun, FailureRecord, FailureStage,
    MetricError, PipelineError, Result, RunStatus, TemplateError,
};

pub use execution::RetryPolicy;
pub use harness::{EvaluationFramework, HarnessConfig, PipelineTest, RunOutcome};

pub use pipeline::{
    EmbeddingCache, Generator, LlmPipeline, Pipeline, PipelineDescription, PipelineKind,
    RagConfig, RagPipeline, RetrievedCandidate,
};

pub use registry::EmbeddingModelDescriptor;

pub use reporting::{
    compare, read_run_json, render_comparison_md, render_summary_md, write_run_json,
    Comparison, PipelineArtifact, RunArtifact, RunSummary,
};

pub use scoring::{Metric, MetricKind};
pub use template::{JinjaTemplate, PromptTemplate};

pub use metrics::METRICS;

/// Crate version, recorded by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
