//! Domain models for normbench.
//!
//! Canonical definitions for the core entities:
//! - `DatasetRow`: one (input, expected) example
//! - `EvaluationResult`: one score for a (pipeline, row, metric) triple
//! - `EvaluationRun`: a run and its accumulated results
//! - error taxonomy shared by pipelines, metrics and the harness

pub mod digest;
pub mod error;
pub mod row;
pub mod run;

pub use error::{BenchError, FailureStage, MetricError, PipelineError, Result, TemplateError};
pub use row::DatasetRow;
pub use run::{EvaluationResult, EvaluationRun, FailureRecord, RunStatus};
