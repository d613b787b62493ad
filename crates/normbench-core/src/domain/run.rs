//! Evaluation runs and their result records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::FailureStage;

/// Lifecycle of an evaluation run. There is no whole-run failure state once
/// rows start.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Created,
    Running,
    Completed,
    CompletedWithFailures,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Created => "created",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::CompletedWithFailures => "completed_with_failures",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::CompletedWithFailures
        )
    }
}

/// Why a row produced no score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailureRecord {
    pub stage: FailureStage,
    pub message: String,
}

/// One record per (pipeline, row, metric).
///
/// A sentinel failure record has no `score` and carries `failure`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationResult {
    pub pipeline_name: String,
    pub row_id: String,
    pub metric_name: String,
    pub score: Option<f64>,
    /// Unmodified model output; absent when the pipeline itself failed.
    pub raw_prediction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureRecord>,
}

impl EvaluationResult {
    pub fn scored(
        pipeline_name: &str,
        row_id: &str,
        metric_name: &str,
        score: f64,
        prediction: &str,
    ) -> Self {
        Self {
            pipeline_name: pipeline_name.to_string(),
            row_id: row_id.to_string(),
            metric_name: metric_name.to_string(),
            score: Some(score),
            raw_prediction: Some(prediction.to_string()),
            failure: None,
        }
    }

    pub fn failed(
        pipeline_name: &str,
        row_id: &str,
        metric_name: &str,
        prediction: Option<&str>,
        failure: FailureRecord,
    ) -> Self {
        Self {
            pipeline_name: pipeline_name.to_string(),
            row_id: row_id.to_string(),
            metric_name: metric_name.to_string(),
            score: None,
            raw_prediction: prediction.map(str::to_string),
            failure: Some(failure),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

/// An evaluation run: identity, dataset reference and the accumulated results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationRun {
    pub run_id: Uuid,
    pub name: String,
    pub description: String,
    /// Dataset name as given by the loader
    pub dataset_ref: String,
    /// SHA-256 of the dataset snapshot the run scored
    pub dataset_digest: String,
    /// Pipeline test names in declaration order
    pub pipeline_tests: Vec<String>,
    pub results: Vec<EvaluationResult>,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl EvaluationRun {
    pub fn new(name: &str, description: &str, dataset_ref: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.to_string(),
            dataset_ref: dataset_ref.to_string(),
            dataset_digest: String::new(),
            pipeline_tests: Vec::new(),
            results: Vec::new(),
            status: RunStatus::Created,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn start(&mut self, dataset_digest: String) {
        self.dataset_digest = dataset_digest;
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn append(&mut self, results: impl IntoIterator<Item = EvaluationResult>) {
        self.results.extend(results);
    }

    /// Close the run; the terminal status depends on whether any row failed.
    pub fn finish(&mut self) {
        self.status = if self.results.iter().any(EvaluationResult::is_failure) {
            RunStatus::CompletedWithFailures
        } else {
            RunStatus::Completed
        };
        self.finished_at = Some(Utc::now());
    }
}
