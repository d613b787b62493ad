//! Evaluation harness.
//!
//! Runs every pipeline test over one dataset snapshot and collects one
//! result per (pipeline, row, metric):
//!
//! ```text
//! validate all tests            (configuration errors abort here)
//! snapshot rows + digest
//! for each test, in declaration order:
//!     rows on a bounded worker pool; each unit = run(input) + every metric
//!     results appended in row order
//! finish, summarize, persist once
//! ```
//!
//! A failing row never aborts the run: it becomes one sentinel record per
//! declared metric, carrying the failure stage and message.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::{debug, instrument, Instrument};

use crate::dataset::Dataset;
use crate::domain::digest::dataset_digest;
use crate::domain::error::{BenchError, FailureStage, Result};
use crate::domain::row::DatasetRow;
use crate::domain::run::{EvaluationResult, EvaluationRun, FailureRecord};
use crate::execution::{run_with_policy, RetryPolicy};
use crate::metrics::METRICS;
use crate::obs;
use crate::pipeline::Pipeline;
use crate::reporting::{write_run_json, PipelineArtifact, RunArtifact};
use crate::scoring::Metric;

/// A named pipeline with the metrics it is scored by.
#[derive(Clone)]
pub struct PipelineTest {
    pub name: String,
    pub pipeline: Arc<dyn Pipeline>,
    pub metrics: Vec<Arc<dyn Metric>>,
}

impl PipelineTest {
    pub fn new(name: &str, pipeline: Arc<dyn Pipeline>, metrics: Vec<Arc<dyn Metric>>) -> Self {
        Self {
            name: name.to_string(),
            pipeline,
            metrics,
        }
    }

    pub fn metric_names(&self) -> Vec<String> {
        self.metrics.iter().map(|m| m.name().to_string()).collect()
    }

    fn artifact(&self) -> PipelineArtifact {
        PipelineArtifact {
            name: self.name.clone(),
            description: self.pipeline.describe(),
            metrics: self.metric_names(),
        }
    }
}

/// Harness execution settings.
#[derive(Debug, Clone, PartialEq)]
pub struct HarnessConfig {
    /// Rows evaluated at once within one pipeline test (1 = sequential).
    pub max_concurrency: usize,
    /// Bound on one attempt of a row's pipeline run.
    pub row_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 1,
            row_timeout: Duration::from_secs(120),
            retry: RetryPolicy::default(),
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub artifact: RunArtifact,
    /// Where the artifact was written, when a destination was given.
    pub persisted_to: Option<PathBuf>,
}

impl RunOutcome {
    pub fn run(&self) -> &EvaluationRun {
        &self.artifact.run
    }
}

enum RowOutcome {
    Scored(Vec<EvaluationResult>),
    Failed {
        failure: FailureRecord,
        prediction: Option<String>,
    },
}

pub struct EvaluationFramework {
    name: String,
    description: String,
    dataset: Arc<dyn Dataset>,
    tests: Vec<PipelineTest>,
    config: HarnessConfig,
    results_path: Option<PathBuf>,
}

impl EvaluationFramework {
    pub fn new(
        name: &str,
        description: &str,
        dataset: Arc<dyn Dataset>,
        tests: Vec<PipelineTest>,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            dataset,
            tests,
            config: HarnessConfig::default(),
            results_path: None,
        }
    }

    pub fn with_config(mut self, config: HarnessConfig) -> Self {
        self.config = config;
        self
    }

    /// Persist the artifact to `path` when the run completes.
    pub fn with_results_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.results_path = Some(path.into());
        self
    }

    pub fn tests(&self) -> &[PipelineTest] {
        &self.tests
    }

    /// Check every pipeline test before any row is processed.
    pub fn validate(&self) -> Result<()> {
        if self.tests.is_empty() {
            return Err(BenchError::InvalidConfig("no pipeline tests".to_string()));
        }
        if self.config.max_concurrency == 0 {
            return Err(BenchError::InvalidConfig(
                "max_concurrency must be at least 1".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for test in &self.tests {
            if !names.insert(test.name.as_str()) {
                return Err(BenchError::InvalidConfig(format!(
                    "duplicate pipeline test name: {}",
                    test.name
                )));
            }
            if test.metrics.is_empty() {
                return Err(BenchError::InvalidConfig(format!(
                    "pipeline test {} declares no metrics",
                    test.name
                )));
            }
            let mut metrics = HashSet::new();
            for metric in &test.metrics {
                if !metrics.insert(metric.name()) {
                    return Err(BenchError::InvalidConfig(format!(
                        "pipeline test {} declares metric {} twice",
                        test.name,
                        metric.name()
                    )));
                }
            }
            test.pipeline.validate()?;
        }
        Ok(())
    }

    /// Execute the run. Only configuration, dataset and persistence errors
    /// are returned; row failures are recorded in the results.
    #[instrument(skip(self), fields(run_name = %self.name))]
    pub async fn run(self) -> Result<RunOutcome> {
        self.validate()?;

        let rows = Arc::new(self.dataset.rows()?);
        let digest = dataset_digest(&rows)?;

        let mut run = EvaluationRun::new(&self.name, &self.description, self.dataset.name());
        run.pipeline_tests = self.tests.iter().map(|t| t.name.clone()).collect();
        run.start(digest);

        let run_id = run.run_id.to_string();
        let span = obs::RunSpan::new(&run_id, &self.name);
        let started = Instant::now();
        let baseline = METRICS.snapshot();
        obs::emit_run_started(&run_id, &self.name, self.tests.len(), rows.len());

        for test in &self.tests {
            let results = self
                .run_test(&run_id, test, &rows)
                .instrument(span.span().clone())
                .await;
            run.append(results);
        }

        run.finish();
        obs::emit_run_finished(
            &run_id,
            started.elapsed().as_millis() as u64,
            run.results.len(),
            run.status.as_str(),
        );
        METRICS.flush_since(&baseline);

        let pipelines = self.tests.iter().map(PipelineTest::artifact).collect();
        let artifact = RunArtifact::new(run, pipelines);

        let persisted_to = match &self.results_path {
            Some(path) => {
                if let Err(e) = write_run_json(path, &artifact) {
                    obs::emit_run_persist_error(&run_id, &format!("{e:#}"));
                    return Err(BenchError::Persist(format!("{e:#}")));
                }
                obs::emit_run_persisted(&run_id, path);
                Some(path.clone())
            }
            None => None,
        };

        Ok(RunOutcome {
            artifact,
            persisted_to,
        })
    }

    /// Score every row with one pipeline test; results come back in row order.
    async fn run_test(
        &self,
        run_id: &str,
        test: &PipelineTest,
        rows: &Arc<Vec<DatasetRow>>,
    ) -> Vec<EvaluationResult> {
        let started = Instant::now();
        obs::emit_pipeline_started(
            run_id,
            &test.name,
            test.pipeline.kind().as_str(),
            test.metrics.len(),
        );

        // Semaphore enforces max_concurrency
        let sem = Arc::new(Semaphore::new(self.config.max_concurrency));
        let mut handles = Vec::with_capacity(rows.len());

        for index in 0..rows.len() {
            let sem = sem.clone();
            let rows = rows.clone();
            let test = test.clone();
            let config = self.config.clone();

            let task = tokio::spawn(
                async move {
                    let _permit = sem.acquire_owned().await.ok();
                    evaluate_row(&test, &rows[index], &config).await
                }
                .in_current_span(),
            );
            handles.push(task);
        }

        let metric_names = test.metric_names();
        let mut results = Vec::with_capacity(rows.len() * metric_names.len());
        let (mut succeeded, mut failed) = (0usize, 0usize);

        for (row, handle) in rows.iter().zip(handles) {
            let outcome = handle.await.unwrap_or_else(|join_err| RowOutcome::Failed {
                failure: FailureRecord {
                    stage: FailureStage::Internal,
                    message: join_err.to_string(),
                },
                prediction: None,
            });

            METRICS.inc_rows_evaluated();
            match outcome {
                RowOutcome::Scored(scored) => {
                    succeeded += 1;
                    results.extend(scored);
                }
                RowOutcome::Failed {
                    failure,
                    prediction,
                } => {
                    failed += 1;
                    METRICS.inc_rows_failed();
                    obs::emit_row_failed(
                        run_id,
                        &test.name,
                        &row.row_id,
                        failure.stage.as_str(),
                        &failure.message,
                    );
                    results.extend(metric_names.iter().map(|metric| {
                        EvaluationResult::failed(
                            &test.name,
                            &row.row_id,
                            metric,
                            prediction.as_deref(),
                            failure.clone(),
                        )
                    }));
                }
            }
        }

        obs::emit_pipeline_finished(
            run_id,
            &test.name,
            succeeded,
            failed,
            started.elapsed().as_millis() as u64,
        );
        results
    }
}

/// One unit of work: run the pipeline, then every metric in order.
async fn evaluate_row(test: &PipelineTest, row: &DatasetRow, config: &HarnessConfig) -> RowOutcome {
    let pipeline = test.pipeline.as_ref();
    let prediction = match run_with_policy(&config.retry, || {
        pipeline.run_bounded(&row.input, config.row_timeout)
    })
    .await
    {
        Ok(prediction) => prediction,
        Err(err) => {
            return RowOutcome::Failed {
                failure: FailureRecord {
                    stage: err.stage(),
                    message: err.to_string(),
                },
                prediction: None,
            }
        }
    };

    let mut scored = Vec::with_capacity(test.metrics.len());
    for metric in &test.metrics {
        match metric.score(&prediction, &row.expected).await {
            Ok(score) => scored.push(EvaluationResult::scored(
                &test.name,
                &row.row_id,
                metric.name(),
                score,
                &prediction,
            )),
            Err(err) => {
                return RowOutcome::Failed {
                    failure: FailureRecord {
                        stage: FailureStage::Metric,
                        message: err.to_string(),
                    },
                    prediction: Some(prediction),
                }
            }
        }
    }

    debug!(pipeline = %test.name, row_id = %row.row_id, "row scored");
    RowOutcome::Scored(scored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::VecDataset;
    use crate::pipeline::{Generator, LlmPipeline};
    use crate::scoring::{FuzzyMatchRatio, UncasedMatch};
    use crate::template::JinjaTemplate;
    use normbench_providers::fakes::ScriptedGenerator;

    fn test_with(name: &str, model: ScriptedGenerator) -> PipelineTest {
        let template = Arc::new(JinjaTemplate::new("plain", "{{ informal_name }}").unwrap());
        let pipeline = LlmPipeline::new(Generator::new(Arc::new(model), template)).unwrap();
        PipelineTest::new(
            name,
            Arc::new(pipeline),
            vec![Arc::new(UncasedMatch), Arc::new(FuzzyMatchRatio)],
        )
    }

    fn dataset() -> Arc<dyn Dataset> {
        Arc::new(VecDataset::from_pairs(
            "meds",
            [("Tylenol", "Acetaminophen"), ("Advil", "Ibuprofen")],
        ))
    }

    #[test]
    fn validation_rejects_duplicate_test_names() {
        let model = || ScriptedGenerator::new("stub").with_default("x");
        let framework = EvaluationFramework::new(
            "dup",
            "",
            dataset(),
            vec![test_with("a", model()), test_with("a", model())],
        );
        assert!(matches!(framework.validate(), Err(BenchError::InvalidConfig(_))));
    }

    #[test]
    fn validation_rejects_duplicate_metrics() {
        let mut test = test_with("a", ScriptedGenerator::new("stub"));
        test.metrics.push(Arc::new(UncasedMatch));
        let framework = EvaluationFramework::new("dup", "", dataset(), vec![test]);
        assert!(framework.validate().is_err());
    }

    #[test]
    fn validation_rejects_empty_configuration() {
        let framework = EvaluationFramework::new("empty", "", dataset(), vec![]);
        assert!(framework.validate().is_err());

        let mut test = test_with("a", ScriptedGenerator::new("stub"));
        test.metrics.clear();
        let framework = EvaluationFramework::new("empty", "", dataset(), vec![test]);
        assert!(framework.validate().is_err());
    }

    #[tokio::test]
    async fn metric_failure_keeps_prediction() {
        use normbench_state::fakes::MemoryVocabulary;
        use crate::scoring::RelatedNameUncasedMatch;

        let mut test = test_with("a", ScriptedGenerator::new("stub").with_default("Motrin"));
        test.metrics = vec![
            Arc::new(UncasedMatch),
            Arc::new(RelatedNameUncasedMatch::new(Arc::new(MemoryVocabulary::unavailable()))),
        ];

        let outcome = EvaluationFramework::new("m", "", dataset(), vec![test])
            .run()
            .await
            .unwrap();

        let results = &outcome.run().results;
        assert_eq!(results.len(), 4);
        for r in results {
            assert!(r.score.is_none());
            assert_eq!(r.raw_prediction.as_deref(), Some("Motrin"));
            assert_eq!(r.failure.as_ref().unwrap().stage, FailureStage::Metric);
        }
    }
}
