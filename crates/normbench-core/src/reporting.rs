use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use uuid::Uuid;

use crate::domain::run::EvaluationRun;
use crate::pipeline::PipelineDescription;

pub const SCHEMA_VERSION: &str = "1.0";

/// A pipeline test as it was configured for the run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineArtifact {
    pub name: String,
    pub description: PipelineDescription,
    /// Metric names in declaration order
    pub metrics: Vec<String>,
}

/// Mean score of one metric over a pipeline's successful rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricMean {
    pub metric_name: String,
    /// `None` when no row was scored
    pub mean: Option<f64>,
    pub scored: usize,
}

/// Row outcome counts and metric means for one pipeline test.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineSummary {
    pub pipeline_name: String,
    pub succeeded: usize,
    pub failed: usize,
    pub metric_means: Vec<MetricMean>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RunSummary {
    pub pipelines: Vec<PipelineSummary>,
}

impl RunSummary {
    pub fn pipeline(&self, name: &str) -> Option<&PipelineSummary> {
        self.pipelines.iter().find(|p| p.pipeline_name == name)
    }
}

/// Persisted result artifact, written once when a run completes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunArtifact {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub run: EvaluationRun,
    pub pipelines: Vec<PipelineArtifact>,
    pub summary: RunSummary,
}

impl RunArtifact {
    pub fn new(run: EvaluationRun, pipelines: Vec<PipelineArtifact>) -> Self {
        let summary = summarize(&run, &pipelines);
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            run,
            pipelines,
            summary,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run.run_id
    }

    /// Distinct row ids scored by `pipeline`, in result order.
    pub fn row_coverage(&self, pipeline: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.run
            .results
            .iter()
            .filter(|r| r.pipeline_name == pipeline)
            .filter(|r| seen.insert(r.row_id.as_str()))
            .map(|r| r.row_id.clone())
            .collect()
    }

    fn all_rows(&self) -> HashSet<&str> {
        self.run.results.iter().map(|r| r.row_id.as_str()).collect()
    }
}

/// Count succeeded/failed rows and average each metric per pipeline.
///
/// A row is failed when any of its records is a failure sentinel; means are
/// taken over scored records only.
pub fn summarize(run: &EvaluationRun, pipelines: &[PipelineArtifact]) -> RunSummary {
    let pipelines = pipelines
        .iter()
        .map(|pipeline| {
            let results: Vec<_> = run
                .results
                .iter()
                .filter(|r| r.pipeline_name == pipeline.name)
                .collect();

            let mut rows = Vec::new();
            let mut seen = HashSet::new();
            let mut failed_rows = HashSet::new();
            for r in &results {
                if seen.insert(r.row_id.as_str()) {
                    rows.push(r.row_id.as_str());
                }
                if r.is_failure() {
                    failed_rows.insert(r.row_id.as_str());
                }
            }

            let metric_means = pipeline
                .metrics
                .iter()
                .map(|metric| {
                    let scores: Vec<f64> = results
                        .iter()
                        .filter(|r| &r.metric_name == metric)
                        .filter_map(|r| r.score)
                        .collect();
                    let mean = if scores.is_empty() {
                        None
                    } else {
                        Some(scores.iter().sum::<f64>() / scores.len() as f64)
                    };
                    MetricMean {
                        metric_name: metric.clone(),
                        mean,
                        scored: scores.len(),
                    }
                })
                .collect();

            PipelineSummary {
                pipeline_name: pipeline.name.clone(),
                succeeded: rows.len() - failed_rows.len(),
                failed: failed_rows.len(),
                metric_means,
            }
        })
        .collect();

    RunSummary { pipelines }
}

/// Write the run artifact in pretty JSON format.
pub fn write_run_json(path: &Path, artifact: &RunArtifact) -> Result<()> {
    let content = serde_json::to_string_pretty(artifact).context("serialize run artifact")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("create {:?}", parent))?;
    }
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

pub fn read_run_json(path: &Path) -> Result<RunArtifact> {
    let content = std::fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("parse run artifact {:?}", path))
}

fn fmt_mean(mean: Option<f64>) -> String {
    mean.map(|m| format!("{:.4}", m)).unwrap_or_else(|| "-".to_string())
}

/// Render a markdown summary of a run.
pub fn render_summary_md(artifact: &RunArtifact) -> String {
    let run = &artifact.run;
    let mut out = String::new();
    out.push_str(&format!("# Run Summary: {}\n\n", run.name));
    if !run.description.is_empty() {
        out.push_str(&format!("{}\n\n", run.description));
    }
    out.push_str(&format!(
        "- run id: `{}`\n- dataset: `{}`\n- dataset digest: `{}`\n- status: {}\n\n",
        run.run_id,
        run.dataset_ref,
        run.dataset_digest,
        run.status.as_str()
    ));

    out.push_str("## Rows\n\n| pipeline | succeeded | failed |\n|---|---|---|\n");
    for p in &artifact.summary.pipelines {
        out.push_str(&format!("| {} | {} | {} |\n", p.pipeline_name, p.succeeded, p.failed));
    }

    out.push_str("\n## Metrics\n\n| pipeline | metric | mean | scored |\n|---|---|---|---|\n");
    for p in &artifact.summary.pipelines {
        for m in &p.metric_means {
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                p.pipeline_name,
                m.metric_name,
                fmt_mean(m.mean),
                m.scored
            ));
        }
    }
    out
}

/// Mean of one (pipeline, metric) in each of two runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricDelta {
    pub pipeline_name: String,
    pub metric_name: String,
    pub mean_a: Option<f64>,
    pub mean_b: Option<f64>,
}

impl MetricDelta {
    /// `b - a` when both sides were scored.
    pub fn delta(&self) -> Option<f64> {
        Some(self.mean_b? - self.mean_a?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comparison {
    pub run_a: Uuid,
    pub run_b: Uuid,
    pub name_a: String,
    pub name_b: String,
    pub dataset_digest: String,
    pub rows: usize,
    pub deltas: Vec<MetricDelta>,
}

fn means(artifact: &RunArtifact) -> Vec<((String, String), Option<f64>)> {
    artifact
        .summary
        .pipelines
        .iter()
        .flat_map(|p| {
            p.metric_means
                .iter()
                .map(move |m| ((p.pipeline_name.clone(), m.metric_name.clone()), m.mean))
        })
        .collect()
}

/// Compare metric means of two runs over the same dataset.
///
/// Refuses when the dataset digests or the scored row sets differ.
pub fn compare(a: &RunArtifact, b: &RunArtifact) -> Result<Comparison> {
    if a.run.dataset_digest != b.run.dataset_digest {
        bail!(
            "dataset digests differ: {} vs {}",
            a.run.dataset_digest,
            b.run.dataset_digest
        );
    }

    let rows_a = a.all_rows();
    let rows_b = b.all_rows();
    if rows_a != rows_b {
        let mut missing: Vec<&str> = rows_a.symmetric_difference(&rows_b).copied().collect();
        missing.sort_unstable();
        bail!("row coverage differs; rows not in both runs: {}", missing.join(", "));
    }

    let means_a = means(a);
    let means_b = means(b);

    let mut deltas: Vec<MetricDelta> = means_a
        .iter()
        .map(|(key, mean_a)| MetricDelta {
            pipeline_name: key.0.clone(),
            metric_name: key.1.clone(),
            mean_a: *mean_a,
            mean_b: means_b.iter().find(|(k, _)| k == key).and_then(|(_, m)| *m),
        })
        .collect();
    for (key, mean_b) in &means_b {
        if !means_a.iter().any(|(k, _)| k == key) {
            deltas.push(MetricDelta {
                pipeline_name: key.0.clone(),
                metric_name: key.1.clone(),
                mean_a: None,
                mean_b: *mean_b,
            });
        }
    }

    Ok(Comparison {
        run_a: a.run_id(),
        run_b: b.run_id(),
        name_a: a.run.name.clone(),
        name_b: b.run.name.clone(),
        dataset_digest: a.run.dataset_digest.clone(),
        rows: rows_a.len(),
        deltas,
    })
}

/// Render markdown for a run comparison.
pub fn render_comparison_md(cmp: &Comparison) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Comparison: {} vs {}\n\n", cmp.name_a, cmp.name_b));
    out.push_str(&format!(
        "- run A: `{}`\n- run B: `{}`\n- dataset digest: `{}`\n- rows: {}\n\n",
        cmp.run_a, cmp.run_b, cmp.dataset_digest, cmp.rows
    ));
    out.push_str("| pipeline | metric | A | B | delta |\n|---|---|---|---|---|\n");
    for d in &cmp.deltas {
        let delta = d
            .delta()
            .map(|v| format!("{:+.4}", v))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            d.pipeline_name,
            d.metric_name,
            fmt_mean(d.mean_a),
            fmt_mean(d.mean_b),
            delta
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::FailureStage;
    use crate::domain::run::{EvaluationResult, FailureRecord};
    use crate::pipeline::PipelineKind;
    use serde_json::json;

    fn description() -> PipelineDescription {
        PipelineDescription {
            kind: PipelineKind::Llm,
            generation_model: "stub".to_string(),
            template: "plain".to_string(),
            max_tokens: 128,
            temperature: 0.0,
            embedding_model: None,
            top_k: None,
            include_scores: None,
        }
    }

    fn pipelines() -> Vec<PipelineArtifact> {
        vec![PipelineArtifact {
            name: "llm".to_string(),
            description: description(),
            metrics: vec!["uncased_match".to_string(), "fuzzy_match_ratio".to_string()],
        }]
    }

    fn run(scores: [f64; 2]) -> EvaluationRun {
        let mut run = EvaluationRun::new("smoke", "two drugs", "meds.csv");
        run.start("d1".to_string());
        run.append([
            EvaluationResult::scored("llm", "1", "uncased_match", scores[0], "Acetaminophen"),
            EvaluationResult::scored("llm", "1", "fuzzy_match_ratio", 1.0, "Acetaminophen"),
            EvaluationResult::scored("llm", "2", "uncased_match", scores[1], "Motrin"),
            EvaluationResult::scored("llm", "2", "fuzzy_match_ratio", 0.5, "Motrin"),
        ]);
        run.finish();
        run
    }

    #[test]
    fn summary_counts_rows_and_means() {
        let mut r = run([1.0, 0.0]);
        r.append([
            EvaluationResult::failed(
                "llm",
                "3",
                "uncased_match",
                None,
                FailureRecord {
                    stage: FailureStage::Generation,
                    message: "503".to_string(),
                },
            ),
            EvaluationResult::failed(
                "llm",
                "3",
                "fuzzy_match_ratio",
                None,
                FailureRecord {
                    stage: FailureStage::Generation,
                    message: "503".to_string(),
                },
            ),
        ]);

        let summary = summarize(&r, &pipelines());
        let p = summary.pipeline("llm").unwrap();
        assert_eq!(p.succeeded, 2);
        assert_eq!(p.failed, 1);
        assert_eq!(p.metric_means[0].mean, Some(0.5));
        assert_eq!(p.metric_means[0].scored, 2);
        assert_eq!(p.metric_means[1].mean, Some(0.75));
    }

    #[test]
    fn artifact_schema_has_expected_keys() {
        let artifact = RunArtifact::new(run([1.0, 1.0]), pipelines());
        let raw = serde_json::to_value(&artifact).unwrap();
        let obj = raw.as_object().unwrap();
        for key in [
            "schema_version",
            "generated_at",
            "run_id",
            "name",
            "description",
            "dataset_digest",
            "status",
            "pipelines",
            "summary",
            "results",
        ] {
            assert!(obj.contains_key(key), "missing {key}");
        }
        assert_eq!(raw["results"][0]["metric_name"], json!("uncased_match"));
        assert_eq!(raw["status"], json!("completed"));
    }

    #[test]
    fn write_then_read_preserves_results() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/run.json");
        let artifact = RunArtifact::new(run([1.0, 0.0]), pipelines());

        write_run_json(&path, &artifact).unwrap();
        let back = read_run_json(&path).unwrap();
        assert_eq!(back.run.results, artifact.run.results);
        assert_eq!(back.summary, artifact.summary);
    }

    #[test]
    fn summary_markdown_lists_means() {
        let artifact = RunArtifact::new(run([1.0, 0.0]), pipelines());
        let md = render_summary_md(&artifact);
        assert!(md.starts_with("# Run Summary: smoke\n\ntwo drugs\n"));
        assert!(md.contains("| llm | 2 | 0 |\n"));
        assert!(md.contains("| llm | uncased_match | 0.5000 | 2 |\n"));
    }

    #[test]
    fn compare_reports_deltas() {
        let a = RunArtifact::new(run([1.0, 0.0]), pipelines());
        let b = RunArtifact::new(run([1.0, 1.0]), pipelines());

        let cmp = compare(&a, &b).unwrap();
        assert_eq!(cmp.rows, 2);
        assert_eq!(cmp.deltas[0].delta(), Some(0.5));
        assert_eq!(cmp.deltas[1].delta(), Some(0.0));
        assert!(render_comparison_md(&cmp).contains("| llm | uncased_match | 0.5000 | 1.0000 | +0.5000 |"));
    }

    #[test]
    fn compare_refuses_different_datasets() {
        let a = RunArtifact::new(run([1.0, 0.0]), pipelines());
        let mut other = run([1.0, 0.0]);
        other.dataset_digest = "d2".to_string();
        let b = RunArtifact::new(other, pipelines());

        let err = compare(&a, &b).unwrap_err();
        assert!(err.to_string().contains("digests differ"));
    }

    #[test]
    fn compare_refuses_different_row_coverage() {
        let a = RunArtifact::new(run([1.0, 0.0]), pipelines());
        let mut partial = run([1.0, 0.0]);
        partial.results.retain(|r| r.row_id == "1");
        let b = RunArtifact::new(partial, pipelines());

        let err = compare(&a, &b).unwrap_err();
        assert!(err.to_string().contains("row coverage differs"));
    }
}
