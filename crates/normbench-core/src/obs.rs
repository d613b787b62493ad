//! Structured observability hooks for benchmark run lifecycle events.
//!
//! This module provides:
//! - Run-scoped tracing spans via `RunSpan`
//! - Emission functions for run, pipeline and row lifecycle events
//!
//! Events are emitted at `info!` level, except row failures which are `warn!`.

use tracing::{info, warn};

/// Run-scoped tracing span.
///
/// `enter` returns an RAII guard for synchronous sections; async work is
/// wrapped with `tracing::Instrument` over `span()` so the future stays `Send`.
///
/// ```ignore
/// let span = RunSpan::new("8c1f...", "rxnorm-baseline");
/// execute().instrument(span.span().clone()).await;
/// ```
pub struct RunSpan {
    span: tracing::Span,
}

impl RunSpan {
    pub fn new(run_id: &str, run_name: &str) -> Self {
        Self {
            span: tracing::info_span!("normbench.run", run_id = %run_id, run_name = %run_name),
        }
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }
}

/// Emit event: run started.
pub fn emit_run_started(run_id: &str, run_name: &str, pipelines: usize, rows: usize) {
    info!(
        event = "run.started",
        run_id = %run_id,
        run_name = %run_name,
        pipelines = pipelines,
        rows = rows,
    );
}

/// Emit event: a pipeline test began scoring the dataset.
pub fn emit_pipeline_started(run_id: &str, pipeline: &str, kind: &str, metrics: usize) {
    info!(
        event = "pipeline.started",
        run_id = %run_id,
        pipeline = %pipeline,
        kind = %kind,
        metrics = metrics,
    );
}

/// Emit event: a row failed and was recorded as a sentinel.
pub fn emit_row_failed(run_id: &str, pipeline: &str, row_id: &str, stage: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "row.failed",
        run_id = %run_id,
        pipeline = %pipeline,
        row_id = %row_id,
        stage = %stage,
        error = %error,
    );
}

/// Emit event: a pipeline test finished all rows.
pub fn emit_pipeline_finished(run_id: &str, pipeline: &str, succeeded: usize, failed: usize, duration_ms: u64) {
    info!(
        event = "pipeline.finished",
        run_id = %run_id,
        pipeline = %pipeline,
        succeeded = succeeded,
        failed = failed,
        duration_ms = duration_ms,
    );
}

/// Emit event: run finished.
pub fn emit_run_finished(run_id: &str, duration_ms: u64, total_results: usize, status: &str) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        total_results = total_results,
        status = %status,
    );
}

/// Emit event: result artifact written.
pub fn emit_run_persisted(run_id: &str, path: &std::path::Path) {
    info!(event = "run.persisted", run_id = %run_id, path = %path.display());
}

/// Emit event: artifact persistence failed (warning level).
pub fn emit_run_persist_error(run_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "run.persist_error", run_id = %run_id, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_span_create() {
        let span = RunSpan::new("test-run-id", "test-run");
        let _guard = span.enter();
        emit_row_failed("test-run-id", "p", "1", "generation", &"boom");
    }
}
