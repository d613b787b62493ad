//! Global atomic counters for benchmark observability.
//!
//! Counters are incremented silently at the call site and live for the whole
//! process. A run takes a [`Metrics::snapshot`] when it starts and calls
//! [`Metrics::flush_since`] when it ends, which logs that run's increments
//! next to the process totals.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub rows_evaluated: u64,
    pub rows_failed: u64,
    pub generation_calls: u64,
    pub embedding_cache_hits: u64,
    pub embedding_cache_misses: u64,
}

impl MetricsSnapshot {
    /// Increments between `earlier` and `self`.
    pub fn since(&self, earlier: &MetricsSnapshot) -> MetricsSnapshot {
        MetricsSnapshot {
            rows_evaluated: self.rows_evaluated.saturating_sub(earlier.rows_evaluated),
            rows_failed: self.rows_failed.saturating_sub(earlier.rows_failed),
            generation_calls: self.generation_calls.saturating_sub(earlier.generation_calls),
            embedding_cache_hits: self
                .embedding_cache_hits
                .saturating_sub(earlier.embedding_cache_hits),
            embedding_cache_misses: self
                .embedding_cache_misses
                .saturating_sub(earlier.embedding_cache_misses),
        }
    }
}

/// Lightweight atomic counters, no allocations, no locking.
pub struct Metrics {
    rows_evaluated: AtomicU64,
    rows_failed: AtomicU64,
    generation_calls: AtomicU64,
    embedding_cache_hits: AtomicU64,
    embedding_cache_misses: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            rows_evaluated: AtomicU64::new(0),
            rows_failed: AtomicU64::new(0),
            generation_calls: AtomicU64::new(0),
            embedding_cache_hits: AtomicU64::new(0),
            embedding_cache_misses: AtomicU64::new(0),
        }
    }

    pub fn inc_rows_evaluated(&self) {
        self.rows_evaluated.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "rows_evaluated", "counter incremented");
    }

    pub fn inc_rows_failed(&self) {
        self.rows_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "rows_failed", "counter incremented");
    }

    pub fn inc_generation_calls(&self) {
        self.generation_calls.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "generation_calls", "counter incremented");
    }

    pub fn inc_cache_hits(&self) {
        self.embedding_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_misses(&self) {
        self.embedding_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rows_evaluated: self.rows_evaluated(),
            rows_failed: self.rows_failed(),
            generation_calls: self.generation_calls(),
            embedding_cache_hits: self.cache_hits(),
            embedding_cache_misses: self.cache_misses(),
        }
    }

    /// Emit the increments since `baseline` and the process totals as a
    /// single `info!` event. Returns the increments.
    ///
    /// Runs overlapping in one process share counters, so their increments
    /// are attributed to each of them.
    pub fn flush_since(&self, baseline: &MetricsSnapshot) -> MetricsSnapshot {
        let total = self.snapshot();
        let run = total.since(baseline);
        tracing::info!(
            metric = "flush",
            rows_evaluated = run.rows_evaluated,
            rows_failed = run.rows_failed,
            generation_calls = run.generation_calls,
            embedding_cache_hits = run.embedding_cache_hits,
            embedding_cache_misses = run.embedding_cache_misses,
            total_rows_evaluated = total.rows_evaluated,
            total_generation_calls = total.generation_calls,
        );
        run
    }

    pub fn rows_evaluated(&self) -> u64 {
        self.rows_evaluated.load(Ordering::Relaxed)
    }

    pub fn rows_failed(&self) -> u64 {
        self.rows_failed.load(Ordering::Relaxed)
    }

    pub fn generation_calls(&self) -> u64 {
        self.generation_calls.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> u64 {
        self.embedding_cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.embedding_cache_misses.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.rows_evaluated.store(0, Ordering::Relaxed);
        self.rows_failed.store(0, Ordering::Relaxed);
        self.generation_calls.store(0, Ordering::Relaxed);
        self.embedding_cache_hits.store(0, Ordering::Relaxed);
        self.embedding_cache_misses.store(0, Ordering::Relaxed);
    }
}
