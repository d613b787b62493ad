//! Case-insensitive exact match.

use async_trait::async_trait;

use crate::domain::error::MetricError;
use crate::scoring::Metric;

/// Equal after trimming surrounding whitespace, ignoring case.
pub fn uncased_eq(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// 1.0 when prediction and reference match ignoring case, else 0.0.
#[derive(Debug, Clone, Copy, Default)]
pub struct UncasedMatch;

#[async_trait]
impl Metric for UncasedMatch {
    fn name(&self) -> &str {
        "uncased_match"
    }

    async fn score(&self, prediction: &str, reference: &str) -> Result<f64, MetricError> {
        Ok(if uncased_eq(prediction, reference) { 1.0 } else { 0.0 })
    }
}
