//! Scoring metrics.
//!
//! A metric compares a raw prediction with the reference answer and returns
//! a score in [0, 1]. "No match" is a score, never an error; only a failed
//! terminology lookup is a `MetricError`.
//!
//! Metrics are selected from configuration through `MetricKind`, which builds
//! the matching trait object.

pub mod exact;
pub mod fuzzy;
pub mod hierarchy;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use normbench_state::TerminologySession;

use crate::domain::error::{BenchError, MetricError, Result};

pub use exact::{uncased_eq, UncasedMatch};
pub use fuzzy::{fuzzy_ratio, FuzzyMatchRatio};
pub use hierarchy::{AncestorNameUncasedMatch, RelatedNameUncasedMatch};

#[async_trait]
pub trait Metric: Send + Sync {
    /// Name recorded in every result this metric produces.
    fn name(&self) -> &str;

    async fn score(&self, prediction: &str, reference: &str) -> std::result::Result<f64, MetricError>;
}

/// Metric variants available to configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    UncasedMatch,
    FuzzyMatchRatio,
    RelatedNameUncasedMatch,
    AncestorNameUncasedMatch,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::UncasedMatch,
        MetricKind::FuzzyMatchRatio,
        MetricKind::RelatedNameUncasedMatch,
        MetricKind::AncestorNameUncasedMatch,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::UncasedMatch => "uncased_match",
            MetricKind::FuzzyMatchRatio => "fuzzy_match_ratio",
            MetricKind::RelatedNameUncasedMatch => "related_name_uncased_match",
            MetricKind::AncestorNameUncasedMatch => "ancestor_name_uncased_match",
        }
    }

    /// Whether the metric needs a terminology session.
    pub fn requires_session(&self) -> bool {
        matches!(
            self,
            MetricKind::RelatedNameUncasedMatch | MetricKind::AncestorNameUncasedMatch
        )
    }

    pub fn build(&self, session: Option<Arc<dyn TerminologySession>>) -> Result<Arc<dyn Metric>> {
        let need = |session: Option<Arc<dyn TerminologySession>>| {
            session.ok_or_else(|| {
                BenchError::InvalidConfig(format!(
                    "metric {} needs a terminology session",
                    self.name()
                ))
            })
        };

        Ok(match self {
            MetricKind::UncasedMatch => Arc::new(UncasedMatch),
            MetricKind::FuzzyMatchRatio => Arc::new(FuzzyMatchRatio),
            MetricKind::RelatedNameUncasedMatch => {
                Arc::new(RelatedNameUncasedMatch::new(need(session)?))
            }
            MetricKind::AncestorNameUncasedMatch => {
                Arc::new(AncestorNameUncasedMatch::new(need(session)?))
            }
        })
    }
}

impl std::str::FromStr for MetricKind {
    type Err = BenchError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        MetricKind::ALL
            .iter()
            .copied()
            .find(|k| k.name() == s)
            .ok_or_else(|| BenchError::InvalidConfig(format!("unknown metric: {s}")))
    }
}
