//! Terminology-aware matches.
//!
//! Both metrics accept an uncased exact match outright and otherwise ask the
//! terminology session:
//! - `RelatedNameUncasedMatch`: prediction and reference are directly related
//! - `AncestorNameUncasedMatch`: prediction is an ancestor of the reference

use std::sync::Arc;

use async_trait::async_trait;

use normbench_state::TerminologySession;

use crate::domain::error::MetricError;
use crate::scoring::{uncased_eq, Metric};

fn lookup_error(metric: &str, err: impl std::fmt::Display) -> MetricError {
    MetricError::Lookup {
        metric: metric.to_string(),
        cause: err.to_string(),
    }
}

pub struct RelatedNameUncasedMatch {
    session: Arc<dyn TerminologySession>,
}

impl RelatedNameUncasedMatch {
    pub fn new(session: Arc<dyn TerminologySession>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Metric for RelatedNameUncasedMatch {
    fn name(&self) -> &str {
        "related_name_uncased_match"
    }

    async fn score(&self, prediction: &str, reference: &str) -> Result<f64, MetricError> {
        if uncased_eq(prediction, reference) {
            return Ok(1.0);
        }
        let related = self
            .session
            .is_related(prediction, reference)
            .await
            .map_err(|e| lookup_error(self.name(), e))?;
        Ok(if related { 1.0 } else { 0.0 })
    }
}

pub struct AncestorNameUncasedMatch {
    session: Arc<dyn TerminologySession>,
}

impl AncestorNameUncasedMatch {
    pub fn new(session: Arc<dyn TerminologySession>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Metric for AncestorNameUncasedMatch {
    fn name(&self) -> &str {
        "ancestor_name_uncased_match"
    }

    async fn score(&self, prediction: &str, reference: &str) -> Result<f64, MetricError> {
        if uncased_eq(prediction, reference) {
            return Ok(1.0);
        }
        let ancestor = self
            .session
            .is_ancestor(prediction, reference)
            .await
            .map_err(|e| lookup_error(self.name(), e))?;
        Ok(if ancestor { 1.0 } else { 0.0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use normbench_state::fakes::MemoryVocabulary;
    use normbench_state::{ConceptAncestor, ConceptRelationship, VocabularyTerm};

    fn session() -> Arc<dyn TerminologySession> {
        Arc::new(
            MemoryVocabulary::new()
                .with_term(VocabularyTerm::new("1", "Acetaminophen", vec![1.0]))
                .with_term(VocabularyTerm::new("2", "Tylenol", vec![1.0]))
                .with_term(VocabularyTerm::new("3", "Analgesics", vec![1.0]))
                .with_relationship(ConceptRelationship::new("2", "1", "Brand name of"))
                .with_ancestor(ConceptAncestor::new("3", "1", 1)),
        )
    }

    #[tokio::test]
    async fn related_accepts_brand_name() {
        let m = RelatedNameUncasedMatch::new(session());
        assert_eq!(m.score("Tylenol", "Acetaminophen").await.unwrap(), 1.0);
        assert_eq!(m.score("Analgesics", "Acetaminophen").await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn ancestor_accepts_broader_class_only() {
        let m = AncestorNameUncasedMatch::new(session());
        assert_eq!(m.score("analgesics", "Acetaminophen").await.unwrap(), 1.0);
        assert_eq!(m.score("Acetaminophen", "Analgesics").await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn exact_match_skips_the_session() {
        let m = RelatedNameUncasedMatch::new(Arc::new(MemoryVocabulary::unavailable()));
        assert_eq!(m.score("Ibuprofen", "IBUPROFEN").await.unwrap(), 1.0);
    }

    #[tokio::test]
    async fn session_failure_is_metric_error() {
        let m = AncestorNameUncasedMatch::new(Arc::new(MemoryVocabulary::unavailable()));
        let err = m.score("Advil", "Ibuprofen").await.unwrap_err();
        assert!(matches!(err, MetricError::Lookup { metric, .. } if metric == "ancestor_name_uncased_match"));
    }
}
