//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryVocabulary`, which satisfies both the `VectorSearch` and
//! `TerminologySession` contracts without any external dependencies.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::StateError;
use crate::schema::{name_key, ConceptAncestor, ConceptRelationship, VocabularyTerm};
use crate::storage_traits::*;

/// Cosine similarity of two equal-length vectors; 0.0 when either is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let (dot, na, nb) = a
        .iter()
        .zip(b.iter())
        .fold((0.0f64, 0.0f64, 0.0f64), |(d, aa, bb), (x, y)| {
            let (x, y) = (*x as f64, *y as f64);
            (d + (x * y), aa + (x * x), bb + (y * y))
        });

    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na.sqrt() * nb.sqrt())
    }
}

// ---------------------------------------------------------------------------
// MemoryVocabulary
// ---------------------------------------------------------------------------

/// In-memory vocabulary: a term list plus relationship and ancestor tables.
///
/// Terms keep insertion order, which is also the tie-break order for
/// equal similarity scores.
#[derive(Debug, Default)]
pub struct MemoryVocabulary {
    terms: Vec<VocabularyTerm>,
    relationships: Vec<ConceptRelationship>,
    ancestors: Vec<ConceptAncestor>,
    unavailable: bool,
    searches: AtomicUsize,
}

impl MemoryVocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// A vocabulary whose every call fails, for exercising retrieval failures.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn with_term(mut self, term: VocabularyTerm) -> Self {
        self.terms.push(term);
        self
    }

    pub fn with_relationship(mut self, relationship: ConceptRelationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn with_ancestor(mut self, ancestor: ConceptAncestor) -> Self {
        self.ancestors.push(ancestor);
        self
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Number of `search` calls served so far.
    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::Relaxed)
    }

    fn ensure_available(&self) -> StorageResult<()> {
        if self.unavailable {
            return Err(StateError::Connection(
                "in-memory vocabulary marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn concept_ids(&self, name: &str) -> HashSet<&str> {
        let key = name_key(name);
        self.terms
            .iter()
            .filter(|t| name_key(&t.name) == key)
            .map(|t| t.concept_id.as_str())
            .collect()
    }
}

#[async_trait]
impl VectorSearch for MemoryVocabulary {
    async fn search(&self, vector: &[f32], top_k: usize) -> StorageResult<Vec<ScoredTerm>> {
        self.ensure_available()?;
        self.searches.fetch_add(1, Ordering::Relaxed);

        if top_k == 0 {
            return Ok(Vec::new());
        }

        if let Some(stored) = self.terms.iter().find(|t| t.embedding.len() != vector.len()) {
            return Err(StateError::DimensionMismatch {
                expected: stored.embedding.len(),
                actual: vector.len(),
            });
        }

        let mut scored: Vec<ScoredTerm> = self
            .terms
            .iter()
            .map(|t| ScoredTerm {
                content: t.name.clone(),
                score: cosine_similarity(vector, &t.embedding),
            })
            .collect();

        // sort_by is stable, so equal scores keep insertion order
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }
}

#[async_trait]
impl TerminologySession for MemoryVocabulary {
    async fn is_related(&self, a: &str, b: &str) -> StorageResult<bool> {
        self.ensure_available()?;
        let ids_a = self.concept_ids(a);
        let ids_b = self.concept_ids(b);
        if ids_a.is_empty() || ids_b.is_empty() {
            return Ok(false);
        }

        Ok(self.relationships.iter().any(|r| {
            let (one, two) = (r.concept_id_1.as_str(), r.concept_id_2.as_str());
            (ids_a.contains(one) && ids_b.contains(two))
                || (ids_b.contains(one) && ids_a.contains(two))
        }))
    }

    async fn is_ancestor(&self, a: &str, b: &str) -> StorageResult<bool> {
        self.ensure_available()?;
        let ancestors = self.concept_ids(a);
        let descendants = self.concept_ids(b);
        if ancestors.is_empty() || descendants.is_empty() {
            return Ok(false);
        }

        Ok(self.ancestors.iter().any(|edge| {
            ancestors.contains(edge.ancestor_concept_id.as_str())
                && descendants.contains(edge.descendant_concept_id.as_str())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_works_for_unit_vectors() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        let c = vec![0.0, 1.0, 0.0];

        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&a, &c).abs() < 1e-9);
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn search_counts_calls() {
        let vocab = MemoryVocabulary::new().with_term(VocabularyTerm::new("1", "x", vec![1.0]));
        vocab.search(&[1.0], 1).await.unwrap();
        vocab.search(&[1.0], 0).await.unwrap();
        assert_eq!(vocab.search_count(), 2);
    }
}
