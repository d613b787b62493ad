//! Schema definitions for the vocabulary tables
//!
//! Tables:
//! - terms: reference concepts with their name embedding
//! - relationships: direct concept-to-concept relations (maps to, brand of, ...)
//! - ancestors: transitive hierarchy closure (ancestor -> descendant)

use serde::{Deserialize, Serialize};

/// A reference concept in the vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyTerm {
    /// Stable concept identifier (e.g. an OMOP `concept_id`)
    pub concept_id: String,
    /// Canonical concept name, the string a pipeline should predict
    pub name: String,
    /// Source vocabulary (e.g. "RxNorm")
    #[serde(default)]
    pub vocabulary_id: Option<String>,
    /// Embedding of `name`
    pub embedding: Vec<f32>,
}

impl VocabularyTerm {
    /// Create a new term
    pub fn new(concept_id: &str, name: &str, embedding: Vec<f32>) -> Self {
        Self {
            concept_id: concept_id.to_string(),
            name: name.to_string(),
            vocabulary_id: None,
            embedding,
        }
    }

    /// Tag the term with its source vocabulary
    pub fn with_vocabulary(mut self, vocabulary_id: &str) -> Self {
        self.vocabulary_id = Some(vocabulary_id.to_string());
        self
    }
}

/// A direct relation between two concepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptRelationship {
    pub concept_id_1: String,
    pub concept_id_2: String,
    pub relationship_id: String,
}

impl ConceptRelationship {
    pub fn new(concept_id_1: &str, concept_id_2: &str, relationship_id: &str) -> Self {
        Self {
            concept_id_1: concept_id_1.to_string(),
            concept_id_2: concept_id_2.to_string(),
            relationship_id: relationship_id.to_string(),
        }
    }
}

/// One edge of the hierarchy closure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptAncestor {
    pub ancestor_concept_id: String,
    pub descendant_concept_id: String,
    /// Shortest path length between the two concepts (0 = same concept)
    pub min_levels_of_separation: u32,
}

impl ConceptAncestor {
    pub fn new(ancestor: &str, descendant: &str, levels: u32) -> Self {
        Self {
            ancestor_concept_id: ancestor.to_string(),
            descendant_concept_id: descendant.to_string(),
            min_levels_of_separation: levels,
        }
    }
}

/// Normalise a concept name for case-insensitive lookups.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}
