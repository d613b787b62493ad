//! Storage trait definitions for normbench
//!
//! These traits define the two capabilities the benchmark consumes from a
//! reference vocabulary:
//! - `VectorSearch`: nearest-neighbour lookup of terms by embedding
//! - `TerminologySession`: read-only relation and hierarchy checks by name
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StateError>;

// ---------------------------------------------------------------------------
// VectorSearch
// ---------------------------------------------------------------------------

/// A term returned by a vector search together with its similarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredTerm {
    /// Term name
    pub content: String,
    /// Cosine similarity to the query vector
    pub score: f64,
}

/// Nearest-neighbour search over a reference vocabulary.
///
/// Guarantees:
/// - At most `top_k` results, best first.
/// - Results with equal scores keep the backend's storage order.
/// - `top_k == 0` returns an empty list without touching the backend.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Return the `top_k` terms most similar to `vector`.
    async fn search(&self, vector: &[f32], top_k: usize) -> StorageResult<Vec<ScoredTerm>>;
}

// ---------------------------------------------------------------------------
// TerminologySession
// ---------------------------------------------------------------------------

/// Read-only lookups into a terminology hierarchy.
///
/// Names are matched case-insensitively after trimming. Unknown names are not
/// an error: they simply relate to nothing.
#[async_trait]
pub trait TerminologySession: Send + Sync {
    /// True when a concept named `a` and a concept named `b` share a direct
    /// relationship, in either direction.
    async fn is_related(&self, a: &str, b: &str) -> StorageResult<bool>;

    /// True when a concept named `a` is an ancestor of a concept named `b`.
    async fn is_ancestor(&self, a: &str, b: &str) -> StorageResult<bool>;
}
