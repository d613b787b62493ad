//! normbench-state: reference vocabulary store for normbench
//!
//! This crate provides the vocabulary the benchmark retrieves candidates from
//! and scores hierarchy-aware metrics against. It handles all I/O with
//! SurrealDB behind two capability traits.
//!
//! ## Key Components
//!
//! - `VectorSearch`: cosine top-k lookup of reference terms
//! - `TerminologySession`: relationship and ancestor checks by concept name
//! - `SurrealVocabulary`: SurrealDB implementation of both
//! - `fakes::MemoryVocabulary`: in-memory implementation for tests

mod error;
pub mod fakes;
mod handle;
mod schema;
pub mod storage_traits;

pub use error::StateError;
pub use handle::{CloudConfig, SurrealVocabulary};
pub use schema::{name_key, ConceptAncestor, ConceptRelationship, VocabularyTerm};
pub use storage_traits::{ScoredTerm, StorageResult, TerminologySession, VectorSearch};

/// Result type for normbench-state operations
pub type Result<T> = std::result::Result<T, StateError>;
