//! Embedding model registry.
//!
//! A fixed, process-wide table from symbolic name to model source and output
//! width. Built once on first use and never mutated.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::Serialize;

use crate::domain::error::{BenchError, Result};

/// Where an embedding model comes from and how wide its vectors are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EmbeddingModelDescriptor {
    pub symbolic_name: &'static str,
    pub source_path: &'static str,
    pub dimensions: usize,
}

const fn descriptor(
    symbolic_name: &'static str,
    source_path: &'static str,
    dimensions: usize,
) -> EmbeddingModelDescriptor {
    EmbeddingModelDescriptor {
        symbolic_name,
        source_path,
        dimensions,
    }
}

static DESCRIPTORS: [EmbeddingModelDescriptor; 9] = [
    descriptor("BGESMALL", "BAAI/bge-small-en-v1.5", 384),
    descriptor("MINILM", "sentence-transformers/all-MiniLM-L6-v2", 384),
    descriptor("gtr-t5-base", "google/gtr-t5-base", 768),
    descriptor("gtr-t5-large", "google/gtr-t5-large", 1024),
    descriptor("e5-base", "microsoft/e5-base", 768),
    descriptor("e5-large", "microsoft/e5-large", 1024),
    descriptor("distilbert-base-uncased", "distilbert-base-uncased", 768),
    descriptor(
        "distiluse-base-multilingual-cased-v1",
        "sentence-transformers/distiluse-base-multilingual-cased-v1",
        512,
    ),
    descriptor("contriever", "facebook/contriever", 768),
];

static REGISTRY: LazyLock<HashMap<&'static str, &'static EmbeddingModelDescriptor>> =
    LazyLock::new(|| DESCRIPTORS.iter().map(|d| (d.symbolic_name, d)).collect());

/// Look up a registered embedding model.
pub fn describe(symbolic_name: &str) -> Result<EmbeddingModelDescriptor> {
    REGISTRY
        .get(symbolic_name)
        .map(|d| **d)
        .ok_or_else(|| BenchError::UnknownModel(symbolic_name.to_string()))
}

/// All descriptors in declaration order.
pub fn all() -> &'static [EmbeddingModelDescriptor] {
    &DESCRIPTORS
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_descriptor_is_well_formed() {
        for d in all() {
            let found = describe(d.symbolic_name).unwrap();
            assert_eq!(&found, d);
            assert!(found.dimensions > 0, "{} has zero dimensions", d.symbolic_name);
            assert!(!found.source_path.is_empty());
        }
    }

    #[test]
    fn symbolic_names_are_unique() {
        let names: HashSet<_> = all().iter().map(|d| d.symbolic_name).collect();
        assert_eq!(names.len(), all().len());
    }

    #[test]
    fn known_widths() {
        assert_eq!(describe("BGESMALL").unwrap().dimensions, 384);
        assert_eq!(describe("e5-large").unwrap().dimensions, 1024);
        assert_eq!(
            describe("distiluse-base-multilingual-cased-v1")
                .unwrap()
                .dimensions,
            512
        );
    }

    #[test]
    fn unknown_model_is_rejected() {
        let err = describe("text-embedding-ada-002").unwrap_err();
        assert!(matches!(err, BenchError::UnknownModel(name) if name == "text-embedding-ada-002"));
    }

    #[test]
    fn lookup_is_case_sensitive() {
        assert!(describe("bgesmall").is_err());
    }
}
