//! Metric examples and registry well-formedness.

use std::sync::Arc;

use normbench_core::registry;
use normbench_core::scoring::{fuzzy_ratio, FuzzyMatchRatio, Metric, UncasedMatch};
use normbench_core::{BenchError, MetricKind};
use normbench_state::fakes::MemoryVocabulary;
use normbench_state::TerminologySession;

#[tokio::test]
async fn test_exact_match_examples() {
    assert_eq!(UncasedMatch.score("Ibuprofen", "ibuprofen").await.unwrap(), 1.0);
    assert_eq!(UncasedMatch.score("Tylenol", "Acetaminophen").await.unwrap(), 0.0);
}

#[tokio::test]
async fn test_fuzzy_ratio_bounded_and_reflexive() {
    let words = [
        "",
        "a",
        "Tylenol",
        "Acetaminophen",
        "acetaminophen 325 MG Oral Tablet",
        "Ibuprofen",
        "ibuprofen",
        "Ibuprofen 200 mg",
        "Α-tocopherol",
    ];

    for a in words {
        assert_eq!(FuzzyMatchRatio.score(a, a).await.unwrap(), 1.0);
        for b in words {
            let score = FuzzyMatchRatio.score(a, b).await.unwrap();
            assert!((0.0..=1.0).contains(&score), "{a:?} vs {b:?} = {score}");
            assert_eq!(score, fuzzy_ratio(b, a));
        }
    }
}

#[test]
fn test_every_metric_kind_builds_with_session() {
    let session: Arc<dyn TerminologySession> = Arc::new(MemoryVocabulary::new());
    let names: Vec<String> = MetricKind::ALL
        .iter()
        .map(|k| k.build(Some(session.clone())).unwrap().name().to_string())
        .collect();
    assert_eq!(
        names,
        vec![
            "uncased_match",
            "fuzzy_match_ratio",
            "related_name_uncased_match",
            "ancestor_name_uncased_match",
        ]
    );
}

#[test]
fn test_registry_descriptors_well_formed() {
    assert!(!registry::all().is_empty());
    for d in registry::all() {
        let found = registry::describe(d.symbolic_name).unwrap();
        assert!(found.dimensions > 0, "{} has no dimensions", d.symbolic_name);
        assert!(!found.source_path.is_empty());
    }
}

#[test]
fn test_registry_unknown_model() {
    let err = registry::describe("text-embedding-ada-002").unwrap_err();
    assert!(matches!(err, BenchError::UnknownModel(name) if name == "text-embedding-ada-002"));
}
