//! Normalised indel similarity.
//!
//! ratio = (len_a + len_b - indel_distance) / (len_a + len_b)
//!       = 2 * lcs(a, b) / (len_a + len_b)
//!
//! Lengths are in chars. Two empty strings score 1.0.

use async_trait::async_trait;

use crate::domain::error::MetricError;
use crate::scoring::Metric;

/// Length of the longest common subsequence of two char sequences.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let (m, n) = (a.len(), b.len());
    if m == 0 || n == 0 {
        return 0;
    }

    // two rolling rows of the usual LCS table
    let mut prev = vec![0usize; n + 1];
    let mut curr = vec![0usize; n + 1];

    for i in 1..=m {
        for j in 1..=n {
            curr[j] = if a[i - 1] == b[j - 1] {
                prev[j - 1] + 1
            } else {
                curr[j - 1].max(prev[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

/// Similarity in [0, 1]; symmetric, and 1.0 exactly when `a == b`.
pub fn fuzzy_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    (2 * lcs_len(&a, &b)) as f64 / total as f64
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FuzzyMatchRatio;

#[async_trait]
impl Metric for FuzzyMatchRatio {
    fn name(&self) -> &str {
        "fuzzy_match_ratio"
    }

    async fn score(&self, prediction: &str, reference: &str) -> Result<f64, MetricError> {
        Ok(fuzzy_ratio(prediction, reference))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_score_one() {
        for s in ["", "a", "Ibuprofen", "acetaminophen 500 MG Oral Tablet"] {
            assert_eq!(fuzzy_ratio(s, s), 1.0);
        }
    }

    #[test]
    fn known_ratio() {
        // lcs("abcd", "abed") = 3 -> 6 / 8
        assert!((fuzzy_ratio("abcd", "abed") - 0.75).abs() < 1e-12);
        // nothing in common
        assert_eq!(fuzzy_ratio("abc", "xyz"), 0.0);
        assert_eq!(fuzzy_ratio("", "xyz"), 0.0);
    }

    #[test]
    fn bounded_and_symmetric() {
        let samples = [
            ("Tylenol", "Acetaminophen"),
            ("ibuprofen", "Ibuprofen"),
            ("advil", "Advil 200 mg"),
            ("", "x"),
            ("naïve", "naive"),
        ];
        for (a, b) in samples {
            let ab = fuzzy_ratio(a, b);
            let ba = fuzzy_ratio(b, a);
            assert!((0.0..=1.0).contains(&ab), "{a} vs {b} = {ab}");
            assert_eq!(ab, ba);
        }
    }

    #[test]
    fn case_is_significant() {
        assert!(fuzzy_ratio("Ibuprofen", "ibuprofen") < 1.0);
    }

    #[tokio::test]
    async fn metric_wraps_ratio() {
        let score = FuzzyMatchRatio.score("abcd", "abed").await.unwrap();
        assert!((score - 0.75).abs() < 1e-12);
    }
}
