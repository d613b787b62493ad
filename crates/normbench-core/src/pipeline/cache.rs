//! Run-scoped embedding cache.
//!
//! Keyed by (embedding model id, input). Clones share the same map, so one
//! cache can serve every retrieval pipeline of a run. Never persisted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use normbench_providers::{EmbeddingModel, ProviderError};

use crate::metrics::METRICS;

type Key = (String, String);

#[derive(Clone, Default)]
pub struct EmbeddingCache {
    entries: Arc<Mutex<HashMap<Key, Vec<f32>>>>,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup(&self, key: &Key) -> Option<Vec<f32>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    /// Return the cached vector or compute and remember it.
    ///
    /// The lock is not held across the embedding call; two concurrent misses
    /// on the same key both compute, and the last write wins.
    pub async fn get_or_embed(
        &self,
        embedder: &dyn EmbeddingModel,
        input: &str,
    ) -> Result<Vec<f32>, ProviderError> {
        let key = (embedder.model_id().to_string(), input.to_string());

        if let Some(hit) = self.lookup(&key) {
            METRICS.inc_cache_hits();
            return Ok(hit);
        }

        METRICS.inc_cache_misses();
        let vector = embedder.embed(input).await?;
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key, vector.clone());
        Ok(vector)
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use normbench_providers::fakes::{FailingEmbedder, HashEmbedder};

    #[tokio::test]
    async fn repeated_input_embeds_once() {
        let cache = EmbeddingCache::new();
        let embedder = HashEmbedder::new(8);

        let a = cache.get_or_embed(&embedder, "Advil").await.unwrap();
        let b = cache.get_or_embed(&embedder, "Advil").await.unwrap();

        assert_eq!(a, b);
        assert_eq!(embedder.calls(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn key_includes_model_id() {
        let cache = EmbeddingCache::new();
        let small = HashEmbedder::new(8).with_model_id("a");
        let other = HashEmbedder::new(8).with_model_id("b");

        cache.get_or_embed(&small, "Advil").await.unwrap();
        cache.get_or_embed(&other, "Advil").await.unwrap();

        assert_eq!(small.calls(), 1);
        assert_eq!(other.calls(), 1);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn clones_share_entries() {
        let cache = EmbeddingCache::new();
        let shared = cache.clone();
        let embedder = HashEmbedder::new(8);

        cache.get_or_embed(&embedder, "Tylenol").await.unwrap();
        shared.get_or_embed(&embedder, "Tylenol").await.unwrap();
        assert_eq!(embedder.calls(), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = EmbeddingCache::new();
        assert!(cache
            .get_or_embed(&FailingEmbedder::new(8), "x")
            .await
            .is_err());
        assert!(cache.is_empty());
    }
}
