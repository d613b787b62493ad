//! Retrieval-augmented pipeline.
//!
//! embed(input) -> search(top_k) -> render {informal_name, vec_results} -> generate

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, instrument};

use normbench_providers::EmbeddingModel;
use normbench_state::VectorSearch;

use crate::domain::error::{PipelineError, Result};
use crate::pipeline::cache::EmbeddingCache;
use crate::pipeline::llm::Generator;
use crate::pipeline::{
    validate_template, Pipeline, PipelineDescription, PipelineKind, RagContext,
    RetrievedCandidate,
};

/// Retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Number of candidates to retrieve; 0 retrieves nothing.
    pub top_k: usize,
    /// Expose similarity scores to the template.
    pub include_scores: bool,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            include_scores: false,
        }
    }
}

pub struct RagPipeline {
    generator: Generator,
    embedder: Arc<dyn EmbeddingModel>,
    search: Arc<dyn VectorSearch>,
    config: RagConfig,
    cache: EmbeddingCache,
}

impl RagPipeline {
    pub fn new(
        generator: Generator,
        embedder: Arc<dyn EmbeddingModel>,
        search: Arc<dyn VectorSearch>,
    ) -> Result<Self> {
        validate_template(generator.template(), PipelineKind::Rag)?;
        Ok(Self {
            generator,
            embedder,
            search,
            config: RagConfig::default(),
            cache: EmbeddingCache::new(),
        })
    }

    pub fn with_config(mut self, config: RagConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an embedding cache with other pipelines of the same run.
    pub fn with_cache(mut self, cache: EmbeddingCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Embed and search; scores are dropped unless `include_scores` is set.
    pub async fn retrieve(
        &self,
        input: &str,
    ) -> std::result::Result<Vec<RetrievedCandidate>, PipelineError> {
        if self.config.top_k == 0 {
            return Ok(Vec::new());
        }

        let retrieval_error = |cause: String| PipelineError::Retrieval {
            input: input.to_string(),
            cause,
        };

        let vector = self
            .cache
            .get_or_embed(self.embedder.as_ref(), input)
            .await
            .map_err(|e| retrieval_error(e.to_string()))?;

        let hits = self
            .search
            .search(&vector, self.config.top_k)
            .await
            .map_err(|e| retrieval_error(e.to_string()))?;

        debug!(candidates = hits.len(), "retrieved");

        // backend order is kept as-is
        Ok(hits
            .into_iter()
            .map(|hit| RetrievedCandidate {
                content: hit.content,
                score: self.config.include_scores.then_some(hit.score),
            })
            .collect())
    }

    fn context(
        &self,
        input: &str,
        candidates: Vec<RetrievedCandidate>,
    ) -> std::result::Result<serde_json::Value, PipelineError> {
        serde_json::to_value(RagContext {
            informal_name: input,
            eot_token: self.generator.eot_token(),
            vec_results: candidates,
        })
        .map_err(|e| PipelineError::Template {
            input: input.to_string(),
            cause: e.to_string(),
        })
    }
}

#[async_trait]
impl Pipeline for RagPipeline {
    fn kind(&self) -> PipelineKind {
        PipelineKind::Rag
    }

    fn describe(&self) -> PipelineDescription {
        let mut description = self.generator.description(PipelineKind::Rag);
        description.embedding_model = Some(self.embedder.model_id().to_string());
        description.top_k = Some(self.config.top_k);
        description.include_scores = Some(self.config.include_scores);
        description
    }

    fn validate(&self) -> Result<()> {
        validate_template(self.generator.template(), PipelineKind::Rag)
    }

    #[instrument(skip(self), fields(kind = "rag", model = %self.generator.model_id(), top_k = self.config.top_k))]
    async fn run(&self, input: &str) -> std::result::Result<String, PipelineError> {
        let candidates = self.retrieve(input).await?;
        let context = self.context(input, candidates)?;
        self.generator.generate(input, &context).await
    }

    #[instrument(skip(self), fields(kind = "rag", model = %self.generator.model_id(), top_k = self.config.top_k))]
    async fn run_bounded(
        &self,
        input: &str,
        timeout: Duration,
    ) -> std::result::Result<String, PipelineError> {
        // one deadline for the whole attempt, split across both stages
        let deadline = Instant::now() + timeout;

        let candidates = tokio::time::timeout_at(deadline, self.retrieve(input))
            .await
            .map_err(|_| PipelineError::retrieval_timeout(input, timeout))??;
        let context = self.context(input, candidates)?;

        tokio::time::timeout_at(deadline, self.generator.generate(input, &context))
            .await
            .map_err(|_| PipelineError::generation_timeout(input, timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{JinjaTemplate, PromptTemplate};
    use normbench_providers::fakes::{EchoGenerator, FailingEmbedder, HashEmbedder, ScriptedGenerator};
    use normbench_state::fakes::MemoryVocabulary;
    use normbench_state::VocabularyTerm;

    const TEMPLATE: &str = "{% for r in vec_results %}[{{ r.content }}|{{ r.score }}]{% endfor %}{{ informal_name }}";

    fn vocab(embedder: &HashEmbedder) -> Arc<MemoryVocabulary> {
        Arc::new(
            MemoryVocabulary::new()
                .with_term(VocabularyTerm::new("1", "Ibuprofen", embedder.vector("Ibuprofen")))
                .with_term(VocabularyTerm::new(
                    "2",
                    "Acetaminophen",
                    embedder.vector("Acetaminophen"),
                )),
        )
    }

    fn pipeline(embedder: Arc<dyn EmbeddingModel>, search: Arc<dyn VectorSearch>) -> RagPipeline {
        let template: Arc<dyn PromptTemplate> = Arc::new(JinjaTemplate::new("rag", TEMPLATE).unwrap());
        RagPipeline::new(Generator::new(Arc::new(EchoGenerator), template), embedder, search).unwrap()
    }

    #[tokio::test]
    async fn best_candidate_comes_first() {
        let embedder = Arc::new(HashEmbedder::new(64));
        let search = vocab(&embedder);
        let p = pipeline(embedder, search);

        let candidates = p.retrieve("ibuprofen").await.unwrap();
        assert_eq!(candidates[0].content, "Ibuprofen");
        assert!(candidates.iter().all(|c| c.score.is_none()));
    }

    #[tokio::test]
    async fn scores_exposed_only_when_enabled() {
        let embedder = Arc::new(HashEmbedder::new(64));
        let search = vocab(&embedder);
        let p = pipeline(embedder, search).with_config(RagConfig {
            top_k: 1,
            include_scores: true,
        });

        let out = p.run("ibuprofen").await.unwrap();
        assert!(out.starts_with("[Ibuprofen|"), "got {out}");
        assert!(!out.starts_with("[Ibuprofen|]"), "score missing: {out}");
    }

    /// Search that never answers within a test's time bound.
    struct StalledSearch;

    #[async_trait]
    impl VectorSearch for StalledSearch {
        async fn search(
            &self,
            _vector: &[f32],
            _top_k: usize,
        ) -> normbench_state::StorageResult<Vec<normbench_state::ScoredTerm>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_search_times_out_as_retrieval() {
        let model = Arc::new(ScriptedGenerator::new("stub").with_default("x"));
        let template: Arc<dyn PromptTemplate> = Arc::new(JinjaTemplate::new("rag", TEMPLATE).unwrap());
        let p = RagPipeline::new(
            Generator::new(model.clone(), template),
            Arc::new(HashEmbedder::new(8)),
            Arc::new(StalledSearch),
        )
        .unwrap();

        let err = p.run_bounded("Advil", Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Retrieval { ref cause, .. } if cause.contains("timed out after 1000 ms")
        ));
        assert!(model.prompts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_model_times_out_as_generation() {
        let embedder = Arc::new(HashEmbedder::new(64));
        let search = vocab(&embedder);
        let model = Arc::new(
            ScriptedGenerator::new("stub")
                .with_default("x")
                .delay_when("Advil", Duration::from_secs(60)),
        );
        let template: Arc<dyn PromptTemplate> = Arc::new(JinjaTemplate::new("rag", TEMPLATE).unwrap());
        let p = RagPipeline::new(Generator::new(model, template), embedder, search).unwrap();

        let err = p.run_bounded("Advil", Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Generation { .. }));
    }

    #[tokio::test]
    async fn embedding_failure_is_retrieval_failure() {
        let embedder = Arc::new(HashEmbedder::new(8));
        let search = vocab(&embedder);
        let p = pipeline(Arc::new(FailingEmbedder::new(8)), search);

        let err = p.run("Advil").await.unwrap_err();
        assert!(matches!(err, PipelineError::Retrieval { .. }));
    }
}
