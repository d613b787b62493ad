//! Plain generation pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use normbench_providers::{GenerationModel, GenerationParams};

use crate::domain::error::{PipelineError, Result};
use crate::metrics::METRICS;
use crate::pipeline::{
    validate_template, LlmContext, Pipeline, PipelineDescription, PipelineKind,
};
use crate::template::PromptTemplate;

/// A fixed (template, model, decoding settings) binding.
///
/// Shared by both pipeline kinds: it renders a prepared context and calls the
/// model. Decoding is greedy unless overridden.
#[derive(Clone)]
pub struct Generator {
    model: Arc<dyn GenerationModel>,
    template: Arc<dyn PromptTemplate>,
    params: GenerationParams,
    eot_token: String,
}

impl Generator {
    pub fn new(model: Arc<dyn GenerationModel>, template: Arc<dyn PromptTemplate>) -> Self {
        Self {
            model,
            template,
            params: GenerationParams::deterministic(),
            eot_token: String::new(),
        }
    }

    /// Expose `token` to templates and stop generation at it.
    pub fn with_eot_token(mut self, token: &str) -> Self {
        if !token.is_empty() {
            self.eot_token = token.to_string();
            self.params = self.params.with_stop(token);
        }
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.params = self.params.with_max_tokens(max_tokens);
        self
    }

    pub fn template(&self) -> &dyn PromptTemplate {
        self.template.as_ref()
    }

    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    pub fn eot_token(&self) -> &str {
        &self.eot_token
    }

    pub(crate) fn description(&self, kind: PipelineKind) -> PipelineDescription {
        PipelineDescription {
            kind,
            generation_model: self.model.model_id().to_string(),
            template: self.template.name().to_string(),
            max_tokens: self.params.max_tokens,
            temperature: self.params.temperature,
            embedding_model: None,
            top_k: None,
            include_scores: None,
        }
    }

    /// Render `context` and invoke the model; the output is returned as-is.
    pub async fn generate(
        &self,
        input: &str,
        context: &serde_json::Value,
    ) -> std::result::Result<String, PipelineError> {
        let prompt = self
            .template
            .render(context)
            .map_err(|e| PipelineError::Template {
                input: input.to_string(),
                cause: e.to_string(),
            })?;

        debug!(prompt_chars = prompt.len(), "prompt rendered");
        METRICS.inc_generation_calls();

        self.model
            .generate(&prompt, &self.params)
            .await
            .map_err(|e| PipelineError::Generation {
                input: input.to_string(),
                cause: e.to_string(),
            })
    }
}

/// Render `{informal_name}` and generate.
pub struct LlmPipeline {
    generator: Generator,
}

impl LlmPipeline {
    pub fn new(generator: Generator) -> Result<Self> {
        validate_template(generator.template(), PipelineKind::Llm)?;
        Ok(Self { generator })
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }
}

#[async_trait]
impl Pipeline for LlmPipeline {
    fn kind(&self) -> PipelineKind {
        PipelineKind::Llm
    }

    fn describe(&self) -> PipelineDescription {
        self.generator.description(PipelineKind::Llm)
    }

    fn validate(&self) -> Result<()> {
        validate_template(self.generator.template(), PipelineKind::Llm)
    }

    #[instrument(skip(self), fields(kind = "llm", model = %self.generator.model_id()))]
    async fn run(&self, input: &str) -> std::result::Result<String, PipelineError> {
        let context = serde_json::to_value(LlmContext {
            informal_name: input,
            eot_token: self.generator.eot_token(),
        })
        .map_err(|e| PipelineError::Template {
            input: input.to_string(),
            cause: e.to_string(),
        })?;

        self.generator.generate(input, &context).await
    }
}
