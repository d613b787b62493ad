//! Benchmark definition files.
//!
//! A benchmark is one TOML file. Relative paths inside it are resolved
//! against the file's directory.
//!
//! ```toml
//! [run]
//! name = "rxnorm-baseline"
//!
//! [dataset]
//! path = "meds.csv"
//!
//! [generation]
//! model = "llama-3.1-8b"
//!
//! [templates]
//! plain = "templates/plain.j2"
//!
//! [[tests]]
//! name = "llm"
//! kind = "llm"
//! template = "plain"
//! metrics = ["uncased_match", "fuzzy_match_ratio"]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use normbench_core::{CsvDataset, HarnessConfig, MetricKind, PipelineKind, RagConfig, RetryPolicy};
use normbench_providers::{LlmModel, DEFAULT_MAX_TOKENS};
use normbench_state::{ConceptAncestor, ConceptRelationship};

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BenchConfig {
    pub run: RunSection,
    pub dataset: DatasetSection,
    #[serde(default)]
    pub harness: HarnessSection,
    pub generation: GenerationSection,
    pub embedding: Option<EmbeddingSection>,
    pub vocabulary: Option<VocabularySection>,
    /// Template name -> template file
    pub templates: BTreeMap<String, PathBuf>,
    pub tests: Vec<TestSection>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RunSection {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DatasetSection {
    pub path: PathBuf,
    #[serde(default = "default_input_column")]
    pub input_column: String,
    #[serde(default = "default_expected_column")]
    pub expected_column: String,
    pub id_column: Option<String>,
}

fn default_input_column() -> String {
    "input".to_string()
}

fn default_expected_column() -> String {
    "expected".to_string()
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessSection {
    pub max_concurrency: usize,
    pub row_timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub results_path: Option<PathBuf>,
}

impl Default for HarnessSection {
    fn default() -> Self {
        let harness = HarnessConfig::default();
        Self {
            max_concurrency: harness.max_concurrency,
            row_timeout_secs: harness.row_timeout.as_secs(),
            max_retries: harness.retry.max_retries,
            backoff_base_ms: harness.retry.backoff_base_ms,
            results_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GenerationSection {
    pub model: LlmModel,
    /// Overrides NORMBENCH_LLM_URL
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingSection {
    /// Symbolic name in the embedding registry
    pub model: String,
    /// Model name served by Ollama; defaults to the registry source path
    pub ollama_model: Option<String>,
    /// Overrides NORMBENCH_EMBED_URL
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct VocabularySection {
    /// JSON file with terms, relationships and ancestors
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TestSection {
    pub name: String,
    pub kind: PipelineKind,
    pub template: String,
    pub metrics: Vec<MetricKind>,
    pub top_k: Option<usize>,
    pub include_scores: Option<bool>,
}

impl TestSection {
    pub fn rag_config(&self) -> RagConfig {
        let defaults = RagConfig::default();
        RagConfig {
            top_k: self.top_k.unwrap_or(defaults.top_k),
            include_scores: self.include_scores.unwrap_or(defaults.include_scores),
        }
    }
}

/// A vocabulary term before it is embedded.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct VocabularyEntry {
    pub concept_id: String,
    pub name: String,
    pub vocabulary_id: Option<String>,
}

/// Contents of the vocabulary JSON file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct VocabularyFile {
    pub terms: Vec<VocabularyEntry>,
    #[serde(default)]
    pub relationships: Vec<ConceptRelationship>,
    #[serde(default)]
    pub ancestors: Vec<ConceptAncestor>,
}

impl VocabularyFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read vocabulary file: {:?}", path))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid vocabulary JSON in {:?}", path))
    }
}

impl BenchConfig {
    /// Read, parse and validate a benchmark file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read benchmark file: {:?}", path))?;
        let mut config = Self::parse(&content)
            .with_context(|| format!("Invalid benchmark file: {:?}", path))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.dataset.path);
        if let Some(path) = self.harness.results_path.as_mut() {
            resolve(path);
        }
        if let Some(vocabulary) = self.vocabulary.as_mut() {
            resolve(&mut vocabulary.path);
        }
        for path in self.templates.values_mut() {
            resolve(path);
        }
    }

    /// Whether any pipeline test retrieves from the vocabulary.
    pub fn needs_retrieval(&self) -> bool {
        self.tests.iter().any(|t| t.kind == PipelineKind::Rag)
    }

    /// Whether any metric consults the terminology session.
    pub fn needs_session(&self) -> bool {
        self.tests
            .iter()
            .flat_map(|t| t.metrics.iter())
            .any(MetricKind::requires_session)
    }

    /// Cross-section checks that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.run.name.trim().is_empty() {
            bail!("run.name must not be empty");
        }
        if self.tests.is_empty() {
            bail!("at least one [[tests]] entry is required");
        }
        if self.harness.max_concurrency == 0 {
            bail!("harness.max_concurrency must be at least 1");
        }
        if self.harness.row_timeout_secs == 0 {
            bail!("harness.row_timeout_secs must be at least 1");
        }

        for test in &self.tests {
            if !self.templates.contains_key(&test.template) {
                bail!("test {} uses undefined template {}", test.name, test.template);
            }
            if test.metrics.is_empty() {
                bail!("test {} declares no metrics", test.name);
            }
            if test.kind == PipelineKind::Llm && (test.top_k.is_some() || test.include_scores.is_some()) {
                bail!("test {} sets retrieval options on an llm pipeline", test.name);
            }
        }

        if self.needs_retrieval() || self.needs_session() {
            if self.vocabulary.is_none() {
                bail!("[vocabulary] is required by rag tests and hierarchy metrics");
            }
            if self.embedding.is_none() {
                bail!("[embedding] is required to index the vocabulary");
            }
        }
        Ok(())
    }

    pub fn harness_config(&self) -> HarnessConfig {
        HarnessConfig {
            max_concurrency: self.harness.max_concurrency,
            row_timeout: Duration::from_secs(self.harness.row_timeout_secs),
            retry: RetryPolicy::with_retries(self.harness.max_retries, self.harness.backoff_base_ms),
        }
    }

    pub fn dataset(&self) -> CsvDataset {
        let dataset = CsvDataset::new(&self.dataset.path)
            .with_columns(&self.dataset.input_column, &self.dataset.expected_column);
        match &self.dataset.id_column {
            Some(column) => dataset.with_id_column(column),
            None => dataset,
        }
    }
}
