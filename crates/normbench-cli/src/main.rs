//! normbench - benchmark LLM-based term normalisation
//!
//! The `normbench` command scores plain and retrieval-augmented generation
//! pipelines side by side on a labelled dataset.
//!
//! ## Commands
//!
//! - `run`: build the pipelines of a benchmark file, score the dataset, persist results
//! - `models`: list registered embedding models and known generation models
//! - `summary`: print the summary of a saved run
//! - `compare`: compare metric means of two saved runs over the same dataset

mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::future::try_join_all;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, Level};

use normbench_core::{
    compare, read_run_json, registry, render_comparison_md, render_summary_md, EmbeddingCache,
    EvaluationFramework, Generator, JinjaTemplate, LlmPipeline, Pipeline, PipelineKind,
    PipelineTest, PromptTemplate, RagPipeline, RunOutcome,
};
use normbench_providers::{
    CompletionClient, CompletionConfig, EmbeddingModel, GenerationModel, LlmModel, OllamaConfig,
    OllamaEmbedder,
};
use normbench_state::{SurrealVocabulary, TerminologySession, VectorSearch, VocabularyTerm};

use crate::config::{BenchConfig, EmbeddingSection, GenerationSection, VocabularyFile};

/// Terms embedded per request while indexing the vocabulary.
const INGEST_BATCH: usize = 64;

#[derive(Parser)]
#[command(name = "normbench")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Benchmark harness for LLM term normalisation", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a benchmark file
    Run {
        /// Path to the benchmark definition (TOML)
        config: PathBuf,

        /// Write the run artifact here instead of harness.results_path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List embedding models and generation models
    Models,

    /// Print the summary of a saved run artifact
    Summary {
        /// Path to a run artifact (JSON)
        artifact: PathBuf,
    },

    /// Compare two saved run artifacts
    Compare {
        /// Baseline run artifact
        a: PathBuf,

        /// Candidate run artifact
        b: PathBuf,

        /// Output format of the comparison
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    normbench_core::telemetry::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run { config, output } => cmd_run(&config, output.as_deref()).await,
        Commands::Models => cmd_models(),
        Commands::Summary { artifact } => cmd_summary(&artifact),
        Commands::Compare { a, b, format } => cmd_compare(&a, &b, format),
    }
}

/// Run a benchmark end to end
async fn cmd_run(path: &Path, output: Option<&Path>) -> Result<()> {
    let mut config = BenchConfig::load(path)?;
    if let Some(output) = output {
        config.harness.results_path = Some(output.to_path_buf());
    }

    let generation = completion_client(&config.generation)?;
    let embedder = config
        .embedding
        .as_ref()
        .map(embedding_client)
        .transpose()?;

    let store = match &config.vocabulary {
        Some(_) => Some(Arc::new(
            SurrealVocabulary::setup_from_env()
                .await
                .context("Failed to connect to vocabulary store")?,
        )),
        None => None,
    };

    let outcome = execute_run(&config, generation, embedder, store).await?;

    println!("{}", render_summary_md(&outcome.artifact));
    if let Some(path) = &outcome.persisted_to {
        println!("Results written to {}", path.display());
    }
    Ok(())
}

fn completion_client(section: &GenerationSection) -> Result<Arc<dyn GenerationModel>> {
    let mut config = CompletionConfig::from_env(section.model.as_str());
    if let Some(url) = &section.base_url {
        config.base_url = url.trim_end_matches('/').to_string();
    }
    let client = CompletionClient::new(config).context("Failed to build completion client")?;
    Ok(Arc::new(client))
}

fn embedding_client(section: &EmbeddingSection) -> Result<Arc<dyn EmbeddingModel>> {
    let descriptor = registry::describe(&section.model)?;
    let model = section
        .ollama_model
        .as_deref()
        .unwrap_or(descriptor.source_path);

    let mut config = OllamaConfig::from_env(model, descriptor.dimensions);
    if let Some(url) = &section.base_url {
        config.base_url = url.trim_end_matches('/').to_string();
    }
    let client = OllamaEmbedder::new(config).context("Failed to build embedding client")?;
    Ok(Arc::new(client))
}

/// Build every pipeline test from `config` and run the harness.
#[instrument(skip_all, fields(run = %config.run.name))]
async fn execute_run(
    config: &BenchConfig,
    generation: Arc<dyn GenerationModel>,
    embedder: Option<Arc<dyn EmbeddingModel>>,
    store: Option<Arc<SurrealVocabulary>>,
) -> Result<RunOutcome> {
    let mut templates: BTreeMap<&str, Arc<dyn PromptTemplate>> = BTreeMap::new();
    for (name, path) in &config.templates {
        let template = JinjaTemplate::from_file(path)
            .with_context(|| format!("Failed to load template {}", name))?;
        templates.insert(name.as_str(), Arc::new(template));
    }

    if let (Some(section), Some(embedder)) = (&config.embedding, &embedder) {
        let descriptor = registry::describe(&section.model)?;
        if embedder.dimensions() != descriptor.dimensions {
            bail!(
                "Embedding model {} produces {} dimensions, registry declares {}",
                embedder.model_id(),
                embedder.dimensions(),
                descriptor.dimensions
            );
        }
    }

    if let (Some(vocabulary), Some(store)) = (&config.vocabulary, &store) {
        let embedder = embedder
            .as_ref()
            .context("[embedding] is required to index the vocabulary")?;
        let file = VocabularyFile::load(&vocabulary.path)?;
        ingest_vocabulary(store, embedder.as_ref(), &file).await?;
    }

    let session = store
        .clone()
        .map(|s| s as Arc<dyn TerminologySession>);
    let cache = EmbeddingCache::new();
    let eot_token = config.generation.model.eot_token().unwrap_or_default();

    let mut tests = Vec::with_capacity(config.tests.len());
    for test in &config.tests {
        let template = templates
            .get(test.template.as_str())
            .cloned()
            .with_context(|| format!("Undefined template {}", test.template))?;

        let generator = Generator::new(generation.clone(), template)
            .with_eot_token(eot_token)
            .with_max_tokens(config.generation.max_tokens);

        let pipeline: Arc<dyn Pipeline> = match test.kind {
            PipelineKind::Llm => Arc::new(LlmPipeline::new(generator)?),
            PipelineKind::Rag => {
                let embedder = embedder
                    .clone()
                    .with_context(|| format!("Test {} needs [embedding]", test.name))?;
                let search: Arc<dyn VectorSearch> = store
                    .clone()
                    .with_context(|| format!("Test {} needs [vocabulary]", test.name))?;
                Arc::new(
                    RagPipeline::new(generator, embedder, search)?
                        .with_config(test.rag_config())
                        .with_cache(cache.clone()),
                )
            }
        };

        let metrics = test
            .metrics
            .iter()
            .map(|kind| kind.build(session.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        tests.push(PipelineTest::new(&test.name, pipeline, metrics));
    }

    let mut framework = EvaluationFramework::new(
        &config.run.name,
        &config.run.description,
        Arc::new(config.dataset()),
        tests,
    )
    .with_config(config.harness_config());
    if let Some(path) = &config.harness.results_path {
        framework = framework.with_results_path(path);
    }

    Ok(framework.run().await?)
}

/// Embed and store the vocabulary unless the store already holds terms.
#[instrument(skip_all, fields(terms = file.terms.len()))]
async fn ingest_vocabulary(
    store: &SurrealVocabulary,
    embedder: &dyn EmbeddingModel,
    file: &VocabularyFile,
) -> Result<()> {
    let existing = store.term_count().await?;
    if existing > 0 {
        info!(existing, "Vocabulary already indexed, skipping ingestion");
        return Ok(());
    }

    for chunk in file.terms.chunks(INGEST_BATCH) {
        let names: Vec<String> = chunk.iter().map(|t| t.name.clone()).collect();
        let vectors = embedder
            .embed_batch(&names)
            .await
            .context("Failed to embed vocabulary terms")?;

        let terms: Vec<VocabularyTerm> = chunk
            .iter()
            .zip(vectors)
            .map(|(entry, embedding)| {
                let term = VocabularyTerm::new(&entry.concept_id, &entry.name, embedding);
                match &entry.vocabulary_id {
                    Some(vocabulary) => term.with_vocabulary(vocabulary),
                    None => term,
                }
            })
            .collect();
        store.insert_terms(&terms).await?;
    }

    try_join_all(file.relationships.iter().map(|r| store.insert_relationship(r))).await?;
    try_join_all(file.ancestors.iter().map(|a| store.insert_ancestor(a))).await?;

    info!(
        terms = file.terms.len(),
        relationships = file.relationships.len(),
        ancestors = file.ancestors.len(),
        "Vocabulary indexed"
    );
    Ok(())
}

/// List embedding models and generation models
fn cmd_models() -> Result<()> {
    println!("Embedding models:");
    for d in registry::all() {
        println!(
            "  {:<40} {:>5}  {}",
            d.symbolic_name, d.dimensions, d.source_path
        );
    }

    println!();
    println!("Generation models:");
    for model in LlmModel::ALL {
        match model.eot_token() {
            Some(token) => println!("  {:<24} eot {}", model.as_str(), token),
            None => println!("  {}", model.as_str()),
        }
    }
    Ok(())
}

/// Print the summary of a saved run
fn cmd_summary(path: &Path) -> Result<()> {
    let artifact = read_run_json(path)?;
    println!("{}", render_summary_md(&artifact));
    Ok(())
}

/// Compare two saved runs
fn cmd_compare(a: &Path, b: &Path, format: OutputFormat) -> Result<()> {
    let left = read_run_json(a)?;
    let right = read_run_json(b)?;
    let comparison = compare(&left, &right)
        .with_context(|| format!("Runs {:?} and {:?} are not comparable", a, b))?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&comparison)?);
    } else {
        println!("{}", render_comparison_md(&comparison));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use normbench_core::{FailureStage, RunStatus};
    use normbench_providers::fakes::{HashEmbedder, ScriptedGenerator};

    const VOCAB: &str = r#"{
        "terms": [
            {"concept_id": "1125315", "name": "Acetaminophen"},
            {"concept_id": "1125360", "name": "Tylenol"},
            {"concept_id": "1177480", "name": "Ibuprofen"},
            {"concept_id": "1177481", "name": "Advil"}
        ],
        "relationships": [
            {"concept_id_1": "1125360", "concept_id_2": "1125315", "relationship_id": "Brand name of"},
            {"concept_id_1": "1177481", "concept_id_2": "1177480", "relationship_id": "Brand name of"}
        ]
    }"#;

    const BENCH: &str = r#"
[run]
name = "cli-smoke"
description = "plain vs rag"

[dataset]
path = "meds.csv"

[harness]
results_path = "out/run.json"

[generation]
model = "llama-3.1-8b"

[embedding]
model = "BGESMALL"

[vocabulary]
path = "vocab.json"

[templates]
plain = "plain.j2"
rag = "rag.j2"

[[tests]]
name = "llm"
kind = "llm"
template = "plain"
metrics = ["uncased_match", "related_name_uncased_match"]

[[tests]]
name = "rag"
kind = "rag"
template = "rag"
top_k = 2
metrics = ["uncased_match", "related_name_uncased_match"]
"#;

    fn write_bench(dir: &Path) -> PathBuf {
        std::fs::write(dir.join("meds.csv"), "input,expected\nTylenol,Acetaminophen\nAdvil,Ibuprofen\n").unwrap();
        std::fs::write(dir.join("vocab.json"), VOCAB).unwrap();
        std::fs::write(dir.join("plain.j2"), "Input: {{ informal_name }}{{ eot_token }}").unwrap();
        std::fs::write(
            dir.join("rag.j2"),
            "{% for r in vec_results %}- {{ r.content }}\n{% endfor %}Input: {{ informal_name }}{{ eot_token }}",
        )
        .unwrap();
        let path = dir.join("bench.toml");
        std::fs::write(&path, BENCH).unwrap();
        path
    }

    fn model() -> Arc<ScriptedGenerator> {
        Arc::new(
            ScriptedGenerator::new("stub")
                .respond_when("Input: Tylenol", "Tylenol")
                .respond_when("Input: Advil", "Ibuprofen"),
        )
    }

    #[tokio::test]
    async fn test_execute_run_builds_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let config = BenchConfig::load(&write_bench(dir.path())).unwrap();
        let store = Arc::new(SurrealVocabulary::setup_db().await.unwrap());
        let generator = model();

        let outcome = execute_run(
            &config,
            generator.clone(),
            Some(Arc::new(HashEmbedder::new(384))),
            Some(store.clone()),
        )
        .await
        .unwrap();

        assert_eq!(store.term_count().await.unwrap(), 4);
        assert_eq!(outcome.run().status, RunStatus::Completed);
        assert_eq!(outcome.run().results.len(), 8);

        let llm = outcome.artifact.summary.pipeline("llm").unwrap();
        assert_eq!(llm.metric_means[0].mean, Some(0.5));
        assert_eq!(llm.metric_means[1].mean, Some(1.0));

        // llama-3.1 end-of-turn token reaches the prompt and the stop list
        assert!(generator.prompts()[0].ends_with("<|eot_id|>"));
        assert_eq!(generator.params()[0].stop, vec!["<|eot_id|>"]);

        let persisted = outcome.persisted_to.clone().unwrap();
        assert_eq!(persisted, dir.path().join("out/run.json"));
        cmd_summary(&persisted).unwrap();
        cmd_compare(&persisted, &persisted, OutputFormat::Json).unwrap();
    }

    #[tokio::test]
    async fn test_existing_vocabulary_not_reindexed() {
        let dir = tempfile::tempdir().unwrap();
        let config = BenchConfig::load(&write_bench(dir.path())).unwrap();
        let store = Arc::new(SurrealVocabulary::setup_db().await.unwrap());
        let embedder = HashEmbedder::new(384);
        let file = VocabularyFile::load(&dir.path().join("vocab.json")).unwrap();

        ingest_vocabulary(&store, &embedder, &file).await.unwrap();
        ingest_vocabulary(&store, &embedder, &file).await.unwrap();
        assert_eq!(store.term_count().await.unwrap(), 4);

        let outcome = execute_run(&config, model(), Some(Arc::new(embedder)), Some(store.clone()))
            .await
            .unwrap();
        assert_eq!(store.term_count().await.unwrap(), 4);
        assert!(outcome.run().results.iter().all(|r| r.failure.is_none()));
    }

    #[tokio::test]
    async fn test_embedder_width_must_match_registry() {
        let dir = tempfile::tempdir().unwrap();
        let config = BenchConfig::load(&write_bench(dir.path())).unwrap();
        let store = Arc::new(SurrealVocabulary::setup_db().await.unwrap());

        let err = execute_run(&config, model(), Some(Arc::new(HashEmbedder::new(16))), Some(store))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("384"));
    }

    #[tokio::test]
    async fn test_unreachable_generation_server_fails_rows_not_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = BenchConfig::load(&write_bench(dir.path())).unwrap();
        config.generation.base_url = Some("http://127.0.0.1:9".to_string());
        config.harness.results_path = None;
        let store = Arc::new(SurrealVocabulary::setup_db().await.unwrap());

        let outcome = execute_run(
            &config,
            completion_client(&config.generation).unwrap(),
            Some(Arc::new(HashEmbedder::new(384))),
            Some(store),
        )
        .await
        .unwrap();

        assert_eq!(outcome.run().status, RunStatus::CompletedWithFailures);
        assert!(outcome.persisted_to.is_none());
        for r in &outcome.run().results {
            assert_eq!(r.failure.as_ref().unwrap().stage, FailureStage::Generation);
        }
    }

    #[test]
    fn test_compare_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(cmd_compare(&missing, &missing, OutputFormat::Markdown).is_err());
        assert!(cmd_summary(&missing).is_err());
    }

    #[test]
    fn test_log_format_and_compare_format_are_independent() {
        let cli = Cli::try_parse_from(["normbench", "--json", "compare", "a.json", "b.json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Commands::Compare { format: OutputFormat::Markdown, .. }
        ));

        let cli = Cli::try_parse_from(["normbench", "compare", "a.json", "b.json", "--format", "json"])
            .unwrap();
        assert!(!cli.json);
        assert!(matches!(
            cli.command,
            Commands::Compare { format: OutputFormat::Json, .. }
        ));
    }

    #[test]
    fn test_models_lists_registry() {
        cmd_models().unwrap();
        assert!(registry::describe("BGESMALL").is_ok());
    }
}
