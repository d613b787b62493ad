//! SurrealDB vocabulary store - connection and operations
//!
//! Manages connection and provides:
//! - term ingestion (name + embedding)
//! - cosine top-k search (`VectorSearch`)
//! - relationship / ancestor lookups (`TerminologySession`)
//!
//! Supports both local (in-memory) and cloud (WebSocket) connections.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

use crate::error::StateError;
use crate::schema::{name_key, ConceptAncestor, ConceptRelationship, VocabularyTerm};
use crate::storage_traits::{ScoredTerm, StorageResult, TerminologySession, VectorSearch};
use crate::Result;

const DEFAULT_NAMESPACE: &str = "normbench";
const DEFAULT_DATABASE: &str = "vocab";

/// Configuration for SurrealDB Cloud connection
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// WebSocket endpoint URL (e.g., "wss://xxx.aws-use1.surrealdb.cloud")
    pub endpoint: String,
    /// Database username
    pub username: String,
    /// Database password
    pub password: String,
    /// Namespace (default: "normbench")
    pub namespace: String,
    /// Database name (default: "vocab")
    pub database: String,
    /// Whether this is a root user (true) or database user (false)
    pub is_root: bool,
}

impl CloudConfig {
    /// Create a new cloud configuration for a database user
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            is_root: false,
        }
    }

    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    pub fn with_root(mut self, is_root: bool) -> Self {
        self.is_root = is_root;
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - SURREALDB_ENDPOINT (required)
    /// - SURREALDB_USERNAME (required)
    /// - SURREALDB_PASSWORD (required)
    /// - SURREALDB_NAMESPACE (optional, default: "normbench")
    /// - SURREALDB_DATABASE (optional, default: "vocab")
    /// - SURREALDB_ROOT (optional, default: "false") - set to "true" for root users
    pub fn from_env() -> std::result::Result<Self, String> {
        let endpoint =
            std::env::var("SURREALDB_ENDPOINT").map_err(|_| "SURREALDB_ENDPOINT not set")?;
        let username =
            std::env::var("SURREALDB_USERNAME").map_err(|_| "SURREALDB_USERNAME not set")?;
        let password =
            std::env::var("SURREALDB_PASSWORD").map_err(|_| "SURREALDB_PASSWORD not set")?;
        let namespace = std::env::var("SURREALDB_NAMESPACE")
            .unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string());
        let database =
            std::env::var("SURREALDB_DATABASE").unwrap_or_else(|_| DEFAULT_DATABASE.to_string());
        let is_root = std::env::var("SURREALDB_ROOT")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);

        Ok(Self {
            endpoint,
            username,
            password,
            namespace,
            database,
            is_root,
        })
    }
}

/// Stored form of a term; `seq` pins insertion order for score ties.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbTerm {
    concept_id: String,
    name: String,
    name_key: String,
    vocabulary_id: Option<String>,
    embedding: Vec<f32>,
    seq: i64,
}

/// SurrealDB-backed reference vocabulary
#[derive(Clone)]
pub struct SurrealVocabulary {
    db: Surreal<Any>,
}

impl SurrealVocabulary {
    /// Connect to SurrealDB in-memory and set up schema
    #[instrument(skip_all)]
    pub async fn setup_db() -> Result<Self> {
        info!("Connecting to SurrealDB (in-memory)");

        let db = surrealdb::engine::any::connect("mem://")
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        db.use_ns(DEFAULT_NAMESPACE)
            .use_db(DEFAULT_DATABASE)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        let store = SurrealVocabulary { db };
        store.init_schema().await?;

        info!("SurrealDB connected and schema initialized");
        Ok(store)
    }

    /// Connect to SurrealDB Cloud
    #[instrument(skip(config), fields(endpoint = %config.endpoint, namespace = %config.namespace, database = %config.database))]
    pub async fn setup_cloud(config: CloudConfig) -> Result<Self> {
        info!("Connecting to SurrealDB Cloud (root={})", config.is_root);

        let db = surrealdb::engine::any::connect(&config.endpoint)
            .await
            .map_err(|e| {
                StateError::Connection(format!("Failed to connect to {}: {}", config.endpoint, e))
            })?;

        if config.is_root {
            db.signin(Root {
                username: &config.username,
                password: &config.password,
            })
            .await
            .map_err(|e| StateError::Connection(format!("Root authentication failed: {}", e)))?;
        } else {
            db.signin(Database {
                namespace: &config.namespace,
                database: &config.database,
                username: &config.username,
                password: &config.password,
            })
            .await
            .map_err(|e| {
                StateError::Connection(format!("Database authentication failed: {}", e))
            })?;
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .map_err(|e| {
                StateError::Connection(format!("Failed to select namespace/database: {}", e))
            })?;

        let store = SurrealVocabulary { db };
        store.init_schema().await?;

        info!("SurrealDB Cloud connected and schema initialized");
        Ok(store)
    }

    /// Connect using environment variables
    ///
    /// If SURREALDB_ENDPOINT is set, connects to cloud.
    /// If SURREALDB_URL is set, connects to that URL.
    /// Otherwise, falls back to in-memory.
    #[instrument(skip_all)]
    pub async fn setup_from_env() -> Result<Self> {
        if let Ok(config) = CloudConfig::from_env() {
            info!("Cloud config found, connecting to SurrealDB Cloud");
            return Self::setup_cloud(config).await;
        }

        if let Ok(url) = std::env::var("SURREALDB_URL") {
            info!("SURREALDB_URL found, connecting to {}", url);
            let db = surrealdb::engine::any::connect(&url)
                .await
                .map_err(|e| StateError::Connection(e.to_string()))?;

            db.use_ns(DEFAULT_NAMESPACE)
                .use_db(DEFAULT_DATABASE)
                .await
                .map_err(|e| StateError::Connection(e.to_string()))?;

            let store = SurrealVocabulary { db };
            store.init_schema().await?;
            return Ok(store);
        }

        info!("No cloud config found, using in-memory database");
        Self::setup_db().await
    }

    async fn init_schema(&self) -> Result<()> {
        debug!("Initializing vocabulary schema");

        let schema = r#"
            -- Reference terms with name embeddings
            DEFINE TABLE IF NOT EXISTS terms SCHEMAFULL;
            DEFINE FIELD IF NOT EXISTS concept_id ON terms TYPE string;
            DEFINE FIELD IF NOT EXISTS name ON terms TYPE string;
            DEFINE FIELD IF NOT EXISTS name_key ON terms TYPE string;
            DEFINE FIELD IF NOT EXISTS vocabulary_id ON terms TYPE option<string>;
            DEFINE FIELD IF NOT EXISTS embedding ON terms TYPE array<float>;
            DEFINE FIELD IF NOT EXISTS seq ON terms TYPE int;
            DEFINE INDEX IF NOT EXISTS idx_term_name_key ON terms FIELDS name_key;
            DEFINE INDEX IF NOT EXISTS idx_term_seq ON terms FIELDS seq;

            -- Direct concept relations
            DEFINE TABLE IF NOT EXISTS relationships SCHEMAFULL;
            DEFINE FIELD IF NOT EXISTS concept_id_1 ON relationships TYPE string;
            DEFINE FIELD IF NOT EXISTS concept_id_2 ON relationships TYPE string;
            DEFINE FIELD IF NOT EXISTS relationship_id ON relationships TYPE string;
            DEFINE INDEX IF NOT EXISTS idx_rel_1 ON relationships FIELDS concept_id_1;
            DEFINE INDEX IF NOT EXISTS idx_rel_2 ON relationships FIELDS concept_id_2;

            -- Hierarchy closure
            DEFINE TABLE IF NOT EXISTS ancestors SCHEMAFULL;
            DEFINE FIELD IF NOT EXISTS ancestor_concept_id ON ancestors TYPE string;
            DEFINE FIELD IF NOT EXISTS descendant_concept_id ON ancestors TYPE string;
            DEFINE FIELD IF NOT EXISTS min_levels_of_separation ON ancestors TYPE int;
            DEFINE INDEX IF NOT EXISTS idx_anc_desc ON ancestors FIELDS descendant_concept_id;
        "#;

        self.db
            .query(schema)
            .await
            .map_err(|e| StateError::SchemaSetup(e.to_string()))?
            .check()
            .map_err(|e| StateError::SchemaSetup(e.to_string()))?;

        debug!("Schema initialized successfully");
        Ok(())
    }

    // ========== Term Operations ==========

    /// Insert terms in order; later searches break score ties by this order.
    #[instrument(skip(self, terms), fields(count = terms.len()))]
    pub async fn insert_terms(&self, terms: &[VocabularyTerm]) -> Result<()> {
        let mut seq = self.term_count().await? as i64;

        // an empty store takes its width from the first term of the batch
        let width = match self.stored_dimensions().await? {
            Some(width) => Some(width),
            None => terms.first().map(|t| t.embedding.len()),
        };
        if let Some(width) = width {
            if let Some(bad) = terms.iter().find(|t| t.embedding.len() != width) {
                return Err(StateError::DimensionMismatch {
                    expected: width,
                    actual: bad.embedding.len(),
                });
            }
        }

        for term in terms {
            let record = DbTerm {
                concept_id: term.concept_id.clone(),
                name: term.name.clone(),
                name_key: name_key(&term.name),
                vocabulary_id: term.vocabulary_id.clone(),
                embedding: term.embedding.clone(),
                seq,
            };
            let created: Option<DbTerm> = self.db.create("terms").content(record).await?;
            created.ok_or_else(|| {
                StateError::Transaction(format!("Failed to create term {}", term.concept_id))
            })?;
            seq += 1;
        }

        info!("Inserted {} terms", terms.len());
        Ok(())
    }

    #[instrument(skip(self, relationship))]
    pub async fn insert_relationship(&self, relationship: &ConceptRelationship) -> Result<()> {
        let created: Option<ConceptRelationship> = self
            .db
            .create("relationships")
            .content(relationship.clone())
            .await?;
        created.ok_or_else(|| StateError::Transaction("Failed to create relationship".into()))?;
        Ok(())
    }

    #[instrument(skip(self, ancestor))]
    pub async fn insert_ancestor(&self, ancestor: &ConceptAncestor) -> Result<()> {
        let created: Option<ConceptAncestor> = self
            .db
            .create("ancestors")
            .content(ancestor.clone())
            .await?;
        created.ok_or_else(|| StateError::Transaction("Failed to create ancestor".into()))?;
        Ok(())
    }

    /// Number of stored terms
    pub async fn term_count(&self) -> Result<usize> {
        let mut result = self
            .db
            .query("SELECT count() AS total FROM terms GROUP ALL")
            .await?;

        #[derive(Deserialize)]
        struct CountRow {
            total: i64,
        }

        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.first().map(|r| r.total.max(0) as usize).unwrap_or(0))
    }

    /// Embedding width of the stored terms, `None` when the store is empty.
    async fn stored_dimensions(&self) -> Result<Option<usize>> {
        let mut result = self
            .db
            .query("SELECT VALUE array::len(embedding) FROM terms LIMIT 1")
            .await?;
        let widths: Vec<i64> = result.take(0)?;
        Ok(widths.first().map(|w| (*w).max(0) as usize))
    }

    async fn concept_ids(&self, name: &str) -> Result<Vec<String>> {
        let mut result = self
            .db
            .query("SELECT VALUE concept_id FROM terms WHERE name_key = $key")
            .bind(("key", name_key(name)))
            .await?;
        let ids: Vec<String> = result.take(0)?;
        Ok(ids)
    }
}

#[async_trait]
impl VectorSearch for SurrealVocabulary {
    #[instrument(skip(self, vector), fields(dims = vector.len(), top_k))]
    async fn search(&self, vector: &[f32], top_k: usize) -> StorageResult<Vec<ScoredTerm>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        match self.stored_dimensions().await? {
            None => return Ok(Vec::new()),
            Some(width) if width != vector.len() => {
                return Err(StateError::DimensionMismatch {
                    expected: width,
                    actual: vector.len(),
                });
            }
            Some(_) => {}
        }

        let sql = format!(
            "SELECT name AS content, vector::similarity::cosine(embedding, $vector) AS score, seq \
             FROM terms ORDER BY score DESC, seq ASC LIMIT {}",
            top_k
        );

        let mut result = self
            .db
            .query(sql)
            .bind(("vector", vector.to_vec()))
            .await?;

        #[derive(Deserialize)]
        struct Hit {
            content: String,
            score: f64,
        }

        let hits: Vec<Hit> = result.take(0)?;
        debug!("search returned {} hits", hits.len());
        Ok(hits
            .into_iter()
            .map(|h| ScoredTerm {
                content: h.content,
                score: h.score,
            })
            .collect())
    }
}

#[async_trait]
impl TerminologySession for SurrealVocabulary {
    #[instrument(skip(self))]
    async fn is_related(&self, a: &str, b: &str) -> StorageResult<bool> {
        let ids_a = self.concept_ids(a).await?;
        let ids_b = self.concept_ids(b).await?;
        if ids_a.is_empty() || ids_b.is_empty() {
            return Ok(false);
        }

        let mut result = self
            .db
            .query(
                "SELECT VALUE relationship_id FROM relationships \
                 WHERE (concept_id_1 INSIDE $a AND concept_id_2 INSIDE $b) \
                 OR (concept_id_1 INSIDE $b AND concept_id_2 INSIDE $a) LIMIT 1",
            )
            .bind(("a", ids_a))
            .bind(("b", ids_b))
            .await?;
        let hits: Vec<String> = result.take(0)?;
        Ok(!hits.is_empty())
    }

    #[instrument(skip(self))]
    async fn is_ancestor(&self, a: &str, b: &str) -> StorageResult<bool> {
        let ancestors = self.concept_ids(a).await?;
        let descendants = self.concept_ids(b).await?;
        if ancestors.is_empty() || descendants.is_empty() {
            return Ok(false);
        }

        let mut result = self
            .db
            .query(
                "SELECT VALUE ancestor_concept_id FROM ancestors \
                 WHERE ancestor_concept_id INSIDE $anc AND descendant_concept_id INSIDE $desc LIMIT 1",
            )
            .bind(("anc", ancestors))
            .bind(("desc", descendants))
            .await?;
        let hits: Vec<String> = result.take(0)?;
        Ok(!hits.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_surreal_connection_and_schema_creation() {
        let store = SurrealVocabulary::setup_db().await;
        assert!(store.is_ok(), "Failed to connect: {:?}", store.err());
    }

    #[tokio::test]
    async fn test_term_count_tracks_inserts() {
        let store = SurrealVocabulary::setup_db().await.unwrap();
        assert_eq!(store.term_count().await.unwrap(), 0);

        store
            .insert_terms(&[
                VocabularyTerm::new("1", "Acetaminophen", vec![1.0, 0.0]),
                VocabularyTerm::new("2", "Ibuprofen", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        assert_eq!(store.term_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_insert_rejects_mixed_dimensions() {
        let store = SurrealVocabulary::setup_db().await.unwrap();
        store
            .insert_terms(&[VocabularyTerm::new("1", "a", vec![1.0, 0.0])])
            .await
            .unwrap();

        let err = store
            .insert_terms(&[VocabularyTerm::new("2", "b", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StateError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[tokio::test]
    async fn test_first_batch_rejects_mixed_dimensions() {
        let store = SurrealVocabulary::setup_db().await.unwrap();

        let err = store
            .insert_terms(&[
                VocabularyTerm::new("1", "a", vec![1.0, 0.0]),
                VocabularyTerm::new("2", "b", vec![1.0, 0.0, 0.0]),
            ])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StateError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
        assert_eq!(store.term_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_search_on_empty_store_is_empty() {
        let store = SurrealVocabulary::setup_db().await.unwrap();
        let hits = store.search(&[1.0, 0.0], 5).await.unwrap();
        assert!(hits.is_empty());
    }
}
