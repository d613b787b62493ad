//! normbench-providers: model capabilities for normbench
//!
//! This crate defines what the benchmark needs from a generation model and an
//! embedding model, and ships HTTP clients for self-hosted inference servers.
//!
//! ## Key Components
//!
//! - `GenerationModel` / `EmbeddingModel`: capability traits
//! - `CompletionClient`: llama.cpp-style `/completion` client
//! - `OllamaEmbedder`: Ollama `/api/embed` client
//! - `LlmModel`: catalogue of addressable generation models
//! - `fakes`: deterministic providers for tests

mod catalogue;
mod completion;
mod error;
pub mod fakes;
mod ollama;
pub mod traits;

pub use catalogue::LlmModel;
pub use completion::{CompletionClient, CompletionConfig};
pub use error::ProviderError;
pub use ollama::{OllamaConfig, OllamaEmbedder};
pub use traits::{EmbeddingModel, GenerationModel, GenerationParams, DEFAULT_MAX_TOKENS};

/// Result type for provider operations
pub type Result<T> = std::result::Result<T, ProviderError>;
