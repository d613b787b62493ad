//! Error types for normbench-providers

use thiserror::Error;

/// Errors raised by generation and embedding providers
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Request exceeded the client timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Server answered with a non-success status
    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Embedding width differs from the model's declared dimensions
    #[error("Embedding dimension mismatch for {model}: expected {expected}, got {actual}")]
    DimensionMismatch {
        model: String,
        expected: usize,
        actual: usize,
    },

    /// Provider cannot serve requests
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// Name not present in the LLM catalogue
    #[error("Unknown LLM model: {0}")]
    UnknownModel(String),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(err.to_string())
        } else if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::Http(err.to_string())
        }
    }
}
