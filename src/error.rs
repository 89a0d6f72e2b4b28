//! RagShield error types.
//!
//! Guard decisions (blocked input, sanitized output) are never errors: every
//! guard returns a result value, even "nothing found". Only infrastructure
//! failures (storage I/O, network, config) surface as `RagError`, and the
//! orchestrator converts them into well-defined responses instead of leaking
//! internal detail to the caller.

use thiserror::Error;

/// RagShield errors.
#[derive(Error, Debug)]
pub enum RagError {
    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// Request rejected before entering the pipeline (empty query, bad params).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generation backend unreachable or failing.
    ///
    /// Kept distinct from generic failures so the API layer can answer
    /// with a service-unavailable response.
    #[error("LLM backend unavailable: {0}")]
    LlmUnavailable(String),

    /// Embedding computation failed.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Vector store operation failed.
    #[error("Store error: {0}")]
    Store(String),

    /// Server-side error.
    #[error("Server error: {0}")]
    Server(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for RagShield operations
pub type Result<T> = std::result::Result<T, RagError>;

impl From<reqwest::Error> for RagError {
    fn from(err: reqwest::Error) -> Self {
        RagError::LlmUnavailable(err.to_string())
    }
}

impl From<toml::de::Error> for RagError {
    fn from(err: toml::de::Error) -> Self {
        RagError::Config(err.to_string())
    }
}
