//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables (`RAGSHIELD_*`)
//!
//! Defaults are tuned for a local demo: Ollama on localhost, a small
//! embedding dimension, and guardrail thresholds matching the guard modules.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerSection,

    /// Ollama generation backend configuration
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// Retrieval and ingestion configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Guardrail thresholds and budgets
    #[serde(default)]
    pub guardrails: GuardrailConfig,

    /// Data directory for the vector store and security log
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| RagError::Config(format!("Failed to read config file: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| RagError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("RAGSHIELD_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("RAGSHIELD_PORT") {
            if let Ok(port) = port.parse() {
                config.server.port = port;
            }
        }
        if let Ok(url) = std::env::var("OLLAMA_BASE_URL") {
            config.ollama.base_url = url;
        }
        if let Ok(model) = std::env::var("OLLAMA_MODEL") {
            config.ollama.model = model;
        }
        if let Ok(dir) = std::env::var("RAGSHIELD_DATA_DIR") {
            config.data_dir = Some(PathBuf::from(dir));
        }

        config
    }

    /// Resolve the data directory, falling back to the platform default
    pub fn resolve_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("ragshield")
        })
    }
}

/// HTTP server section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl ServerSection {
    /// Get the full listen address
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Ollama generation backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Ollama server URL
    pub base_url: String,

    /// Model name to use
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum tokens to generate
    pub max_tokens: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "phi3:mini".to_string(),
            timeout_secs: 120,
            max_tokens: 1024,
        }
    }
}

/// Retrieval and ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of chunks to retrieve per query
    pub top_k: usize,

    /// Minimum similarity score for a retrieved chunk
    pub similarity_threshold: f32,

    /// Embedding vector dimension
    pub embedding_dimension: usize,

    /// Chunk size in characters
    pub chunk_size: usize,

    /// Overlap between adjacent chunks in characters
    pub chunk_overlap: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            similarity_threshold: 0.3,
            embedding_dimension: 384,
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

/// Guardrail thresholds and context budgets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailConfig {
    /// Average trust score at or above which the high-trust budget applies
    pub trust_threshold: f32,

    /// Context budget in characters for low-trust retrievals
    pub max_context_length: usize,

    /// Context budget in characters for high-trust retrievals
    pub max_context_length_high_trust: usize,

    /// Block model output on manipulation indicators
    pub strict_output: bool,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            trust_threshold: 0.6,
            max_context_length: 2000,
            max_context_length_high_trust: 4000,
            strict_output: true,
        }
    }
}
