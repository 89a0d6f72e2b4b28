//! Server state shared across handlers.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use super::config::ServerConfig;
use crate::config::Config;
use crate::error::Result;
use crate::pipeline::{GuardSet, RagPipeline};
use crate::rag::{OllamaClient, VectorStore};

/// Application state shared across handlers
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// The guarded/unguarded pipeline
    pub pipeline: RagPipeline<OllamaClient>,
    /// Ollama connectivity probe, separate from the pipeline's backend
    pub ollama: OllamaClient,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Build the full application state: vector store and security log
    /// under the configured data directory, Ollama backend from config.
    pub fn new(app_config: Config, config: ServerConfig) -> Result<Self> {
        let data_dir = app_config.resolve_data_dir();

        let guards = Arc::new(GuardSet::new(&app_config, data_dir.join("logs")));
        let store = Arc::new(RwLock::new(VectorStore::open(
            data_dir.join("store"),
            app_config.retrieval.embedding_dimension,
        )));

        let backend = OllamaClient::new(&app_config.ollama)?;
        let ollama = OllamaClient::new(&app_config.ollama)?;
        let pipeline = RagPipeline::new(app_config, backend, guards, store);

        Ok(Self {
            config,
            pipeline,
            ollama,
            start_time: Instant::now(),
        })
    }

    /// Get server uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}
