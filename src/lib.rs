//! # RagShield - RAG Guardrails Pipeline
//!
//! Security layer for retrieval-augmented generation: every request can run
//! through a guarded pipeline (injection detection, document sanitization,
//! trust scoring, locked system prompt, output redaction, audit logging) or
//! a deliberately unguarded one, so the difference is observable side by
//! side.
//!
//! ## Guarded stage order
//!
//! ```text
//! query ──> InputGuard ──blocked──> refusal + INPUT_BLOCKED event
//!              │
//!              v
//!          Retriever ──> TrustScorer + DocumentSanitizer (per chunk)
//!              │
//!              v
//!      trust-budgeted context assembly
//!              │
//!              v
//!      locked system prompt ──> LLM backend
//!              │
//!              v
//!          OutputGuard ──> redacted or blocked answer
//! ```
//!
//! The unguarded path retrieves and generates with a permissive prompt and
//! no inspection. Both paths share the same store, embedder, and backend.
//!
//! ## Components
//!
//! - [`guard`]: the six guard stages plus the shared pattern matcher
//! - [`rag`]: chunker, embedder, vector store, retriever, LLM backend seam
//! - [`pipeline`]: [`pipeline::GuardSet`] and [`pipeline::RagPipeline`]
//! - [`server`]: axum JSON API over the pipeline
//! - [`config`]: layered TOML/env configuration

pub mod config;
pub mod error;
pub mod guard;
pub mod pipeline;
pub mod rag;
pub mod server;

// Re-export main types
pub use config::Config;
pub use error::{RagError, Result};
pub use guard::{
    DocumentSanitizer, InputGuard, OutputGuard, SecurityLogger, SystemPromptManager, TrustScorer,
};
pub use pipeline::{GuardSet, QueryOptions, RagPipeline, RagResponse};
pub use rag::{HashEmbedder, LlmBackend, OllamaClient, TextChunker, VectorStore};
pub use server::{AppState, ServerConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
