//! Retrieval-augmented generation collaborators.
//!
//! These are the deliberately small pieces the guardrail pipeline sits
//! between: chunking and embedding at ingestion, vector search at query
//! time, and a generation backend behind the [`LlmBackend`] seam.

pub mod chunker;
pub mod embedder;
pub mod llm;
pub mod retriever;
pub mod store;

pub use chunker::{TextChunk, TextChunker};
pub use embedder::{Embedder, HashEmbedder};
pub use llm::{LlmBackend, OllamaClient};
pub use retriever::Retriever;
pub use store::{SearchResult, StoredDocument, VectorStore};
