//! Query-time retrieval: embed the query, search the store, format context.

use std::sync::{Arc, RwLock};

use super::embedder::Embedder;
use super::store::{SearchResult, VectorStore};

/// Retrieves relevant chunks for a query and renders them as model context.
pub struct Retriever<E: Embedder> {
    embedder: E,
    store: Arc<RwLock<VectorStore>>,
}

impl<E: Embedder> Retriever<E> {
    /// Pair an embedder with a shared store.
    pub fn new(embedder: E, store: Arc<RwLock<VectorStore>>) -> Self {
        Self { embedder, store }
    }

    /// Embed `query` and return the `top_k` most similar chunks scoring at
    /// least `threshold`.
    pub fn retrieve(&self, query: &str, top_k: usize, threshold: f32) -> Vec<SearchResult> {
        let embedding = self.embedder.embed(query);
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());
        store.search(&embedding, top_k, threshold)
    }

    /// Access to the embedder, for ingestion paths that share it.
    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Render results as a source-tagged context block. With `max_length`
    /// set, stops before exceeding it, partially including the boundary
    /// chunk when at least 100 characters remain.
    pub fn format_context(results: &[SearchResult], max_length: Option<usize>) -> String {
        if results.is_empty() {
            return "No relevant documents found.".to_string();
        }

        let mut parts = Vec::new();
        let mut total = 0;

        for result in results {
            let chunk_text = format!(
                "[Source: {}, Chunk {}]\n{}",
                result.document.source_file, result.document.chunk_index, result.document.content
            );
            let len = chunk_text.chars().count();

            if let Some(max) = max_length {
                if total + len > max {
                    let remaining = max.saturating_sub(total);
                    if remaining > 100 {
                        let partial: String = chunk_text.chars().take(remaining).collect();
                        parts.push(format!("{partial}..."));
                    }
                    break;
                }
            }

            parts.push(chunk_text);
            total += len + 2;
        }

        parts.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::trust::SourceMetadata;
    use crate::rag::embedder::HashEmbedder;

    fn seeded_retriever() -> Retriever<HashEmbedder> {
        let embedder = HashEmbedder::new(64);
        let mut store = VectorStore::in_memory(64);

        let docs = [
            ("solar panels convert sunlight into electricity", "energy.txt", 0),
            ("wind turbines generate power from moving air", "energy.txt", 1),
            ("sourdough bread needs a fermented starter", "baking.txt", 0),
        ];
        for (content, source, idx) in docs {
            let embedding = embedder.embed(content);
            store
                .add(content, source, idx, SourceMetadata::default(), embedding)
                .unwrap();
        }

        Retriever::new(embedder, Arc::new(RwLock::new(store)))
    }

    #[test]
    fn test_retrieve_ranks_by_similarity() {
        let retriever = seeded_retriever();
        let results = retriever.retrieve("solar panels and sunlight electricity", 3, -1.0);

        assert!(!results.is_empty());
        assert_eq!(results[0].document.source_file, "energy.txt");
        assert!(results[0].document.content.contains("solar"));
    }

    #[test]
    fn test_retrieve_respects_top_k() {
        let retriever = seeded_retriever();
        assert!(retriever.retrieve("power", 1, -1.0).len() <= 1);
    }

    #[test]
    fn test_format_context_tags_sources() {
        let retriever = seeded_retriever();
        let results = retriever.retrieve("solar", 2, -1.0);
        let context = Retriever::<HashEmbedder>::format_context(&results, None);

        assert!(context.contains("[Source: "));
        assert!(context.contains("Chunk "));
    }

    #[test]
    fn test_format_context_empty() {
        let context = Retriever::<HashEmbedder>::format_context(&[], None);
        assert_eq!(context, "No relevant documents found.");
    }

    #[test]
    fn test_format_context_budget() {
        let retriever = seeded_retriever();
        let results = retriever.retrieve("power generation", 3, -1.0);
        let context = Retriever::<HashEmbedder>::format_context(&results, Some(120));

        assert!(context.chars().count() <= 130);
    }
}
