//! Document vector store.
//!
//! Brute-force cosine search over normalized embeddings, documents keyed by
//! monotonically increasing ids. Embeddings persist alongside document
//! metadata in one JSON file, so deletions never strand retained documents
//! without search vectors. A corrupt or unreadable file at open resets the
//! store to empty with a warning.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::guard::trust::SourceMetadata;

/// A stored document chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    /// Store-assigned id
    pub id: u64,
    /// Chunk text
    pub content: String,
    /// Source document name
    pub source_file: String,
    /// Ordinal of this chunk within its source
    pub chunk_index: usize,
    /// Trust-relevant source metadata
    #[serde(default)]
    pub metadata: SourceMetadata,
}

/// One search hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    /// Matched document
    pub document: StoredDocument,
    /// Cosine similarity to the query
    pub score: f32,
    /// Zero-based rank in the result list
    pub rank: usize,
}

#[derive(Serialize, Deserialize)]
struct PersistedStore {
    dimension: usize,
    next_id: u64,
    entries: Vec<PersistedEntry>,
}

#[derive(Serialize, Deserialize)]
struct PersistedEntry {
    document: StoredDocument,
    embedding: Vec<f32>,
}

/// In-memory vector store with optional JSON persistence.
pub struct VectorStore {
    dimension: usize,
    next_id: u64,
    documents: BTreeMap<u64, StoredDocument>,
    embeddings: BTreeMap<u64, Vec<f32>>,
    store_file: Option<PathBuf>,
}

impl VectorStore {
    /// A store that lives only in memory.
    pub fn in_memory(dimension: usize) -> Self {
        Self {
            dimension,
            next_id: 0,
            documents: BTreeMap::new(),
            embeddings: BTreeMap::new(),
            store_file: None,
        }
    }

    /// Open a persisted store at `dir/vector_store.json`, creating an empty
    /// one if the file is missing. A file whose contents cannot be parsed,
    /// or whose dimension disagrees, resets to empty with a warning.
    pub fn open(dir: impl AsRef<Path>, dimension: usize) -> Self {
        let dir = dir.as_ref();
        if let Err(e) = std::fs::create_dir_all(dir) {
            tracing::warn!("Could not create store directory {dir:?}: {e}");
        }

        let store_file = dir.join("vector_store.json");
        let mut store = Self::in_memory(dimension);
        store.store_file = Some(store_file.clone());

        if store_file.exists() {
            match Self::load(&store_file, dimension) {
                Ok((next_id, documents, embeddings)) => {
                    store.next_id = next_id;
                    store.documents = documents;
                    store.embeddings = embeddings;
                    tracing::info!("Loaded vector store with {} documents", store.documents.len());
                },
                Err(e) => {
                    tracing::warn!("Resetting vector store {store_file:?}: {e}");
                },
            }
        }

        store
    }

    #[allow(clippy::type_complexity)]
    fn load(
        store_file: &Path,
        dimension: usize,
    ) -> Result<(u64, BTreeMap<u64, StoredDocument>, BTreeMap<u64, Vec<f32>>)> {
        let data = std::fs::read_to_string(store_file)?;
        let persisted: PersistedStore = serde_json::from_str(&data)?;

        if persisted.dimension != dimension {
            return Err(RagError::Store(format!(
                "dimension mismatch: stored {}, configured {dimension}",
                persisted.dimension
            )));
        }

        let mut documents = BTreeMap::new();
        let mut embeddings = BTreeMap::new();
        for entry in persisted.entries {
            let id = entry.document.id;
            documents.insert(id, entry.document);
            embeddings.insert(id, entry.embedding);
        }

        Ok((persisted.next_id, documents, embeddings))
    }

    fn save(&self) {
        let Some(store_file) = &self.store_file else {
            return;
        };

        let persisted = PersistedStore {
            dimension: self.dimension,
            next_id: self.next_id,
            entries: self
                .documents
                .values()
                .map(|document| PersistedEntry {
                    document: document.clone(),
                    embedding: self.embeddings.get(&document.id).cloned().unwrap_or_default(),
                })
                .collect(),
        };

        match serde_json::to_string(&persisted) {
            Ok(data) => {
                if let Err(e) = std::fs::write(store_file, data) {
                    tracing::warn!("Could not save vector store: {e}");
                }
            },
            Err(e) => tracing::warn!("Could not serialize vector store: {e}"),
        }
    }

    /// Add one chunk with its embedding. The embedding is normalized on
    /// insert so search reduces to a dot product.
    pub fn add(
        &mut self,
        content: impl Into<String>,
        source_file: impl Into<String>,
        chunk_index: usize,
        metadata: SourceMetadata,
        embedding: Vec<f32>,
    ) -> Result<u64> {
        if embedding.len() != self.dimension {
            return Err(RagError::Store(format!(
                "embedding dimension {} does not match store dimension {}",
                embedding.len(),
                self.dimension
            )));
        }

        let id = self.next_id;
        self.next_id += 1;

        self.documents.insert(
            id,
            StoredDocument {
                id,
                content: content.into(),
                source_file: source_file.into(),
                chunk_index,
                metadata,
            },
        );
        self.embeddings.insert(id, normalize(embedding));
        self.save();

        Ok(id)
    }

    /// Search for the `top_k` most similar documents above `threshold`.
    /// Results are in descending score order; equal scores keep insertion
    /// order.
    pub fn search(&self, query_embedding: &[f32], top_k: usize, threshold: f32) -> Vec<SearchResult> {
        if query_embedding.len() != self.dimension || top_k == 0 {
            return Vec::new();
        }

        let query = normalize(query_embedding.to_vec());

        let mut scored: Vec<(u64, f32)> = self
            .embeddings
            .iter()
            .map(|(id, embedding)| {
                let score: f32 = query.iter().zip(embedding).map(|(a, b)| a * b).sum();
                (*id, score)
            })
            .filter(|(_, score)| *score >= threshold)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        scored
            .into_iter()
            .enumerate()
            .map(|(rank, (id, score))| SearchResult {
                document: self.documents[&id].clone(),
                score,
                rank,
            })
            .collect()
    }

    /// Remove every chunk belonging to `source_file`. Returns how many were
    /// removed.
    pub fn delete_by_source(&mut self, source_file: &str) -> usize {
        let ids: Vec<u64> = self
            .documents
            .values()
            .filter(|d| d.source_file == source_file)
            .map(|d| d.id)
            .collect();

        for id in &ids {
            self.documents.remove(id);
            self.embeddings.remove(id);
        }

        if !ids.is_empty() {
            self.save();
        }
        ids.len()
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.documents.clear();
        self.embeddings.clear();
        self.next_id = 0;
        self.save();
    }

    /// Distinct source file names, in first-insertion order.
    pub fn sources(&self) -> Vec<String> {
        let mut sources = Vec::new();
        for document in self.documents.values() {
            if !sources.contains(&document.source_file) {
                sources.push(document.source_file.clone());
            }
        }
        sources
    }

    /// Number of stored chunks.
    pub fn count(&self) -> usize {
        self.documents.len()
    }
}

fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn meta() -> SourceMetadata {
        SourceMetadata::default()
    }

    #[test]
    fn test_add_and_search() {
        let mut store = VectorStore::in_memory(3);
        store.add("x axis", "a.txt", 0, meta(), vec![1.0, 0.0, 0.0]).unwrap();
        store.add("y axis", "a.txt", 1, meta(), vec![0.0, 1.0, 0.0]).unwrap();

        let results = store.search(&[1.0, 0.1, 0.0], 5, 0.0);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document.content, "x axis");
        assert_eq!(results[0].rank, 0);
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_threshold_filters() {
        let mut store = VectorStore::in_memory(2);
        store.add("close", "a.txt", 0, meta(), vec![1.0, 0.0]).unwrap();
        store.add("far", "a.txt", 1, meta(), vec![0.0, 1.0]).unwrap();

        let results = store.search(&[1.0, 0.0], 5, 0.5);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.content, "close");
    }

    #[test]
    fn test_top_k_limits() {
        let mut store = VectorStore::in_memory(2);
        for i in 0..10 {
            store.add(format!("doc {i}"), "a.txt", i, meta(), vec![1.0, 0.0]).unwrap();
        }

        assert_eq!(store.search(&[1.0, 0.0], 3, 0.0).len(), 3);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut store = VectorStore::in_memory(2);
        store.add("first", "a.txt", 0, meta(), vec![1.0, 0.0]).unwrap();
        store.add("second", "a.txt", 1, meta(), vec![1.0, 0.0]).unwrap();

        let results = store.search(&[1.0, 0.0], 5, 0.0);
        assert_eq!(results[0].document.content, "first");
        assert_eq!(results[1].document.content, "second");
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut store = VectorStore::in_memory(3);
        let result = store.add("bad", "a.txt", 0, meta(), vec![1.0, 0.0]);
        assert!(matches!(result, Err(RagError::Store(_))));
    }

    #[test]
    fn test_delete_by_source() {
        let mut store = VectorStore::in_memory(2);
        store.add("keep", "keep.txt", 0, meta(), vec![1.0, 0.0]).unwrap();
        store.add("drop 1", "drop.txt", 0, meta(), vec![0.0, 1.0]).unwrap();
        store.add("drop 2", "drop.txt", 1, meta(), vec![0.0, 1.0]).unwrap();

        assert_eq!(store.delete_by_source("drop.txt"), 2);
        assert_eq!(store.count(), 1);
        assert_eq!(store.sources(), vec!["keep.txt"]);

        // Retained documents are still searchable
        let results = store.search(&[1.0, 0.0], 5, 0.0);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.content, "keep");
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = TempDir::new().unwrap();

        {
            let mut store = VectorStore::open(dir.path(), 2);
            store.add("persisted", "p.txt", 0, meta(), vec![1.0, 0.0]).unwrap();
        }

        let reopened = VectorStore::open(dir.path(), 2);
        assert_eq!(reopened.count(), 1);

        let results = reopened.search(&[1.0, 0.0], 5, 0.0);
        assert_eq!(results[0].document.content, "persisted");
        assert!((results[0].score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_corrupt_file_resets() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("vector_store.json"), "{{not json").unwrap();

        let store = VectorStore::open(dir.path(), 2);
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_dimension_change_resets() {
        let dir = TempDir::new().unwrap();

        {
            let mut store = VectorStore::open(dir.path(), 2);
            store.add("old", "o.txt", 0, meta(), vec![1.0, 0.0]).unwrap();
        }

        let store = VectorStore::open(dir.path(), 3);
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_clear() {
        let mut store = VectorStore::in_memory(2);
        store.add("a", "a.txt", 0, meta(), vec![1.0, 0.0]).unwrap();
        store.clear();

        assert_eq!(store.count(), 0);
        assert!(store.sources().is_empty());
    }
}
