//! Deterministic text embedder.
//!
//! `HashEmbedder` maps lowercased word tokens into a fixed-dimension vector
//! by feature hashing (FNV-1a), then L2-normalizes. The same input always
//! produces the same vector, shared vocabulary produces correlated vectors,
//! and no model weights are needed. Quality is deliberately out of scope;
//! determinism and self-containment are the contract.

use crate::config::RetrievalConfig;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Produces fixed-dimension embeddings from text.
pub trait Embedder: Send + Sync {
    /// Embed `text` into a vector of `dimension()` components.
    fn embed(&self, text: &str) -> Vec<f32>;

    /// Output vector dimension.
    fn dimension(&self) -> usize;
}

/// Feature-hashing embedder. Tokens are lowercased alphanumeric runs; each
/// token adds ±1 to one component chosen by its hash, with the sign taken
/// from a second hash bit. The result is L2-normalized; empty input yields
/// the zero vector.
pub struct HashEmbedder {
    dimension: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(RetrievalConfig::default().embedding_dimension)
    }
}

impl HashEmbedder {
    /// An embedder producing vectors of `dimension` components (minimum 1).
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in tokenize(text) {
            let hash = fnv1a(token.as_bytes());
            let index = (hash % self.dimension as u64) as usize;
            let sign = if (hash >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        vector
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Lowercased alphanumeric token stream.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_deterministic() {
        let embedder = HashEmbedder::new(64);
        assert_eq!(
            embedder.embed("the cat sat on the mat"),
            embedder.embed("the cat sat on the mat")
        );
    }

    #[test]
    fn test_dimension_respected() {
        let embedder = HashEmbedder::new(384);
        assert_eq!(embedder.embed("hello world").len(), 384);
        assert_eq!(embedder.dimension(), 384);
    }

    #[test]
    fn test_normalized() {
        let embedder = HashEmbedder::new(128);
        let v = embedder.embed("vectors are normalized to unit length");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_is_zero_vector() {
        let embedder = HashEmbedder::new(32);
        assert!(embedder.embed("").iter().all(|&v| v == 0.0));
        assert!(embedder.embed("   !!!  ").iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_case_insensitive_tokens() {
        let embedder = HashEmbedder::new(64);
        assert_eq!(embedder.embed("Hello World"), embedder.embed("hello world"));
    }

    #[test]
    fn test_shared_vocabulary_scores_higher() {
        let embedder = HashEmbedder::new(384);
        let query = embedder.embed("solar panel installation costs");
        let related = embedder.embed("the installation of a solar panel has fixed costs");
        let unrelated = embedder.embed("medieval falconry techniques and traditions");

        assert!(dot(&query, &related) > dot(&query, &unrelated));
    }
}
