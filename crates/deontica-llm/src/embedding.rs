//! Deterministic embeddings for tests and offline runs
//!
//! `MockEmbedder` hashes the input text with a series of seeds and
//! normalizes the result to unit length. Same text, same vector; no network.
//!
//! ```rust
//! use deontica_llm::MockEmbedder;
//! use deontica_domain::traits::EmbeddingProvider;
//!
//! let embedder = MockEmbedder::new(64);
//! let a = embedder.embed("Providers shall keep logs").unwrap();
//! let b = embedder.embed("Providers shall keep logs").unwrap();
//! assert_eq!(a, b);
//! assert_eq!(a.len(), 64);
//! ```

use crate::LlmError;
use deontica_domain::traits::EmbeddingProvider;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Hash-based embedding provider
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    /// Create a new mock embedder producing vectors of `dimension` values
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Embedding dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn hash_with_seed(text: &str, seed: u64) -> f32 {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        seed.hash(&mut hasher);
        let hash_value = hasher.finish();

        // Map to [-1, 1]
        let normalized = (hash_value as f64 / u64::MAX as f64) * 2.0 - 1.0;
        normalized as f32
    }
}

impl EmbeddingProvider for MockEmbedder {
    type Error = LlmError;

    fn embed(&self, text: &str) -> Result<Vec<f32>, Self::Error> {
        if text.is_empty() {
            return Err(LlmError::InvalidInput(
                "Empty text cannot be embedded".to_string(),
            ));
        }

        let mut embedding: Vec<f32> = (0..self.dimension)
            .map(|i| Self::hash_with_seed(text, i as u64))
            .collect();

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut embedding {
                *value /= magnitude;
            }
        }

        Ok(embedding)
    }
}
