//! Deterministic hash-based pseudo-embeddings.
//!
//! Not semantic. Texts sharing many words land close together, which is
//! enough for tests, benches and offline runs without a model.

use super::{DEFAULT_DIMENSIONS, EmbedError, EmbeddingProvider};
use sha2::{Digest, Sha256};

/// Limit word iteration so very long texts stay cheap.
const MAX_WORDS: usize = 1000;

/// Hash-based embedding provider.
#[derive(Debug, Clone, Copy)]
pub struct HashEmbeddingProvider {
    dimensions: usize,
}

impl HashEmbeddingProvider {
    /// Creates a provider with [`DEFAULT_DIMENSIONS`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS,
        }
    }

    /// Creates a provider with custom dimensions (minimum 1).
    #[must_use]
    pub const fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions: if dimensions == 0 { 1 } else { dimensions },
        }
    }

    fn pseudo_embed(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];

        for word in text.split_whitespace().take(MAX_WORDS) {
            let word = word
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if word.is_empty() {
                continue;
            }
            let digest = Sha256::digest(word.as_bytes());
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&digest[..8]);
            Self::distribute_hash(&mut embedding, u64::from_le_bytes(bytes));
        }

        normalize(&mut embedding);
        embedding
    }

    /// Spreads one word hash over eight slots. Word order does not matter.
    fn distribute_hash(embedding: &mut [f32], hash: u64) {
        let dimensions = embedding.len();
        for j in 0..8 {
            let idx = (hash >> (j * 8)) as usize % dimensions;
            let value = ((hash >> (j * 4)) & 0xFF) as f32 / 255.0 - 0.5;
            embedding[idx] += value;
        }
    }
}

impl Default for HashEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingProvider for HashEmbeddingProvider {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        if text.trim().is_empty() {
            return Err(EmbedError::InvalidInput(
                "cannot embed empty text".to_string(),
            ));
        }

        let embedding = self.pseudo_embed(text);
        if embedding.iter().all(|v| *v == 0.0) {
            return Err(EmbedError::InvalidInput(
                "text has no embeddable words".to_string(),
            ));
        }
        Ok(embedding)
    }
}

/// Normalizes an embedding vector in-place.
fn normalize(embedding: &mut [f32]) {
    let norm_sq: f32 = embedding.iter().map(|x| x * x).sum();
    if norm_sq <= 0.0 {
        return;
    }
    let inv_norm = norm_sq.sqrt().recip();
    for v in embedding.iter_mut() {
        *v *= inv_norm;
    }
}
