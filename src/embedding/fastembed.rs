//! Semantic embeddings via fastembed (all-MiniLM-L6-v2).
//!
//! Only compiled with the `fastembed-embeddings` feature. The model is loaded
//! lazily on the first call and shared process-wide.

use super::{DEFAULT_DIMENSIONS, EmbedError, EmbeddingProvider};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

static EMBEDDING_MODEL: OnceLock<Mutex<fastembed::TextEmbedding>> = OnceLock::new();

const MODEL_NAME: &str = "all-MiniLM-L6-v2";

/// Provider backed by a local ONNX model.
#[derive(Debug, Default, Clone, Copy)]
pub struct FastEmbedProvider;

impl FastEmbedProvider {
    /// Creates the provider. The model is not loaded until the first `embed`.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Returns the model name.
    #[must_use]
    pub const fn model_name(&self) -> &'static str {
        MODEL_NAME
    }

    fn model() -> Result<&'static Mutex<fastembed::TextEmbedding>, EmbedError> {
        if let Some(model) = EMBEDDING_MODEL.get() {
            return Ok(model);
        }

        tracing::info!(model = MODEL_NAME, "Loading embedding model (first use)");
        let start = Instant::now();

        let options = fastembed::InitOptions::new(fastembed::EmbeddingModel::AllMiniLML6V2)
            .with_show_download_progress(false);
        let model = fastembed::TextEmbedding::try_new(options)
            .map_err(|e| EmbedError::Unavailable(format!("model load failed: {e}")))?;

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            model = MODEL_NAME,
            "Embedding model loaded"
        );

        // Another thread may have won the race; either model is fine.
        let _ = EMBEDDING_MODEL.set(Mutex::new(model));
        EMBEDDING_MODEL
            .get()
            .ok_or_else(|| EmbedError::Unavailable("model initialization race".to_string()))
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn dimensions(&self) -> usize {
        DEFAULT_DIMENSIONS
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        if text.trim().is_empty() {
            return Err(EmbedError::InvalidInput(
                "cannot embed empty text".to_string(),
            ));
        }

        let model = Self::model()?;
        let mut guard = model
            .lock()
            .map_err(|_| EmbedError::Unavailable("embedding model lock poisoned".to_string()))?;
        let input = vec![text.to_string()];

        // ONNX runtime can panic on malformed input; degrade instead of unwinding.
        let result = catch_unwind(AssertUnwindSafe(|| guard.embed(input, None)));
        drop(guard);

        let embeddings = result
            .map_err(|_| {
                tracing::error!("ONNX runtime panicked during embedding");
                EmbedError::Unavailable("ONNX runtime panic".to_string())
            })?
            .map_err(|e| EmbedError::Unavailable(e.to_string()))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::Unavailable("no embedding returned".to_string()))
    }
}
