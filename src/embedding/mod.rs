//! Embedding generation.
//!
//! The provider boundary is synchronous and fallible. [`BoundedEmbedder`]
//! lifts it onto the tokio blocking pool with a concurrency cap and a
//! per-call timeout, and turns every failure into an [`EmbedOutcome`] the
//! deduplication pipeline can branch on.

// Allow cast precision loss for hash-based embedding calculations.
#![allow(clippy::cast_precision_loss)]
// Allow cast possible truncation for hash index calculations on 32-bit platforms.
#![allow(clippy::cast_possible_truncation)]

mod bulkhead;
#[cfg(feature = "fastembed-embeddings")]
mod fastembed;
mod hash;

pub use bulkhead::BoundedEmbedder;
#[cfg(feature = "fastembed-embeddings")]
pub use fastembed::FastEmbedProvider;
pub use hash::HashEmbeddingProvider;

use crate::Error;
use thiserror::Error as ThisError;

/// Default embedding dimensions (all-MiniLM-L6-v2).
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Error returned by an embedding provider.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum EmbedError {
    /// The provider cannot answer right now.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The provider refused the input.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<EmbedError> for Error {
    fn from(err: EmbedError) -> Self {
        match err {
            EmbedError::Unavailable(reason) => Self::ProviderUnavailable(reason),
            EmbedError::InvalidInput(reason) => Self::InvalidInput(reason),
        }
    }
}

/// Maps text to a fixed-length vector.
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Generates an embedding for the given text.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError::Unavailable`] when the provider cannot answer and
    /// [`EmbedError::InvalidInput`] when it refuses the text.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

/// Outcome of one bounded embedding call. Never a zero vector on failure.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbedOutcome {
    /// The provider returned a vector.
    Ready(Vec<f32>),
    /// The provider failed.
    Unavailable(EmbedError),
    /// The call exceeded its timeout.
    TimedOut {
        /// The timeout that elapsed.
        timeout_ms: u64,
    },
}

impl EmbedOutcome {
    /// Returns true if a vector is available.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Returns the vector, if any.
    #[must_use]
    pub fn into_vector(self) -> Option<Vec<f32>> {
        match self {
            Self::Ready(vector) => Some(vector),
            Self::Unavailable(_) | Self::TimedOut { .. } => None,
        }
    }

    /// Converts the outcome into a crate result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProviderUnavailable`], [`Error::InvalidInput`] or
    /// [`Error::ProviderTimeout`] for the failure variants.
    pub fn into_result(self) -> crate::Result<Vec<f32>> {
        match self {
            Self::Ready(vector) => Ok(vector),
            Self::Unavailable(err) => Err(err.into()),
            Self::TimedOut { timeout_ms } => Err(Error::ProviderTimeout { timeout_ms }),
        }
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Ready(_) => "ready",
            Self::Unavailable(EmbedError::Unavailable(_)) => "unavailable",
            Self::Unavailable(EmbedError::InvalidInput(_)) => "invalid_input",
            Self::TimedOut { .. } => "timeout",
        }
    }
}

/// Computes cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or 0.0 if the lengths differ or either
/// vector has zero norm.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot_product / (norm_a * norm_b)).clamp(-1.0, 1.0)
}
