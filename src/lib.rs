//! # Taleprint
//!
//! Fingerprint compatibility scoring and semantic duplicate detection for
//! automated short-fiction generation.
//!
//! Two independent pipelines share one registry:
//!
//! - **Compatibility**: a knowledge fragment's canonical fingerprint is scored
//!   against a narrative template's fingerprint before injection. The result is
//!   a tiered verdict or a rejection carrying explicit reasons.
//! - **Deduplication**: a generated artifact is embedded, compared against a
//!   similarity index, and classified into an advisory duplicate level.
//!
//! ## Example
//!
//! ```rust,ignore
//! use taleprint::{Candidate, CanonicalFingerprint, Category, CompatibilityScorer, TaleprintConfig};
//!
//! let config = TaleprintConfig::load_default().with_env_overrides().validated()?;
//! let scorer = CompatibilityScorer::new(&config)?;
//!
//! let target: CanonicalFingerprint =
//!     "setting=digital,fear=identity_erasure,antagonist=technology,mechanism=impersonation,twist=self_is_monster"
//!         .parse()?;
//! let candidate = Candidate::new("fragment-042", Category::Technology, target)
//!     .with_avoid_rules(["no haunted houses"]);
//!
//! let verdict = scorer.score(&target, &candidate, &[])?;
//! if verdict.is_accepted() {
//!     println!("{} ({:.1})", verdict.tier, verdict.score);
//! }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
// fastembed pulls duplicate transitive versions through ort.
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod embedding;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

pub use config::TaleprintConfig;
pub use embedding::{BoundedEmbedder, EmbedError, EmbedOutcome, EmbeddingProvider};
pub use models::{
    Antagonist, CanonicalFingerprint, Category, CompatibilityVerdict, Dimension,
    DuplicateLevel, DuplicateSignal, Mechanism, PrimaryFear, RankedCandidate, RecordId,
    RecordStatus, RegistryRecord, RejectReason, Setting, Tier, Twist, WarningKind,
};
pub use services::{
    Candidate, CompatibilityScorer, CompatibilityService, DedupItem, DedupReport,
    DeduplicationService, DuplicateClassifier, Registry, RegistryStats, SelectionFilter,
};
pub use storage::{
    CancelFlag, MemoryRegistryStore, MemorySimilarityIndex, RegistryStore, SimilarityIndex,
    SqliteRegistryStore,
};

/// Error type for taleprint operations.
///
/// Expected rejection outcomes (category mismatch, hard blocks, insufficient
/// compatibility) are verdict data, not errors. Provider failures are degraded
/// to [`DuplicateLevel::Unknown`] by the deduplication pipeline and only reach
/// callers that talk to a provider directly.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `Validation` | A fingerprint value is unknown or outside its enabled domain |
/// | `InvalidInput` | Empty text, vector dimension mismatch, zero vectors |
/// | `InvalidConfig` | Rule tables or thresholds fail startup validation |
/// | `ProviderUnavailable` | The embedding provider failed or is not reachable |
/// | `ProviderTimeout` | An embedding call exceeded its timeout |
/// | `NotFound` | A registry id does not exist |
/// | `OperationFailed` | `SQLite`, filesystem or serialization failures |
/// | `Cancelled` | A cancellable operation observed its cancel flag |
#[derive(Debug, ThisError)]
pub enum Error {
    /// A fingerprint dimension value does not belong to its domain.
    #[error("invalid value '{value}' for dimension '{dimension}'")]
    Validation {
        /// The dimension being validated.
        dimension: String,
        /// The rejected value.
        value: String,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The embedding provider is unavailable.
    #[error("embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The embedding provider did not answer in time.
    #[error("embedding provider timed out after {timeout_ms}ms")]
    ProviderTimeout {
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// A registry record was not found.
    #[error("record not found: {0}")]
    NotFound(String),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The operation was cancelled before completion.
    #[error("cancelled: {0}")]
    Cancelled(String),
}

impl Error {
    /// Builds an [`Error::OperationFailed`] from an operation name and any displayable cause.
    pub fn operation(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for taleprint operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("test error".to_string());
        assert_eq!(err.to_string(), "invalid input: test error");

        let err = Error::operation("save_record", "disk full");
        assert_eq!(err.to_string(), "operation 'save_record' failed: disk full");

        let err = Error::Validation {
            dimension: "setting".to_string(),
            value: "moon".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid value 'moon' for dimension 'setting'"
        );

        let err = Error::ProviderTimeout { timeout_ms: 250 };
        assert_eq!(err.to_string(), "embedding provider timed out after 250ms");
    }
}
