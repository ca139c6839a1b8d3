//! Similarity index trait.
//!
//! An index stores one vector per record id and answers cosine nearest-neighbour
//! queries. It never owns registry data: the two stores share ids only, so an
//! index can be dropped and rebuilt from the registry at any time.
//!
//! # Usage Example
//!
//! ```rust,ignore
//! use taleprint::storage::{CancelFlag, MemorySimilarityIndex, SimilarityIndex};
//!
//! let index = MemorySimilarityIndex::new(384);
//! index.insert(&RecordId::new("story-001"), &embedding)?;
//!
//! for (id, similarity) in index.query(&query_vector, 5, None)? {
//!     println!("{id}: {similarity:.3}");
//! }
//! ```

use crate::Result;
use crate::models::RecordId;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A stored vector.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityRecord {
    /// Shared id with the registry record.
    pub id: RecordId,
    /// Fixed-length embedding.
    pub vector: Vec<f32>,
    /// First insertion time.
    pub created_at: DateTime<Utc>,
}

impl SimilarityRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(id: RecordId, vector: Vec<f32>) -> Self {
        Self {
            id,
            vector,
            created_at: Utc::now(),
        }
    }
}

/// Cooperative cancellation flag shared between a caller and a long operation.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates an unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Trait for vector similarity indexes.
///
/// Implementations are shared across call sites and must allow concurrent
/// writers for different ids and consistent reads during writes.
pub trait SimilarityIndex: Send + Sync {
    /// Returns the vector dimensionality the index accepts.
    fn dimensions(&self) -> usize;

    /// Inserts or replaces the vector for `id`. Idempotent per id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] if the vector has the wrong length,
    /// zero norm, or non-finite components.
    fn insert(&self, id: &RecordId, vector: &[f32]) -> Result<()>;

    /// Returns up to `k` `(id, cosine similarity)` pairs, most similar first.
    /// Ties are ordered by id ascending.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] if the query vector is not valid
    /// for this index.
    fn query(
        &self,
        vector: &[f32],
        k: usize,
        exclude: Option<&RecordId>,
    ) -> Result<Vec<(RecordId, f32)>>;

    /// Returns the stored record for `id`.
    fn get(&self, id: &RecordId) -> Option<SimilarityRecord>;

    /// Returns true if the index holds a vector for `id`.
    fn contains(&self, id: &RecordId) -> bool {
        self.get(id).is_some()
    }

    /// Returns all stored ids, sorted.
    fn ids(&self) -> Vec<RecordId>;

    /// Returns the number of stored vectors.
    fn count(&self) -> usize;

    /// Replaces the whole index with `records`.
    ///
    /// The previous contents stay visible until the new index is complete and
    /// swapped in. Returns the number of vectors in the new index.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Cancelled`] if `cancel` was set before the swap
    /// (the previous index is untouched), or [`crate::Error::InvalidInput`]
    /// for an invalid vector.
    fn rebuild(&self, records: Vec<SimilarityRecord>, cancel: &CancelFlag) -> Result<usize>;

    /// Returns a copy of every stored record, sorted by id.
    fn snapshot(&self) -> Vec<SimilarityRecord>;
}
