//! In-memory brute-force cosine index.
//!
//! Vectors live in a [`DashMap`] so writers to different ids only contend on
//! their shard. The map itself is one generation behind an `RwLock<Arc<..>>`:
//! readers clone the `Arc` and never see a half-built index, and
//! [`SimilarityIndex::rebuild`] builds the next generation off-lock and swaps
//! it in atomically.

use crate::embedding::cosine_similarity;
use crate::models::RecordId;
use crate::storage::traits::{CancelFlag, SimilarityIndex, SimilarityRecord};
use crate::{Error, Result};
use dashmap::DashMap;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;
use tracing::instrument;

#[derive(Debug, Clone)]
struct Entry {
    record: SimilarityRecord,
    /// Write sequence number, used to carry concurrent inserts across a rebuild.
    seq: u64,
}

type Generation = Arc<DashMap<RecordId, Entry>>;

/// Brute-force in-memory similarity index.
#[derive(Debug)]
pub struct MemorySimilarityIndex {
    dimensions: usize,
    generation: RwLock<Generation>,
    seq: AtomicU64,
}

impl MemorySimilarityIndex {
    /// Creates an empty index for vectors of `dimensions` length.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            generation: RwLock::new(Arc::new(DashMap::new())),
            seq: AtomicU64::new(0),
        }
    }

    fn current(&self) -> Generation {
        let guard = self
            .generation
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, AtomicOrdering::SeqCst) + 1
    }

    fn validate_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(Error::InvalidInput(format!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.dimensions,
                vector.len()
            )));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidInput(
                "Embedding contains non-finite values".to_string(),
            ));
        }
        if vector.iter().all(|v| *v == 0.0) {
            return Err(Error::InvalidInput("Embedding has zero norm".to_string()));
        }
        Ok(())
    }
}

impl SimilarityIndex for MemorySimilarityIndex {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn insert(&self, id: &RecordId, vector: &[f32]) -> Result<()> {
        self.validate_vector(vector)?;

        // Hold the read guard so a concurrent rebuild cannot swap mid-write.
        let map = self
            .generation
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let seq = self.next_seq();
        map.entry(id.clone())
            .and_modify(|entry| {
                entry.record.vector = vector.to_vec();
                entry.seq = seq;
            })
            .or_insert_with(|| Entry {
                record: SimilarityRecord::new(id.clone(), vector.to_vec()),
                seq,
            });
        Ok(())
    }

    fn query(
        &self,
        vector: &[f32],
        k: usize,
        exclude: Option<&RecordId>,
    ) -> Result<Vec<(RecordId, f32)>> {
        self.validate_vector(vector)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let map = self.current();
        let mut scores: Vec<(RecordId, f32)> = map
            .iter()
            .filter(|item| exclude != Some(item.key()))
            .map(|item| {
                let similarity = cosine_similarity(vector, &item.value().record.vector);
                (item.key().clone(), similarity)
            })
            .collect();

        scores.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scores.truncate(k);
        Ok(scores)
    }

    fn get(&self, id: &RecordId) -> Option<SimilarityRecord> {
        self.current().get(id).map(|entry| entry.record.clone())
    }

    fn ids(&self) -> Vec<RecordId> {
        let mut ids: Vec<RecordId> = self
            .current()
            .iter()
            .map(|item| item.key().clone())
            .collect();
        ids.sort();
        ids
    }

    fn count(&self) -> usize {
        self.current().len()
    }

    #[instrument(skip(self, records, cancel), fields(operation = "rebuild_index", records = records.len()))]
    fn rebuild(&self, records: Vec<SimilarityRecord>, cancel: &CancelFlag) -> Result<usize> {
        let start = Instant::now();
        let started_at = self.seq.load(AtomicOrdering::SeqCst);
        let next: Generation = Arc::new(DashMap::with_capacity(records.len()));

        for record in records {
            if cancel.is_cancelled() {
                metrics::counter!("similarity_index_rebuilds_total", "result" => "cancelled")
                    .increment(1);
                tracing::warn!("Index rebuild cancelled, keeping previous index");
                return Err(Error::Cancelled("index rebuild".to_string()));
            }
            if let Err(e) = self.validate_vector(&record.vector) {
                metrics::counter!("similarity_index_rebuilds_total", "result" => "error")
                    .increment(1);
                return Err(e);
            }
            next.insert(record.id.clone(), Entry { record, seq: 0 });
        }

        if cancel.is_cancelled() {
            metrics::counter!("similarity_index_rebuilds_total", "result" => "cancelled")
                .increment(1);
            return Err(Error::Cancelled("index rebuild".to_string()));
        }

        let count = {
            let mut guard = self
                .generation
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            // Inserts that landed in the old generation after the rebuild began win.
            for item in guard.iter() {
                if item.value().seq > started_at {
                    next.insert(item.key().clone(), item.value().clone());
                }
            }
            *guard = Arc::clone(&next);
            next.len()
        };

        metrics::counter!("similarity_index_rebuilds_total", "result" => "success").increment(1);
        tracing::info!(
            count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Similarity index rebuilt"
        );
        Ok(count)
    }

    fn snapshot(&self) -> Vec<SimilarityRecord> {
        let mut records: Vec<SimilarityRecord> = self
            .current()
            .iter()
            .map(|item| item.value().record.clone())
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }
}
