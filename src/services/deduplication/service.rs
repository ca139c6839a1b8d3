//! Deduplication pipeline.
//!
//! For every generated artifact:
//! 1. **Embed**: bounded, timed provider call
//! 2. **Query**: nearest neighbour in the similarity index (excluding itself)
//! 3. **Classify**: threshold the similarity into a [`DuplicateLevel`]
//! 4. **Record**: persist the signal and vector in the registry and index
//!
//! Nothing here refuses content. `High` is advisory and always persisted;
//! provider failures become `Unknown` and are persisted as that state.

use super::classifier::DuplicateClassifier;
use crate::config::TaleprintConfig;
use crate::embedding::{BoundedEmbedder, EmbedOutcome, EmbeddingProvider};
use crate::models::{
    CanonicalFingerprint, Category, DuplicateLevel, DuplicateSignal, RecordId, RegistryRecord,
};
use crate::services::Registry;
use crate::storage::{CancelFlag, SimilarityIndex, SimilarityRecord};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// A generated artifact to check.
#[derive(Debug, Clone, PartialEq)]
pub struct DedupItem {
    /// Registry id for the artifact.
    pub id: RecordId,
    /// Its canonical fingerprint.
    pub fingerprint: CanonicalFingerprint,
    /// Its category.
    pub category: Category,
    /// Text to embed.
    pub text: String,
}

impl DedupItem {
    /// Creates an item.
    #[must_use]
    pub fn new(
        id: impl Into<RecordId>,
        fingerprint: CanonicalFingerprint,
        category: Category,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            fingerprint,
            category,
            text: text.into(),
        }
    }
}

/// Result of checking one artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct DedupReport {
    /// Artifact id.
    pub id: RecordId,
    /// Advisory duplicate signal.
    pub signal: DuplicateSignal,
    /// Whether the registry (and index, when a vector was available) were updated.
    pub persisted: bool,
}

/// Result of [`DeduplicationService::reconcile`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Index ids with no registry record.
    pub orphaned: Vec<RecordId>,
    /// Vectors kept by the rebuild, if one ran.
    pub rebuilt: Option<usize>,
}

/// Result of [`DeduplicationService::reindex`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReindexReport {
    /// Vectors in the new index.
    pub indexed: usize,
    /// Records whose level was recomputed against the new index.
    pub reclassified: usize,
    /// Records that failed to embed and are now `Unknown`.
    pub unknown: Vec<RecordId>,
}

/// Deduplication service.
pub struct DeduplicationService<P> {
    embedder: BoundedEmbedder<P>,
    index: Arc<dyn SimilarityIndex>,
    classifier: DuplicateClassifier,
    registry: Arc<Registry>,
    query_k: usize,
    batch_concurrency: usize,
}

impl<P: EmbeddingProvider + 'static> DeduplicationService<P> {
    /// Creates a service.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the configuration is invalid or the
    /// provider and index disagree on vector dimensions.
    pub fn new(
        embedder: BoundedEmbedder<P>,
        index: Arc<dyn SimilarityIndex>,
        registry: Arc<Registry>,
        config: &TaleprintConfig,
    ) -> Result<Self> {
        config.validate()?;
        if embedder.dimensions() != index.dimensions() {
            return Err(Error::InvalidConfig(format!(
                "embedding provider produces {} dimensions, similarity index expects {}",
                embedder.dimensions(),
                index.dimensions()
            )));
        }

        Ok(Self {
            embedder,
            index,
            classifier: DuplicateClassifier::new(config.dedup)?,
            registry,
            query_k: config.dedup.query_k,
            batch_concurrency: config.embedding.max_concurrent,
        })
    }

    /// Returns the classifier.
    #[must_use]
    pub const fn classifier(&self) -> &DuplicateClassifier {
        &self.classifier
    }

    /// Checks one artifact and records the outcome.
    #[instrument(
        skip(self, item),
        fields(operation = "dedup_check", id = %item.id, text_length = item.text.len())
    )]
    pub async fn check(&self, item: &DedupItem) -> DedupReport {
        let start = Instant::now();
        let outcome = self.embedder.embed(&item.text).await;
        self.finish(item, outcome, start)
    }

    /// Checks a batch with bounded embedding concurrency.
    ///
    /// Embeddings run concurrently; classification and recording then run in
    /// input order, so later items are compared against earlier ones. A
    /// failure for one item yields `Unknown` for that item only.
    #[instrument(skip(self, items), fields(operation = "dedup_check_batch", items = items.len()))]
    pub async fn check_batch(&self, items: &[DedupItem]) -> Vec<DedupReport> {
        let start = Instant::now();
        let texts: Vec<String> = items.iter().map(|i| i.text.clone()).collect();
        let outcomes = self.embedder.embed_batch(&texts, self.batch_concurrency).await;

        items
            .iter()
            .zip(outcomes)
            .map(|(item, outcome)| self.finish(item, outcome, start))
            .collect()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn finish(&self, item: &DedupItem, outcome: EmbedOutcome, start: Instant) -> DedupReport {
        let label = outcome.label();
        let (signal, vector) = match outcome {
            EmbedOutcome::Ready(vector) => self.classify_vector(&item.id, vector),
            EmbedOutcome::Unavailable(ref e) => {
                tracing::warn!(id = %item.id, reason = label, error = %e, "Embedding unavailable, signal is unknown");
                (DuplicateSignal::unknown(), None)
            },
            EmbedOutcome::TimedOut { timeout_ms } => {
                tracing::warn!(id = %item.id, timeout_ms, "Embedding timed out, signal is unknown");
                (DuplicateSignal::unknown(), None)
            },
        };

        let persisted = self.persist(item, &signal, vector.as_deref());

        metrics::counter!("dedup_signals_total", "level" => signal.level.as_str()).increment(1);
        metrics::histogram!("dedup_check_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        tracing::debug!(
            id = %item.id,
            level = %signal.level,
            score = signal.score,
            nearest = ?signal.nearest_id,
            persisted,
            duration_ms = start.elapsed().as_millis() as u64,
            "Dedup check complete"
        );

        DedupReport {
            id: item.id.clone(),
            signal,
            persisted,
        }
    }

    /// Queries the index for the nearest other record. A vector the index
    /// cannot use is dropped and the signal is `Unknown`.
    fn classify_vector(
        &self,
        id: &RecordId,
        vector: Vec<f32>,
    ) -> (DuplicateSignal, Option<Vec<f32>>) {
        if vector.len() != self.index.dimensions() {
            tracing::warn!(
                id = %id,
                got = vector.len(),
                expected = self.index.dimensions(),
                "Embedding has wrong dimensions, signal is unknown"
            );
            return (DuplicateSignal::unknown(), None);
        }

        match self.index.query(&vector, self.query_k, Some(id)) {
            Ok(hits) => (self.classifier.signal(hits.into_iter().next()), Some(vector)),
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "Similarity query failed, signal is unknown");
                (DuplicateSignal::unknown(), None)
            },
        }
    }

    fn persist(&self, item: &DedupItem, signal: &DuplicateSignal, vector: Option<&[f32]>) -> bool {
        let record = RegistryRecord::new(item.id.clone(), item.fingerprint, item.category);
        let result = self.registry.create_if_absent(record).and_then(|_| {
            self.registry.record_dedup_outcome(
                &item.id,
                signal.score,
                signal.level,
                vector,
                self.index.as_ref(),
            )
        });

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(id = %item.id, error = %e, "Failed to persist dedup outcome");
                false
            },
        }
    }

    /// Detects index vectors whose ids are missing from the registry and, if
    /// any exist, rebuilds the index from the vectors the registry knows.
    ///
    /// # Errors
    ///
    /// Returns the rebuild error; the previous index stays in place.
    #[instrument(skip(self), fields(operation = "dedup_reconcile"))]
    pub fn reconcile(&self) -> Result<ReconcileReport> {
        let orphaned: Vec<RecordId> = self
            .index
            .ids()
            .into_iter()
            .filter(|id| !self.registry.contains(id))
            .collect();

        if orphaned.is_empty() {
            return Ok(ReconcileReport::default());
        }

        tracing::warn!(
            orphaned = orphaned.len(),
            "Similarity index diverged from registry, rebuilding"
        );
        let kept: Vec<SimilarityRecord> = self
            .index
            .snapshot()
            .into_iter()
            .filter(|r| self.registry.contains(&r.id))
            .collect();
        let rebuilt = self.index.rebuild(kept, &CancelFlag::new())?;

        Ok(ReconcileReport {
            orphaned,
            rebuilt: Some(rebuilt),
        })
    }

    /// Re-embeds `corpus`, replaces the index with the result and re-runs
    /// classification for every record in the new index.
    ///
    /// Ids missing from the registry are skipped. Texts that fail to embed
    /// drop out of the index and their records are marked `Unknown`. Each
    /// rebuilt record is compared only against records created before it, so
    /// the first of a duplicate pair stays unflagged as it was on ingest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if `cancel` is set before the swap; the
    /// previous index and every registry level are kept.
    #[instrument(skip(self, corpus, cancel), fields(operation = "dedup_reindex", corpus = corpus.len()))]
    pub async fn reindex(
        &self,
        corpus: &[(RecordId, String)],
        cancel: &CancelFlag,
    ) -> Result<ReindexReport> {
        let known: Vec<&(RecordId, String)> = corpus
            .iter()
            .filter(|(id, _)| {
                let known = self.registry.contains(id);
                if !known {
                    tracing::warn!(id = %id, "Skipping unregistered id during reindex");
                }
                known
            })
            .collect();

        let texts: Vec<String> = known.iter().map(|(_, text)| text.clone()).collect();
        let outcomes = self.embedder.embed_batch(&texts, self.batch_concurrency).await;

        if cancel.is_cancelled() {
            return Err(Error::Cancelled("reindex".to_string()));
        }

        let mut records = Vec::with_capacity(known.len());
        let mut failed = Vec::new();
        for ((id, _), outcome) in known.into_iter().zip(outcomes) {
            let label = outcome.label();
            match outcome.into_vector() {
                Some(vector) if vector.len() == self.index.dimensions() => {
                    records.push(SimilarityRecord::new(id.clone(), vector));
                },
                _ => {
                    tracing::warn!(id = %id, reason = label, "Record failed to embed, marking unknown");
                    failed.push(id.clone());
                },
            }
        }

        let indexed = self.index.rebuild(records, cancel)?;
        let reclassified = self.reclassify_all();

        let unknown = self.mark_unknown(failed);
        tracing::info!(
            indexed,
            reclassified,
            unknown = unknown.len(),
            "Reindex complete"
        );

        Ok(ReindexReport {
            indexed,
            reclassified,
            unknown,
        })
    }

    /// Classifies every indexed record against the records created before it.
    fn reclassify_all(&self) -> usize {
        let snapshot = self.index.snapshot();
        let order = |id: &RecordId| {
            (
                self.registry.get(id).map(|r| r.created_at),
                id.clone(),
            )
        };
        let k = snapshot.len();

        let mut reclassified = 0;
        for record in &snapshot {
            let own = order(&record.id);
            let nearest = match self.index.query(&record.vector, k, Some(&record.id)) {
                Ok(hits) => hits.into_iter().find(|(other, _)| order(other) < own),
                Err(e) => {
                    tracing::warn!(id = %record.id, error = %e, "Reclassification query failed");
                    continue;
                },
            };
            let signal = self.classifier.signal(nearest);
            match self.registry.record_dedup_outcome(
                &record.id,
                signal.score,
                signal.level,
                None,
                self.index.as_ref(),
            ) {
                Ok(()) => reclassified += 1,
                Err(e) => tracing::warn!(id = %record.id, error = %e, "Failed to store reclassified level"),
            }
        }
        reclassified
    }

    fn mark_unknown(&self, ids: Vec<RecordId>) -> Vec<RecordId> {
        ids.into_iter()
            .filter(|id| {
                match self.registry.record_dedup_outcome(
                    id,
                    0.0,
                    DuplicateLevel::Unknown,
                    None,
                    self.index.as_ref(),
                ) {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(id = %id, error = %e, "Failed to mark record unknown");
                        false
                    },
                }
            })
            .collect()
    }

    /// Returns a record's latest dedup level.
    #[must_use]
    pub fn level_of(&self, id: &RecordId) -> Option<DuplicateLevel> {
        self.registry.get(id).and_then(|r| r.dedup_signal)
    }
}
