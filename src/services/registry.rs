//! Authoritative registry of fingerprinted records.
//!
//! Records live in a [`DashMap`], so writers to one id are serialized by that
//! id's shard lock while other ids proceed. Every mutation is written through
//! to the [`RegistryStore`] before it becomes visible in memory; a failed
//! store write leaves the in-memory record unchanged.

use crate::config::RegistryConfig;
use crate::models::{
    CanonicalFingerprint, Category, DuplicateLevel, PrimaryFear, RecordId, RecordStatus,
    RegistryRecord, Setting, Tier,
};
use crate::storage::{MemoryRegistryStore, RegistryStore, SimilarityIndex, SqliteRegistryStore};
use crate::{Error, Result};
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;

/// Filter for least-used selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionFilter {
    /// Allowed categories. Empty allows all.
    pub categories: Vec<Category>,
    /// Required primary fear.
    pub fear: Option<PrimaryFear>,
    /// Required setting.
    pub setting: Option<Setting>,
    /// Statuses considered available.
    pub include_statuses: Vec<RecordStatus>,
    /// Rank records flagged `High` after every other match.
    pub deprioritize_high: bool,
}

impl Default for SelectionFilter {
    fn default() -> Self {
        Self {
            categories: Vec::new(),
            fear: None,
            setting: None,
            include_statuses: vec![RecordStatus::Active],
            deprioritize_high: true,
        }
    }
}

impl SelectionFilter {
    /// Creates the default filter (active records, `High` deprioritized).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to restrict categories.
    #[must_use]
    pub fn with_categories(mut self, categories: impl IntoIterator<Item = Category>) -> Self {
        self.categories = categories.into_iter().collect();
        self
    }

    /// Builder method to require a primary fear.
    #[must_use]
    pub const fn with_fear(mut self, fear: PrimaryFear) -> Self {
        self.fear = Some(fear);
        self
    }

    /// Builder method to require a setting.
    #[must_use]
    pub const fn with_setting(mut self, setting: Setting) -> Self {
        self.setting = Some(setting);
        self
    }

    /// Builder method to toggle `High` deprioritization.
    #[must_use]
    pub const fn with_deprioritize_high(mut self, deprioritize: bool) -> Self {
        self.deprioritize_high = deprioritize;
        self
    }

    /// Returns true if `record` passes the filter.
    #[must_use]
    pub fn matches(&self, record: &RegistryRecord) -> bool {
        self.include_statuses.contains(&record.status)
            && (self.categories.is_empty() || self.categories.contains(&record.category))
            && self.fear.is_none_or(|f| record.fingerprint.primary_fear == f)
            && self.setting.is_none_or(|s| record.fingerprint.setting == s)
    }
}

/// Aggregate registry counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Number of records.
    pub total: usize,
    /// Records per lifecycle status.
    pub by_status: BTreeMap<RecordStatus, usize>,
    /// Records per classified duplicate level.
    pub by_level: BTreeMap<DuplicateLevel, usize>,
    /// Records never classified.
    pub unclassified: usize,
    /// Ids whose latest signal was `High`, sorted.
    pub high_signal_ids: Vec<RecordId>,
}

/// Registry service.
pub struct Registry {
    records: DashMap<RecordId, RegistryRecord>,
    store: Arc<dyn RegistryStore>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("records", &self.records.len())
            .field("store", &self.store.name())
            .finish()
    }
}

impl Registry {
    /// Loads every record from `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    #[instrument(skip(store), fields(operation = "registry_load", backend = store.name()))]
    pub fn load(store: Arc<dyn RegistryStore>) -> Result<Self> {
        let loaded = store.load_all()?;
        let records = DashMap::with_capacity(loaded.len());
        for record in loaded {
            records.insert(record.id.clone(), record);
        }
        tracing::debug!(count = records.len(), "Loaded registry");
        Ok(Self { records, store })
    }

    /// Creates an empty, process-local registry.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            records: DashMap::new(),
            store: Arc::new(MemoryRegistryStore::new()),
        }
    }

    /// Opens the configured backend: `SQLite` when a path is set, memory otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or read.
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        match &config.path {
            Some(path) => Self::load(Arc::new(SqliteRegistryStore::new(path.clone())?)),
            None => Ok(Self::in_memory()),
        }
    }

    /// Returns the backend name.
    #[must_use]
    pub fn backend(&self) -> &'static str {
        self.store.name()
    }

    /// Inserts or replaces a record by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub fn upsert(&self, record: RegistryRecord) -> Result<()> {
        match self.records.entry(record.id.clone()) {
            Entry::Occupied(mut entry) => {
                self.store.save(&record)?;
                entry.insert(record);
            },
            Entry::Vacant(entry) => {
                self.store.save(&record)?;
                entry.insert(record);
            },
        }
        count_operation("upsert");
        Ok(())
    }

    /// Inserts `record` unless its id is already registered.
    ///
    /// Returns true if the record was inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub fn create_if_absent(&self, record: RegistryRecord) -> Result<bool> {
        match self.records.entry(record.id.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(entry) => {
                self.store.save(&record)?;
                entry.insert(record);
                count_operation("create");
                Ok(true)
            },
        }
    }

    /// Returns a copy of the record for `id`.
    #[must_use]
    pub fn get(&self, id: &RecordId) -> Option<RegistryRecord> {
        self.records.get(id).map(|r| r.value().clone())
    }

    /// Returns true if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &RecordId) -> bool {
        self.records.contains_key(id)
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns a copy of every record, sorted by id.
    #[must_use]
    pub fn records(&self) -> Vec<RegistryRecord> {
        let mut records: Vec<RegistryRecord> =
            self.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    /// Applies `change` to the record for `id`, writes it through, then
    /// commits it in memory.
    fn update<F>(&self, id: &RecordId, operation: &'static str, change: F) -> Result<RegistryRecord>
    where
        F: FnOnce(&mut RegistryRecord) -> Result<()>,
    {
        let mut entry = self
            .records
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        let mut updated = entry.value().clone();
        change(&mut updated)?;
        self.store.save(&updated)?;
        *entry = updated.clone();

        count_operation(operation);
        Ok(updated)
    }

    /// Stores the latest dedup classification for `id` and, when a vector is
    /// given, inserts it into `index`.
    ///
    /// Both writes succeed or neither is visible: the vector is validated
    /// first, and if the index insert still fails the previous record is
    /// restored in the store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id, [`Error::InvalidInput`]
    /// for a vector the index cannot accept, or the store/index error.
    #[instrument(
        skip(self, vector, index),
        fields(operation = "record_dedup_outcome", id = %id, level = %level)
    )]
    pub fn record_dedup_outcome(
        &self,
        id: &RecordId,
        score: f32,
        level: DuplicateLevel,
        vector: Option<&[f32]>,
        index: &dyn SimilarityIndex,
    ) -> Result<()> {
        if let Some(v) = vector
            && v.len() != index.dimensions()
        {
            return Err(Error::InvalidInput(format!(
                "vector has {} dimensions, index expects {}",
                v.len(),
                index.dimensions()
            )));
        }

        let mut entry = self
            .records
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        let prior = entry.value().clone();
        let mut updated = prior.clone();
        updated.dedup_score = score.clamp(0.0, 1.0);
        updated.dedup_signal = Some(level);

        self.store.save(&updated)?;

        if let Some(v) = vector
            && let Err(e) = index.insert(id, v)
        {
            if let Err(restore) = self.store.save(&prior) {
                tracing::error!(error = %restore, "Failed to restore record after index insert failure");
            }
            tracing::warn!(error = %e, "Index insert failed, dedup outcome rolled back");
            return Err(e);
        }

        *entry = updated;
        count_operation("record_dedup_outcome");
        Ok(())
    }

    /// Upserts the scored candidate and stores its latest tier.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub fn record_compatibility_outcome(
        &self,
        id: &RecordId,
        fingerprint: CanonicalFingerprint,
        category: Category,
        tier: Tier,
    ) -> Result<()> {
        match self.records.entry(id.clone()) {
            Entry::Occupied(mut entry) => {
                let mut updated = entry.get().clone();
                updated.fingerprint = fingerprint;
                updated.category = category;
                updated.last_outcome = Some(tier);
                self.store.save(&updated)?;
                entry.insert(updated);
            },
            Entry::Vacant(entry) => {
                let mut record = RegistryRecord::new(id.clone(), fingerprint, category);
                record.last_outcome = Some(tier);
                self.store.save(&record)?;
                entry.insert(record);
            },
        }
        count_operation("record_compatibility_outcome");
        Ok(())
    }

    /// Increments the usage counter and stamps `last_used_at`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id, or the store error.
    pub fn mark_used(&self, id: &RecordId) -> Result<()> {
        self.update(id, "mark_used", |record| {
            record.usage_count = record.usage_count.saturating_add(1);
            record.last_used_at = Some(Utc::now());
            Ok(())
        })
        .map(|_| ())
    }

    /// Returns the least-used record matching `filter`.
    ///
    /// Ordering key: `High` records last (when deprioritized), then lowest
    /// `usage_count`, then oldest `last_used_at` (never used first), then id.
    #[must_use]
    pub fn select_least_used(&self, filter: &SelectionFilter) -> Option<RecordId> {
        let selected = self
            .records
            .iter()
            .filter(|r| filter.matches(r.value()))
            .map(|r| {
                let record = r.value();
                (
                    filter.deprioritize_high && record.is_deprioritized(),
                    record.usage_count,
                    record.last_used_at,
                    record.id.clone(),
                )
            })
            .min_by(|a, b| {
                a.0.cmp(&b.0)
                    .then_with(|| a.1.cmp(&b.1))
                    .then_with(|| cmp_last_used(a.2.as_ref(), b.2.as_ref()))
                    .then_with(|| a.3.cmp(&b.3))
            })
            .map(|(_, _, _, id)| id);

        count_operation("select_least_used");
        selected
    }

    /// Marks `old` as superseded by `new`. Nothing is deleted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if either id is unknown,
    /// [`Error::InvalidInput`] if they are equal.
    pub fn supersede(&self, old: &RecordId, new: &RecordId) -> Result<()> {
        if old == new {
            return Err(Error::InvalidInput(format!(
                "record {old} cannot supersede itself"
            )));
        }
        if !self.contains(new) {
            return Err(Error::NotFound(new.to_string()));
        }
        self.update(old, "supersede", |record| {
            record.status = RecordStatus::Superseded;
            record.superseded_by = Some(new.clone());
            Ok(())
        })
        .map(|_| ())
    }

    /// Withdraws a record from selection without a replacement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id, or the store error.
    pub fn retire(&self, id: &RecordId) -> Result<()> {
        self.update(id, "retire", |record| {
            record.status = RecordStatus::Retired;
            Ok(())
        })
        .map(|_| ())
    }

    /// Returns aggregate counts.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats::default();
        for r in &self.records {
            let record = r.value();
            stats.total += 1;
            *stats.by_status.entry(record.status).or_default() += 1;
            match record.dedup_signal {
                Some(level) => *stats.by_level.entry(level).or_default() += 1,
                None => stats.unclassified += 1,
            }
            if record.is_deprioritized() {
                stats.high_signal_ids.push(record.id.clone());
            }
        }
        stats.high_signal_ids.sort();
        stats
    }

    /// Serializes every record as a flat JSON array, sorted by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if serialization fails.
    pub fn export_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.records())
            .map_err(|e| Error::operation("export_registry", e))
    }
}

fn cmp_last_used(
    a: Option<&chrono::DateTime<Utc>>,
    b: Option<&chrono::DateTime<Utc>>,
) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.cmp(b),
    }
}

fn count_operation(operation: &'static str) {
    metrics::counter!("registry_operations_total", "operation" => operation).increment(1);
}
