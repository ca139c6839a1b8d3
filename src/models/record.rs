//! Registry record types and identifiers.

use super::{CanonicalFingerprint, Category, DuplicateLevel, Tier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier shared by a registry record and its index vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Creates a record ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh, time-ordered ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle status of a registry record. Records are never deleted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Available for selection.
    #[default]
    Active,
    /// Replaced by a newer record; kept for audit.
    Superseded,
    /// Withdrawn from selection without a replacement.
    Retired,
}

impl RecordStatus {
    /// All statuses.
    pub const ALL: [Self; 3] = [Self::Active, Self::Superseded, Self::Retired];

    /// Returns the status as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Superseded => "superseded",
            Self::Retired => "retired",
        }
    }

    /// Parses a status name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "superseded" => Some(Self::Superseded),
            "retired" => Some(Self::Retired),
            _ => None,
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registry entry. Carries no vector data; the similarity index is linked by `id` only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryRecord {
    /// Unique identifier.
    pub id: RecordId,
    /// Canonical fingerprint.
    pub fingerprint: CanonicalFingerprint,
    /// Declared category.
    pub category: Category,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Times the selection policy has used this record.
    pub usage_count: u64,
    /// Last time the selection policy used this record.
    pub last_used_at: Option<DateTime<Utc>>,
    /// Similarity score from the most recent dedup classification.
    pub dedup_score: f32,
    /// Level from the most recent dedup classification. `None` until classified.
    pub dedup_signal: Option<DuplicateLevel>,
    /// Tier from the most recent compatibility evaluation.
    pub last_outcome: Option<Tier>,
    /// Lifecycle status.
    pub status: RecordStatus,
    /// Id of the record that superseded this one.
    pub superseded_by: Option<RecordId>,
}

impl RegistryRecord {
    /// Creates a fresh, active, unused and unclassified record.
    #[must_use]
    pub fn new(id: RecordId, fingerprint: CanonicalFingerprint, category: Category) -> Self {
        Self {
            id,
            fingerprint,
            category,
            created_at: Utc::now(),
            usage_count: 0,
            last_used_at: None,
            dedup_score: 0.0,
            dedup_signal: None,
            last_outcome: None,
            status: RecordStatus::Active,
            superseded_by: None,
        }
    }

    /// Builder method to set the creation time.
    #[must_use]
    pub const fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Returns true if the latest dedup classification was `High`.
    #[must_use]
    pub fn is_deprioritized(&self) -> bool {
        self.dedup_signal == Some(DuplicateLevel::High)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Antagonist, Mechanism, PrimaryFear, Setting, Twist};

    fn fingerprint() -> CanonicalFingerprint {
        CanonicalFingerprint::new(
            Setting::Urban,
            PrimaryFear::Isolation,
            Antagonist::Human,
            Mechanism::Entrapment,
            Twist::NeverEscaped,
        )
    }

    #[test]
    fn test_new_record_defaults() {
        let record = RegistryRecord::new(RecordId::new("r1"), fingerprint(), Category::Folklore);
        assert_eq!(record.usage_count, 0);
        assert!(record.last_used_at.is_none());
        assert!(record.dedup_signal.is_none());
        assert_eq!(record.status, RecordStatus::Active);
        assert!(!record.is_deprioritized());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(RecordId::generate(), RecordId::generate());
    }

    #[test]
    fn test_record_json_has_no_vector() {
        let record = RegistryRecord::new(RecordId::new("r1"), fingerprint(), Category::Folklore);
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("vector").is_none());
        assert_eq!(json["fingerprint"]["setting"], "urban");
        assert_eq!(json["status"], "active");
    }
}
