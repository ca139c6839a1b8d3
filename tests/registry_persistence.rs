//! Registry persistence across process restarts.
//!
//! Opens a file-backed registry, mutates it, drops it and reopens the same
//! database to check that every field the selection and reporting paths
//! depend on survives.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use taleprint::config::RegistryConfig;
use taleprint::{
    CanonicalFingerprint, Category, DuplicateLevel, MemorySimilarityIndex, RecordId,
    RecordStatus, Registry, RegistryRecord, SelectionFilter, SqliteRegistryStore, Tier,
};
use tempfile::TempDir;

fn fingerprint() -> CanonicalFingerprint {
    "setting=rural,fear=mortality,antagonist=supernatural,mechanism=ritual,twist=cyclical"
        .parse()
        .unwrap()
}

fn config(dir: &TempDir) -> RegistryConfig {
    RegistryConfig {
        path: Some(dir.path().join("registry.db")),
    }
}

fn seed(registry: &Registry, index: &MemorySimilarityIndex) {
    for id in ["harvest", "scarecrow", "well"] {
        registry
            .upsert(RegistryRecord::new(RecordId::new(id), fingerprint(), Category::Folklore))
            .unwrap();
    }
    registry
        .record_dedup_outcome(&"harvest".into(), 0.12, DuplicateLevel::Low, Some(&[1.0, 0.0]), index)
        .unwrap();
    registry
        .record_dedup_outcome(&"scarecrow".into(), 0.91, DuplicateLevel::High, Some(&[0.9, 0.1]), index)
        .unwrap();
    registry
        .record_dedup_outcome(&"well".into(), 0.0, DuplicateLevel::Unknown, None, index)
        .unwrap();
}

#[test]
fn test_file_backed_registry_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let index = MemorySimilarityIndex::new(2);

    let before = {
        let registry = Registry::from_config(&config(&dir)).unwrap();
        assert_eq!(registry.backend(), "sqlite");
        seed(&registry, &index);
        registry.mark_used(&"harvest".into()).unwrap();
        registry.mark_used(&"harvest".into()).unwrap();
        registry.supersede(&"well".into(), &"harvest".into()).unwrap();
        registry
            .record_compatibility_outcome(&"scarecrow".into(), fingerprint(), Category::Folklore, Tier::Good)
            .unwrap();
        registry.stats()
    };

    let reopened = Registry::from_config(&config(&dir)).unwrap();
    let after = reopened.stats();
    assert_eq!(after.total, before.total);
    assert_eq!(after.by_status, before.by_status);
    assert_eq!(after.by_level, before.by_level);
    assert_eq!(after.high_signal_ids, vec![RecordId::new("scarecrow")]);

    let harvest = reopened.get(&"harvest".into()).unwrap();
    assert_eq!(harvest.usage_count, 2);
    assert!(harvest.last_used_at.is_some());

    let well = reopened.get(&"well".into()).unwrap();
    assert_eq!(well.status, RecordStatus::Superseded);
    assert_eq!(well.superseded_by, Some(RecordId::new("harvest")));
    assert_eq!(well.dedup_signal, Some(DuplicateLevel::Unknown));

    let scarecrow = reopened.get(&"scarecrow".into()).unwrap();
    assert_eq!(scarecrow.last_outcome, Some(Tier::Good));
    assert!((scarecrow.dedup_score - 0.91).abs() < 1e-6);
}

#[test]
fn test_selection_after_reopen_uses_persisted_counters() {
    let dir = TempDir::new().unwrap();
    let index = MemorySimilarityIndex::new(2);
    {
        let registry = Registry::from_config(&config(&dir)).unwrap();
        seed(&registry, &index);
        registry.mark_used(&"harvest".into()).unwrap();
    }

    let store = Arc::new(SqliteRegistryStore::new(dir.path().join("registry.db")).unwrap());
    let reopened = Registry::load(store).unwrap();

    // "well" is unused and not High; "scarecrow" is unused but High.
    assert_eq!(
        reopened.select_least_used(&SelectionFilter::new()),
        Some(RecordId::new("well"))
    );
    reopened.retire(&"well".into()).unwrap();
    assert_eq!(
        reopened.select_least_used(&SelectionFilter::new()),
        Some(RecordId::new("harvest"))
    );
}

#[test]
fn test_export_is_identical_after_reopen() {
    let dir = TempDir::new().unwrap();
    let index = MemorySimilarityIndex::new(2);
    let exported = {
        let registry = Registry::from_config(&config(&dir)).unwrap();
        seed(&registry, &index);
        registry.export_json().unwrap()
    };

    let reopened = Registry::from_config(&config(&dir)).unwrap();
    let reexported = reopened.export_json().unwrap();

    let before: serde_json::Value = serde_json::from_str(&exported).unwrap();
    let after: serde_json::Value = serde_json::from_str(&reexported).unwrap();
    assert_eq!(before.as_array().map(Vec::len), Some(3));
    for (b, a) in before.as_array().unwrap().iter().zip(after.as_array().unwrap()) {
        assert_eq!(b["id"], a["id"]);
        assert_eq!(b["dedup_signal"], a["dedup_signal"]);
        assert_eq!(b["status"], a["status"]);
        assert_eq!(b["usage_count"], a["usage_count"]);
    }
}

#[test]
fn test_in_memory_config_does_not_touch_disk() {
    let registry = Registry::from_config(&RegistryConfig::default()).unwrap();
    assert_eq!(registry.backend(), "memory");
    assert!(registry.is_empty());
}
