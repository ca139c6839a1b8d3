//! Deduplication pipeline integration tests.
//!
//! Covers the advisory semantics end to end:
//! - A 0.92-similar retelling is `High` and still persisted
//! - Provider failures and timeouts become `Unknown` for exactly those items
//! - Least-used selection deprioritizes `High` records without excluding them

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use taleprint::embedding::{EmbedError, EmbeddingProvider, HashEmbeddingProvider};
use taleprint::storage::CancelFlag;
use taleprint::{
    BoundedEmbedder, CanonicalFingerprint, Category, DedupItem, DeduplicationService,
    DuplicateLevel, MemorySimilarityIndex, RecordId, Registry, SelectionFilter, SimilarityIndex,
    TaleprintConfig,
};

fn fingerprint() -> CanonicalFingerprint {
    "setting=domestic,fear=abandonment,antagonist=human,mechanism=manipulation,twist=complicity"
        .parse()
        .unwrap()
}

fn item(id: &str, text: &str) -> DedupItem {
    DedupItem::new(id, fingerprint(), Category::Story, text)
}

fn build<P: EmbeddingProvider + 'static>(
    provider: P,
    timeout: Duration,
) -> (DeduplicationService<P>, Arc<Registry>, Arc<MemorySimilarityIndex>) {
    let dimensions = provider.dimensions();
    let registry = Arc::new(Registry::in_memory());
    let index = Arc::new(MemorySimilarityIndex::new(dimensions));
    let embedder = BoundedEmbedder::with_limits(Arc::new(provider), 3, timeout);
    let service = DeduplicationService::new(
        embedder,
        Arc::clone(&index) as Arc<dyn SimilarityIndex>,
        Arc::clone(&registry),
        &TaleprintConfig::default(),
    )
    .unwrap();
    (service, registry, index)
}

/// Maps a text prefix to a direction in a 4-dimensional space.
struct AngleProvider;

impl EmbeddingProvider for AngleProvider {
    fn dimensions(&self) -> usize {
        4
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        match text.split_whitespace().next() {
            Some("ORIGINAL") => Ok(vec![1.0, 0.0, 0.0, 0.0]),
            Some("RETELLING") => {
                let s = 0.92f32;
                Ok(vec![s, (1.0 - s * s).sqrt(), 0.0, 0.0])
            },
            Some("UNRELATED") => Ok(vec![0.0, 0.0, 1.0, 0.0]),
            Some("SLOW") => {
                thread::sleep(Duration::from_millis(400));
                Ok(vec![0.0, 0.0, 0.0, 1.0])
            },
            _ => Err(EmbedError::Unavailable("provider offline".to_string())),
        }
    }
}

#[tokio::test]
async fn test_near_duplicate_is_high_and_still_persisted() {
    let (service, registry, index) = build(AngleProvider, Duration::from_secs(5));

    let first = service
        .check(&item("story-1", "ORIGINAL the house that forgot us"))
        .await;
    let second = service
        .check(&item("story-2", "RETELLING the house that forgot us, again"))
        .await;

    assert_eq!(first.signal.level, DuplicateLevel::Low);
    assert_eq!(second.signal.level, DuplicateLevel::High);
    assert!((second.signal.score - 0.92).abs() < 1e-3);
    assert_eq!(second.signal.nearest_id, Some(RecordId::new("story-1")));
    assert!(second.persisted);

    let stored = registry.get(&RecordId::new("story-2")).unwrap();
    assert_eq!(stored.dedup_signal, Some(DuplicateLevel::High));
    assert!(index.contains(&RecordId::new("story-2")));

    let stats = registry.stats();
    assert_eq!(stats.high_signal_ids, vec![RecordId::new("story-2")]);
}

#[tokio::test]
async fn test_high_records_are_deprioritized_not_excluded() {
    let (service, registry, _index) = build(AngleProvider, Duration::from_secs(5));
    service.check(&item("a", "ORIGINAL one")).await;
    service.check(&item("b", "RETELLING one")).await;

    // "a" is used once; "b" is unused but High.
    registry.mark_used(&RecordId::new("a")).unwrap();
    assert_eq!(
        registry.select_least_used(&SelectionFilter::new()),
        Some(RecordId::new("a"))
    );

    registry.retire(&RecordId::new("a")).unwrap();
    assert_eq!(
        registry.select_least_used(&SelectionFilter::new()),
        Some(RecordId::new("b"))
    );
}

#[tokio::test]
async fn test_batch_failures_yield_unknown_for_exactly_that_subset() {
    let (service, registry, index) = build(AngleProvider, Duration::from_secs(5));
    let items = vec![
        item("ok-1", "ORIGINAL"),
        item("bad-1", "offline text"),
        item("ok-2", "UNRELATED"),
        item("bad-2", ""),
        item("ok-3", "RETELLING"),
    ];

    let reports = service.check_batch(&items).await;
    let levels: Vec<(String, DuplicateLevel)> = reports
        .iter()
        .map(|r| (r.id.to_string(), r.signal.level))
        .collect();

    assert_eq!(
        levels,
        vec![
            ("ok-1".to_string(), DuplicateLevel::Low),
            ("bad-1".to_string(), DuplicateLevel::Unknown),
            ("ok-2".to_string(), DuplicateLevel::Low),
            ("bad-2".to_string(), DuplicateLevel::Unknown),
            ("ok-3".to_string(), DuplicateLevel::High),
        ]
    );
    assert!(reports.iter().all(|r| r.persisted));
    assert_eq!(registry.len(), 5);
    assert_eq!(index.count(), 3);
    assert_eq!(
        registry.stats().by_level.get(&DuplicateLevel::Unknown),
        Some(&2)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timeout_resolves_to_unknown() {
    let (service, registry, _index) = build(AngleProvider, Duration::from_millis(50));

    let report = service.check(&item("slow", "SLOW burn")).await;
    assert_eq!(report.signal.level, DuplicateLevel::Unknown);
    assert!(report.persisted);
    assert_eq!(
        registry.get(&RecordId::new("slow")).unwrap().dedup_signal,
        Some(DuplicateLevel::Unknown)
    );
}

#[tokio::test]
async fn test_hash_provider_flags_verbatim_repeats() {
    let (service, _registry, _index) =
        build(HashEmbeddingProvider::new(), Duration::from_secs(5));
    let text = "The lighthouse keeper counted the lights every night until one night there was one extra.";

    let first = service.check(&item("lh-1", text)).await;
    let repeat = service.check(&item("lh-2", text)).await;
    let empty = service.check(&item("lh-3", "   ")).await;

    assert_eq!(first.signal.level, DuplicateLevel::Low);
    assert_eq!(repeat.signal.level, DuplicateLevel::High);
    assert_eq!(empty.signal.level, DuplicateLevel::Unknown);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_saturated_provider_still_resolves_to_unknown_in_time() {
    let (service, registry, _index) = build(AngleProvider, Duration::from_millis(50));

    // Three hung calls hold every bulkhead permit for 400ms.
    let hung = service
        .check_batch(&[
            item("slow-1", "SLOW one"),
            item("slow-2", "SLOW two"),
            item("slow-3", "SLOW three"),
        ])
        .await;
    assert!(hung.iter().all(|r| r.signal.level == DuplicateLevel::Unknown));

    let start = Instant::now();
    let queued = service.check(&item("fresh", "ORIGINAL while saturated")).await;
    assert_eq!(queued.signal.level, DuplicateLevel::Unknown);
    assert!(queued.persisted);
    assert!(
        start.elapsed() < Duration::from_millis(150),
        "queued check waited {:?}",
        start.elapsed()
    );
    assert_eq!(
        registry.get(&RecordId::new("fresh")).unwrap().dedup_signal,
        Some(DuplicateLevel::Unknown)
    );
}

#[tokio::test]
async fn test_reindex_updates_registry_levels() {
    let (service, registry, index) = build(AngleProvider, Duration::from_secs(5));
    service.check(&item("tale-1", "ORIGINAL the drowned bell")).await;
    service.check(&item("tale-2", "UNRELATED the quiet orchard")).await;
    service.check(&item("tale-3", "UNRELATED a second orchard")).await;
    assert_eq!(registry.stats().high_signal_ids, vec![RecordId::new("tale-3")]);

    // The new corpus makes tale-2 a retelling of tale-1; tale-3 cannot be embedded.
    let corpus = vec![
        (RecordId::new("tale-1"), "ORIGINAL the drowned bell".to_string()),
        (RecordId::new("tale-2"), "RETELLING the drowned bell".to_string()),
        (RecordId::new("tale-3"), "offline".to_string()),
    ];
    let report = service.reindex(&corpus, &CancelFlag::new()).await.unwrap();

    assert_eq!(report.indexed, 2);
    assert_eq!(report.unknown, vec![RecordId::new("tale-3")]);
    assert_eq!(registry.stats().high_signal_ids, vec![RecordId::new("tale-2")]);
    assert_eq!(
        registry.get(&RecordId::new("tale-1")).unwrap().dedup_signal,
        Some(DuplicateLevel::Low)
    );
    assert_eq!(
        registry.get(&RecordId::new("tale-3")).unwrap().dedup_signal,
        Some(DuplicateLevel::Unknown)
    );
    assert!(!index.contains(&RecordId::new("tale-3")));
}
