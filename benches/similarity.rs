//! Benchmarks for the similarity index and hash embeddings.
//!
//! Benchmark targets:
//! - Nearest-neighbour query over 1,000 records: <5ms
//! - Nearest-neighbour query over 10,000 records: <50ms
//!
//! The in-memory index is an exhaustive scan, so query cost is expected to
//! grow linearly with the record count.

// Criterion macros generate items without docs - this is expected for benchmarks
// Benchmarks use expect/unwrap for simplicity - panics are acceptable in benchmarks
#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::time::Duration;
use taleprint::embedding::{DEFAULT_DIMENSIONS, EmbeddingProvider, HashEmbeddingProvider};
use taleprint::storage::{CancelFlag, SimilarityRecord};
use taleprint::{MemorySimilarityIndex, RecordId, SimilarityIndex};

// ============================================================================
// Helper Functions
// ============================================================================

const SAMPLE_CONTENT: &[&str] = &[
    "The lighthouse keeper counted one light too many",
    "A voice on the baby monitor that knows your name",
    "The village well answers questions for a price",
    "Every mirror in the house shows the room a minute late",
    "The elevator stops at a floor the building does not have",
];

fn records(provider: &HashEmbeddingProvider, count: usize) -> Vec<SimilarityRecord> {
    (0..count)
        .map(|i| {
            let text = format!("{} - retelling {i}", SAMPLE_CONTENT[i % SAMPLE_CONTENT.len()]);
            SimilarityRecord::new(
                RecordId::new(format!("r{i:05}")),
                provider.embed(&text).unwrap(),
            )
        })
        .collect()
}

fn populated(provider: &HashEmbeddingProvider, count: usize) -> MemorySimilarityIndex {
    let index = MemorySimilarityIndex::new(DEFAULT_DIMENSIONS);
    index
        .rebuild(records(provider, count), &CancelFlag::new())
        .unwrap();
    index
}

// ============================================================================
// Similarity Benchmarks
// ============================================================================

fn bench_hash_embedding(c: &mut Criterion) {
    let provider = HashEmbeddingProvider::new();
    let mut group = c.benchmark_group("hash_embedding");
    group.throughput(Throughput::Elements(1));
    group.bench_function("embed", |b| {
        b.iter(|| provider.embed(black_box(SAMPLE_CONTENT[0])).unwrap());
    });
    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let provider = HashEmbeddingProvider::new();
    let query = provider.embed(SAMPLE_CONTENT[2]).unwrap();

    let mut group = c.benchmark_group("index_query");
    group.measurement_time(Duration::from_secs(10));
    for size in [1_000, 10_000] {
        let index = populated(&provider, size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &index, |b, index| {
            b.iter(|| index.query(black_box(&query), 5, None).unwrap());
        });
    }
    group.finish();
}

fn bench_rebuild(c: &mut Criterion) {
    let provider = HashEmbeddingProvider::new();
    let source = records(&provider, 1_000);
    let index = MemorySimilarityIndex::new(DEFAULT_DIMENSIONS);

    let mut group = c.benchmark_group("index_rebuild");
    group.throughput(Throughput::Elements(1_000));
    group.bench_function("1000", |b| {
        b.iter(|| index.rebuild(source.clone(), &CancelFlag::new()).unwrap());
    });
    group.finish();
}

criterion_group!(benches, bench_hash_embedding, bench_query, bench_rebuild);
criterion_main!(benches);
