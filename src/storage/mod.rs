//! Storage layer.
//!
//! Two independent stores linked only by record id:
//! - **Registry**: authoritative records (memory or `SQLite`)
//! - **Similarity index**: embedding vectors for nearest-neighbour queries

// Allow cast precision loss for score and latency calculations.
#![allow(clippy::cast_precision_loss)]
// Millisecond latencies comfortably fit in u64.
#![allow(clippy::cast_possible_truncation)]
// Allow significant_drop_tightening - dropping database connections slightly early
// provides no meaningful benefit.
#![allow(clippy::significant_drop_tightening)]

pub mod registry;
pub mod traits;
pub mod vector;

pub use registry::{MemoryRegistryStore, SqliteRegistryStore};
pub use traits::{CancelFlag, RegistryStore, SimilarityIndex, SimilarityRecord};
pub use vector::MemorySimilarityIndex;

use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

/// Acquires a mutex, recovering from poison.
///
/// A panic in a previous critical section leaves the guarded value usable for
/// the stores in this crate, so the poison is logged and cleared.
pub(crate) fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Storage mutex was poisoned, recovering");
            metrics::counter!("storage_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Records `storage_operations_total` and `storage_operation_duration_ms`.
pub(crate) fn record_operation_metrics(
    backend: &'static str,
    operation: &'static str,
    start: Instant,
    status: &'static str,
) {
    metrics::counter!(
        "storage_operations_total",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "storage_operation_duration_ms",
        "backend" => backend,
        "operation" => operation
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}
