//! Business logic services.
//!
//! Services orchestrate storage backends and provide high-level operations.

pub mod compatibility;
pub mod deduplication;
mod registry;

pub use compatibility::{Candidate, CompatibilityScorer, CompatibilityService};
pub use deduplication::{DedupItem, DedupReport, DeduplicationService, DuplicateClassifier};
pub use registry::{Registry, RegistryStats, SelectionFilter};
