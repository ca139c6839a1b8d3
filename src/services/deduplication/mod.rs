//! Semantic duplicate detection for generated artifacts.
//!
//! Detection is advisory: every artifact is persisted, and the signal is
//! surfaced to the selection policy rather than used to refuse content.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    DeduplicationService                      │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────┐  │
//! │  │ BoundedEmbedder│  │ SimilarityIndex│  │ Duplicate      │  │
//! │  │                │─▶│                │─▶│ Classifier     │  │
//! │  │ permits+timeout│  │ cosine top-k   │  │ low/med/high   │  │
//! │  └────────────────┘  └────────────────┘  └────────────────┘  │
//! │                              │                               │
//! │                              ▼                               │
//! │                         Registry                             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use taleprint::services::deduplication::{DedupItem, DeduplicationService};
//!
//! let service = DeduplicationService::new(embedder, index, registry, &config)?;
//! let report = service.check(&DedupItem::new("story-17", fingerprint, Category::Story, text)).await;
//! if report.signal.is_high() {
//!     println!("near duplicate of {:?}", report.signal.nearest_id);
//! }
//! ```

mod classifier;
mod service;

pub use classifier::DuplicateClassifier;
pub use service::{DedupItem, DedupReport, DeduplicationService, ReconcileReport, ReindexReport};
