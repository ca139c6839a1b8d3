//! Data models for taleprint.
//!
//! This module contains all the core data structures used throughout the system.

mod category;
pub mod fingerprint;
mod record;
mod signal;
mod verdict;

pub use category::Category;
pub use fingerprint::{
    Antagonist, CanonicalFingerprint, Dimension, DimensionValue, Mechanism, PrimaryFear,
    Setting, Twist, WILDCARD,
};
pub use record::{RecordId, RecordStatus, RegistryRecord};
pub use signal::{DuplicateLevel, DuplicateSignal};
pub use verdict::{
    CompatibilityVerdict, RankedCandidate, RejectReason, Tier, Warning, WarningKind,
};
