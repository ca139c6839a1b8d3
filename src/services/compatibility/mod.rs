//! Fingerprint compatibility.
//!
//! - [`FingerprintModel`]: per-dimension matrix and hard-block predicates
//! - [`AvoidRuleMatcher`]: keyword scan of free-text avoid rules
//! - [`CompatibilityScorer`]: verdicts and ranking
//! - [`CompatibilityService`]: scoring plus registry bookkeeping

mod avoid;
mod model;
mod scorer;
mod service;

pub use avoid::{AvoidConflict, AvoidRuleMatcher, AvoidScan};
pub use model::{CompatibilityMatrix, DimensionComparison, DimensionMatch, FingerprintModel};
pub use scorer::{Candidate, CompatibilityScorer, rank};
pub use service::CompatibilityService;
