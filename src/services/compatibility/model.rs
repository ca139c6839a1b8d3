//! Fingerprint compatibility rules.
//!
//! Per-dimension comparison is generic over [`DimensionValue`], so every
//! dimension is matched on its own closed enumeration. The three hard-block
//! predicates look at a *pair* of fingerprints and are independent of score.

use crate::config::RuleTables;
use crate::models::{CanonicalFingerprint, Dimension, DimensionValue, RejectReason};
use std::sync::Arc;

/// How two values of one dimension relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionMatch {
    /// Identical values.
    Exact,
    /// Values differ, but one side is the wildcard.
    Wildcard,
    /// Two different concrete values.
    Mismatch,
}

impl DimensionMatch {
    /// Score contributed to the accumulated total.
    #[must_use]
    pub const fn score(self) -> f32 {
        match self {
            Self::Exact => 1.0,
            Self::Wildcard => 0.5,
            Self::Mismatch => 0.0,
        }
    }
}

/// Compatibility matrix for a single dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompatibilityMatrix;

impl CompatibilityMatrix {
    /// Returns true if both values are identical.
    #[must_use]
    pub fn exact<V: DimensionValue>(a: V, b: V) -> bool {
        a == b
    }

    /// Returns true if the values differ but the wildcard reconciles them.
    #[must_use]
    pub fn compatible_mismatch<V: DimensionValue>(a: V, b: V) -> bool {
        a != b && (a.is_wildcard() || b.is_wildcard())
    }

    /// Returns true if the values are two different concrete values.
    #[must_use]
    pub fn incompatible<V: DimensionValue>(a: V, b: V) -> bool {
        a != b && !a.is_wildcard() && !b.is_wildcard()
    }

    /// Classifies a pair of values.
    #[must_use]
    pub fn compare<V: DimensionValue>(a: V, b: V) -> DimensionMatch {
        if Self::exact(a, b) {
            DimensionMatch::Exact
        } else if Self::compatible_mismatch(a, b) {
            DimensionMatch::Wildcard
        } else {
            DimensionMatch::Mismatch
        }
    }
}

/// Outcome of comparing one dimension of two fingerprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionComparison {
    /// The dimension compared.
    pub dimension: Dimension,
    /// Target's value.
    pub target: &'static str,
    /// Candidate's value.
    pub candidate: &'static str,
    /// Relation between the two.
    pub outcome: DimensionMatch,
}

/// Pairwise fingerprint rules backed by the configured rule tables.
#[derive(Debug, Clone)]
pub struct FingerprintModel {
    rules: Arc<RuleTables>,
}

impl FingerprintModel {
    /// Creates a model over the given rule tables.
    #[must_use]
    pub const fn new(rules: Arc<RuleTables>) -> Self {
        Self { rules }
    }

    /// Returns the rule tables.
    #[must_use]
    pub fn rules(&self) -> &RuleTables {
        &self.rules
    }

    /// Compares all five dimensions in declaration order.
    #[must_use]
    pub fn compare(
        &self,
        target: &CanonicalFingerprint,
        candidate: &CanonicalFingerprint,
    ) -> [DimensionComparison; 5] {
        let outcome = |dimension: Dimension| match dimension {
            Dimension::Setting => CompatibilityMatrix::compare(target.setting, candidate.setting),
            Dimension::PrimaryFear => {
                CompatibilityMatrix::compare(target.primary_fear, candidate.primary_fear)
            },
            Dimension::Antagonist => {
                CompatibilityMatrix::compare(target.antagonist, candidate.antagonist)
            },
            Dimension::Mechanism => {
                CompatibilityMatrix::compare(target.mechanism, candidate.mechanism)
            },
            Dimension::Twist => CompatibilityMatrix::compare(target.twist, candidate.twist),
        };

        Dimension::ALL.map(|dimension| DimensionComparison {
            dimension,
            target: target.value_of(dimension),
            candidate: candidate.value_of(dimension),
            outcome: outcome(dimension),
        })
    }

    /// Evaluates the hard-block predicates in declaration order and returns
    /// every one that fired.
    #[must_use]
    pub fn hard_blocks(
        &self,
        target: &CanonicalFingerprint,
        candidate: &CanonicalFingerprint,
    ) -> Vec<RejectReason> {
        let mut reasons = Vec::new();
        if Self::core_fear_mismatch(target, candidate) {
            reasons.push(RejectReason::CoreFearMismatch);
        }
        if Self::concrete_setting_mismatch(target, candidate) {
            reasons.push(RejectReason::ConcreteSettingMismatch);
        }
        if self.exclusive_antagonist_pair(target, candidate) {
            reasons.push(RejectReason::ExclusiveAntagonistPair);
        }
        reasons
    }

    /// The identity-defining fear differs.
    #[must_use]
    pub fn core_fear_mismatch(
        target: &CanonicalFingerprint,
        candidate: &CanonicalFingerprint,
    ) -> bool {
        target.primary_fear != candidate.primary_fear
    }

    /// Both settings are concrete and differ.
    #[must_use]
    pub fn concrete_setting_mismatch(
        target: &CanonicalFingerprint,
        candidate: &CanonicalFingerprint,
    ) -> bool {
        CompatibilityMatrix::incompatible(target.setting, candidate.setting)
    }

    /// Both antagonists are concrete and the pair is on the denylist.
    #[must_use]
    pub fn exclusive_antagonist_pair(
        &self,
        target: &CanonicalFingerprint,
        candidate: &CanonicalFingerprint,
    ) -> bool {
        !target.antagonist.is_wildcard()
            && !candidate.antagonist.is_wildcard()
            && self
                .rules
                .is_exclusive_pair(target.antagonist, candidate.antagonist)
    }
}
