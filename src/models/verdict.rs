//! Compatibility verdict types.

use super::RecordId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Compatibility tier of a scored candidate.
///
/// Ordered from best to worst, so sorting ascending puts `Perfect` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// All five dimensions match exactly, no warnings.
    Perfect,
    /// Score of at least 4.0.
    Good,
    /// Score in `[3.0, 4.0)`.
    Acceptable,
    /// Not injectable; see `block_reasons`.
    Rejected,
}

impl Tier {
    /// Returns the tier as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Perfect => "perfect",
            Self::Good => "good",
            Self::Acceptable => "acceptable",
            Self::Rejected => "rejected",
        }
    }

    /// Parses a tier name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "perfect" => Some(Self::Perfect),
            "good" => Some(Self::Good),
            "acceptable" => Some(Self::Acceptable),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of a non-fatal compatibility warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Two concrete values differ in a dimension without a hard block.
    DimensionMismatch,
    /// Values differ but one side is the wildcard (half credit).
    WildcardMatch,
    /// A free-text avoid rule could not be keyword-matched; needs manual review.
    UnparsedConstraint,
    /// An avoid rule names one of the target's values. Accompanies an
    /// `explicit_avoid_conflict` rejection.
    AvoidConflict,
}

impl WarningKind {
    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DimensionMismatch => "dimension_mismatch",
            Self::WildcardMatch => "wildcard_match",
            Self::UnparsedConstraint => "unparsed_constraint",
            Self::AvoidConflict => "avoid_conflict",
        }
    }
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A warning attached to a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// Warning kind.
    pub kind: WarningKind,
    /// Human-readable description of the discrepancy.
    pub message: String,
}

impl Warning {
    /// Creates a new warning.
    #[must_use]
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Why a candidate was rejected.
///
/// The first three variants are hard blocks: no score can override them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The identity-defining fear differs.
    CoreFearMismatch,
    /// Both settings are concrete and differ.
    ConcreteSettingMismatch,
    /// The antagonist pair is on the mutual-exclusion denylist.
    ExclusiveAntagonistPair,
    /// The candidate's category is outside the caller's filter.
    CategoryMismatch,
    /// The accumulated score is below the acceptance threshold.
    InsufficientCompatibility,
    /// A candidate avoid rule names one of the target's values.
    ExplicitAvoidConflict,
}

impl RejectReason {
    /// Returns the reason code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CoreFearMismatch => "core_fear_mismatch",
            Self::ConcreteSettingMismatch => "concrete_setting_mismatch",
            Self::ExclusiveAntagonistPair => "exclusive_antagonist_pair",
            Self::CategoryMismatch => "category_mismatch",
            Self::InsufficientCompatibility => "insufficient_compatibility",
            Self::ExplicitAvoidConflict => "explicit_avoid_conflict",
        }
    }

    /// Returns true for the hard-block classes.
    #[must_use]
    pub const fn is_hard_block(&self) -> bool {
        matches!(
            self,
            Self::CoreFearMismatch | Self::ConcreteSettingMismatch | Self::ExclusiveAntagonistPair
        )
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of scoring a candidate fingerprint against a target.
///
/// `hard_block == true` always comes with `tier == Rejected`. The score is
/// only meaningful when `hard_block == false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityVerdict {
    /// Assigned tier.
    pub tier: Tier,
    /// Accumulated score in `[0.0, 5.0]`.
    pub score: f32,
    /// Warnings in the order they were produced.
    pub warnings: Vec<Warning>,
    /// Whether a hard-block predicate fired.
    pub hard_block: bool,
    /// Rejection reason codes, in predicate declaration order.
    pub block_reasons: Vec<String>,
}

impl CompatibilityVerdict {
    /// Creates an accepted verdict.
    #[must_use]
    pub const fn accepted(tier: Tier, score: f32, warnings: Vec<Warning>) -> Self {
        Self {
            tier,
            score,
            warnings,
            hard_block: false,
            block_reasons: Vec::new(),
        }
    }

    /// Creates a soft rejection (not a hard block).
    #[must_use]
    pub fn rejected(reason: RejectReason, score: f32, warnings: Vec<Warning>) -> Self {
        Self {
            tier: Tier::Rejected,
            score,
            warnings,
            hard_block: false,
            block_reasons: vec![reason.as_str().to_string()],
        }
    }

    /// Creates a hard-block rejection listing every positive predicate.
    #[must_use]
    pub fn hard_blocked(reasons: &[RejectReason]) -> Self {
        Self {
            tier: Tier::Rejected,
            score: 0.0,
            warnings: Vec::new(),
            hard_block: true,
            block_reasons: reasons.iter().map(|r| r.as_str().to_string()).collect(),
        }
    }

    /// Returns true if the candidate may be injected.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.tier != Tier::Rejected
    }

    /// Returns true if the verdict carries the given reason.
    #[must_use]
    pub fn has_reason(&self, reason: RejectReason) -> bool {
        self.block_reasons.iter().any(|r| r == reason.as_str())
    }

    /// Counts warnings of a given kind.
    #[must_use]
    pub fn warning_count(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }
}

/// An accepted candidate in ranked order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    /// Candidate id.
    pub id: RecordId,
    /// The candidate's verdict.
    pub verdict: CompatibilityVerdict,
}
