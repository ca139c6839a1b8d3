//! Compatibility scoring and ranking.
//!
//! Scoring is pure and deterministic: the same target, candidate, and
//! configuration always produce the same verdict, and ranking has a total
//! order ending in the candidate id.

use super::avoid::AvoidRuleMatcher;
use super::model::{DimensionMatch, FingerprintModel};
use crate::config::{ScoringConfig, TaleprintConfig};
use crate::models::{
    CanonicalFingerprint, Category, CompatibilityVerdict, RankedCandidate, RecordId, RejectReason,
    Tier, Warning, WarningKind,
};
use crate::Result;
use std::sync::Arc;

/// Perfect score for five exact matches.
const MAX_SCORE: f32 = 5.0;

/// A knowledge fragment (or any unit) offered for injection into a target.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Registry id.
    pub id: RecordId,
    /// Declared category.
    pub category: Category,
    /// Canonical fingerprint.
    pub fingerprint: CanonicalFingerprint,
    /// Free-text rules naming things the candidate must not be paired with.
    pub avoid_rules: Vec<String>,
}

impl Candidate {
    /// Creates a candidate with no avoid rules.
    #[must_use]
    pub fn new(id: impl Into<RecordId>, category: Category, fingerprint: CanonicalFingerprint) -> Self {
        Self {
            id: id.into(),
            category,
            fingerprint,
            avoid_rules: Vec::new(),
        }
    }

    /// Builder method to set avoid rules.
    #[must_use]
    pub fn with_avoid_rules<S: Into<String>>(mut self, rules: impl IntoIterator<Item = S>) -> Self {
        self.avoid_rules = rules.into_iter().map(Into::into).collect();
        self
    }
}

/// Deterministic multi-dimension compatibility scorer.
#[derive(Debug, Clone)]
pub struct CompatibilityScorer {
    model: FingerprintModel,
    avoid: AvoidRuleMatcher,
    scoring: ScoringConfig,
}

impl CompatibilityScorer {
    /// Creates a scorer from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidConfig`] if the configuration is invalid
    /// or an avoid keyword cannot be compiled.
    pub fn new(config: &TaleprintConfig) -> Result<Self> {
        config.validate()?;
        let rules = Arc::new(config.rules.clone());
        Ok(Self {
            avoid: AvoidRuleMatcher::from_rules(&rules)?,
            model: FingerprintModel::new(rules),
            scoring: config.scoring,
        })
    }

    /// Returns the underlying fingerprint model.
    #[must_use]
    pub const fn model(&self) -> &FingerprintModel {
        &self.model
    }

    /// Scores `candidate` against `target`.
    ///
    /// An empty `category_filter` admits every category.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Validation`] if either fingerprint uses a value
    /// outside its enabled domain. Rejections are verdicts, not errors.
    pub fn score(
        &self,
        target: &CanonicalFingerprint,
        candidate: &Candidate,
        category_filter: &[Category],
    ) -> Result<CompatibilityVerdict> {
        let rules = self.model.rules();
        rules.validate_fingerprint(target)?;
        rules.validate_fingerprint(&candidate.fingerprint)?;

        let verdict = self.evaluate(target, candidate, category_filter);

        metrics::counter!("compatibility_verdicts_total", "tier" => verdict.tier.as_str())
            .increment(1);
        if verdict.hard_block {
            for reason in &verdict.block_reasons {
                metrics::counter!("compatibility_hard_blocks_total", "reason" => reason.clone())
                    .increment(1);
            }
        }
        tracing::debug!(
            candidate_id = %candidate.id,
            tier = %verdict.tier,
            score = verdict.score,
            warnings = verdict.warnings.len(),
            hard_block = verdict.hard_block,
            "Scored candidate"
        );

        Ok(verdict)
    }

    fn evaluate(
        &self,
        target: &CanonicalFingerprint,
        candidate: &Candidate,
        category_filter: &[Category],
    ) -> CompatibilityVerdict {
        if !category_filter.is_empty() && !category_filter.contains(&candidate.category) {
            return CompatibilityVerdict::rejected(RejectReason::CategoryMismatch, 0.0, Vec::new());
        }

        let blocks = self.model.hard_blocks(target, &candidate.fingerprint);
        if !blocks.is_empty() {
            return CompatibilityVerdict::hard_blocked(&blocks);
        }

        let mut score = 0.0f32;
        let mut warnings = Vec::new();
        for cmp in self.model.compare(target, &candidate.fingerprint) {
            score += cmp.outcome.score();
            match cmp.outcome {
                DimensionMatch::Exact => {},
                DimensionMatch::Wildcard => warnings.push(Warning::new(
                    WarningKind::WildcardMatch,
                    format!(
                        "{}: '{}' vs '{}' reconciled by wildcard (half credit)",
                        cmp.dimension, cmp.target, cmp.candidate
                    ),
                )),
                DimensionMatch::Mismatch => warnings.push(Warning::new(
                    WarningKind::DimensionMismatch,
                    format!(
                        "{}: target '{}' vs candidate '{}'",
                        cmp.dimension, cmp.target, cmp.candidate
                    ),
                )),
            }
        }

        let scan = self.avoid.scan(target, &candidate.avoid_rules);
        for rule in &scan.unparsed {
            warnings.push(Warning::new(
                WarningKind::UnparsedConstraint,
                format!("avoid rule needs manual review: '{rule}'"),
            ));
        }
        if scan.has_conflict() {
            for conflict in &scan.conflicts {
                warnings.push(Warning::new(
                    WarningKind::AvoidConflict,
                    format!(
                        "avoid rule '{}' forbids {}={}",
                        conflict.rule, conflict.dimension, conflict.value
                    ),
                ));
            }
            return CompatibilityVerdict::rejected(
                RejectReason::ExplicitAvoidConflict,
                score,
                warnings,
            );
        }

        if score < self.scoring.accept_threshold {
            return CompatibilityVerdict::rejected(
                RejectReason::InsufficientCompatibility,
                score,
                warnings,
            );
        }

        let tier = self.tier_for(score, &warnings);
        CompatibilityVerdict::accepted(tier, score, warnings)
    }

    fn tier_for(&self, score: f32, warnings: &[Warning]) -> Tier {
        if (score - MAX_SCORE).abs() < f32::EPSILON && warnings.is_empty() {
            Tier::Perfect
        } else if score >= self.scoring.good_threshold {
            Tier::Good
        } else {
            Tier::Acceptable
        }
    }
}

/// Ranks scored candidates: rejected ones are dropped, the rest are ordered
/// by tier (best first), then fewer warnings, then id ascending.
#[must_use]
pub fn rank(scored: impl IntoIterator<Item = (RecordId, CompatibilityVerdict)>) -> Vec<RankedCandidate> {
    let mut ranked: Vec<RankedCandidate> = scored
        .into_iter()
        .filter(|(_, verdict)| verdict.is_accepted())
        .map(|(id, verdict)| RankedCandidate { id, verdict })
        .collect();

    ranked.sort_by(|a, b| {
        a.verdict
            .tier
            .cmp(&b.verdict.tier)
            .then_with(|| a.verdict.warnings.len().cmp(&b.verdict.warnings.len()))
            .then_with(|| a.id.cmp(&b.id))
    });
    ranked
}
