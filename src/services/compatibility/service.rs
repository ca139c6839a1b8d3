//! Compatibility evaluation with registry bookkeeping.

use super::scorer::{Candidate, CompatibilityScorer, rank};
use crate::models::{CanonicalFingerprint, Category, CompatibilityVerdict, RankedCandidate};
use crate::services::Registry;
use crate::Result;
use std::sync::Arc;
use tracing::instrument;

/// Scores candidates and records each verdict tier on the candidate's
/// registry record.
#[derive(Debug, Clone)]
pub struct CompatibilityService {
    scorer: CompatibilityScorer,
    registry: Arc<Registry>,
}

impl CompatibilityService {
    /// Creates a service over a scorer and a shared registry.
    #[must_use]
    pub const fn new(scorer: CompatibilityScorer, registry: Arc<Registry>) -> Self {
        Self { scorer, registry }
    }

    /// Returns the scorer.
    #[must_use]
    pub const fn scorer(&self) -> &CompatibilityScorer {
        &self.scorer
    }

    /// Scores one candidate and upserts its registry record.
    ///
    /// A registry write failure is logged; the verdict is still returned.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Validation`] for an out-of-domain fingerprint.
    #[instrument(
        skip(self, target, candidate, category_filter),
        fields(operation = "evaluate_compatibility", candidate_id = %candidate.id)
    )]
    pub fn evaluate(
        &self,
        target: &CanonicalFingerprint,
        candidate: &Candidate,
        category_filter: &[Category],
    ) -> Result<CompatibilityVerdict> {
        let verdict = self.scorer.score(target, candidate, category_filter)?;

        if let Err(e) = self.registry.record_compatibility_outcome(
            &candidate.id,
            candidate.fingerprint,
            candidate.category,
            verdict.tier,
        ) {
            tracing::warn!(error = %e, "Failed to record compatibility outcome");
        }

        Ok(verdict)
    }

    /// Scores every candidate and returns the accepted ones in rank order.
    ///
    /// # Errors
    ///
    /// Returns the first validation error; nothing is recorded in that case
    /// for the remaining candidates.
    #[instrument(
        skip(self, target, candidates, category_filter),
        fields(operation = "evaluate_many", candidates = candidates.len())
    )]
    pub fn evaluate_many(
        &self,
        target: &CanonicalFingerprint,
        candidates: &[Candidate],
        category_filter: &[Category],
    ) -> Result<Vec<RankedCandidate>> {
        let mut scored = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let verdict = self.evaluate(target, candidate, category_filter)?;
            scored.push((candidate.id.clone(), verdict));
        }

        let ranked = rank(scored);
        tracing::debug!(accepted = ranked.len(), "Ranked candidates");
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TaleprintConfig;
    use crate::models::{RecordId, Tier};

    const TARGET: &str = "setting=digital,fear=identity_erasure,antagonist=technology,mechanism=impersonation,twist=self_is_monster";

    fn service() -> (CompatibilityService, Arc<Registry>) {
        let registry = Arc::new(Registry::in_memory());
        let scorer = CompatibilityScorer::new(&TaleprintConfig::default()).unwrap();
        (CompatibilityService::new(scorer, Arc::clone(&registry)), registry)
    }

    #[test]
    fn test_evaluate_records_last_outcome() {
        let (service, registry) = service();
        let target: CanonicalFingerprint = TARGET.parse().unwrap();
        let candidate = Candidate::new("frag-1", Category::Technology, target);

        let verdict = service.evaluate(&target, &candidate, &[]).unwrap();
        assert_eq!(verdict.tier, Tier::Perfect);
        assert_eq!(
            registry.get(&RecordId::new("frag-1")).unwrap().last_outcome,
            Some(Tier::Perfect)
        );
    }

    #[test]
    fn test_evaluate_many_drops_rejections() {
        let (service, registry) = service();
        let target: CanonicalFingerprint = TARGET.parse().unwrap();
        let rejected: CanonicalFingerprint =
            "setting=digital,fear=madness,antagonist=technology,mechanism=impersonation,twist=self_is_monster"
                .parse()
                .unwrap();
        let candidates = vec![
            Candidate::new("b", Category::Technology, target),
            Candidate::new("a", Category::Technology, rejected),
        ];

        let ranked = service.evaluate_many(&target, &candidates, &[]).unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].id, RecordId::new("b"));
        assert_eq!(
            registry.get(&RecordId::new("a")).unwrap().last_outcome,
            Some(Tier::Rejected)
        );
    }
}
