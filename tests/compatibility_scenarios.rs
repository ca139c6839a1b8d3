//! End-to-end compatibility scenarios.
//!
//! Drives the scorer and service through the public API:
//! - The three reference candidates against a digital identity-erasure target
//! - Ranking determinism across input orders
//! - Config-driven rule extension (denylist, keywords, domains)

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use taleprint::services::compatibility::rank;
use taleprint::{
    Candidate, CanonicalFingerprint, Category, CompatibilityScorer, CompatibilityService,
    Registry, RejectReason, TaleprintConfig, Tier, WarningKind,
};

const TARGET: &str = "setting=digital,fear=identity_erasure,antagonist=technology,mechanism=impersonation,twist=self_is_monster";

fn fp(s: &str) -> CanonicalFingerprint {
    s.parse().expect("valid fingerprint")
}

fn default_scorer() -> CompatibilityScorer {
    CompatibilityScorer::new(&TaleprintConfig::default()).unwrap()
}

// ============================================================================
// Reference scenario
// ============================================================================

#[test]
fn test_candidate_a_exact_match_is_perfect() {
    let target = fp(TARGET);
    let a = Candidate::new("A", Category::Technology, target);

    let verdict = default_scorer().score(&target, &a, &[]).unwrap();
    assert_eq!(verdict.tier, Tier::Perfect);
    assert!((verdict.score - 5.0).abs() < f32::EPSILON);
    assert!(verdict.warnings.is_empty());
    assert!(!verdict.hard_block);
}

#[test]
fn test_candidate_b_two_mismatches_is_accepted_with_two_warnings() {
    let target = fp(TARGET);
    let b = Candidate::new(
        "B",
        Category::Technology,
        fp("setting=digital,fear=identity_erasure,antagonist=technology,mechanism=observation,twist=watcher_revealed"),
    );

    let verdict = default_scorer().score(&target, &b, &[]).unwrap();
    assert!(verdict.is_accepted());
    assert_eq!(verdict.tier, Tier::Acceptable);
    assert!((verdict.score - 3.0).abs() < f32::EPSILON);
    assert_eq!(verdict.warnings.len(), 2);
    assert_eq!(verdict.warning_count(WarningKind::DimensionMismatch), 2);
}

#[test]
fn test_candidate_c_fear_only_difference_is_hard_blocked() {
    let target = fp(TARGET);
    let c = Candidate::new(
        "C",
        Category::Technology,
        fp("setting=digital,fear=surveillance,antagonist=technology,mechanism=impersonation,twist=self_is_monster"),
    );

    let verdict = default_scorer().score(&target, &c, &[]).unwrap();
    assert_eq!(verdict.tier, Tier::Rejected);
    assert!(verdict.hard_block);
    assert!(verdict.has_reason(RejectReason::CoreFearMismatch));
    assert_eq!(verdict.block_reasons, vec!["core_fear_mismatch"]);
}

#[test]
fn test_service_ranks_reference_candidates() {
    let registry = Arc::new(Registry::in_memory());
    let service = CompatibilityService::new(default_scorer(), Arc::clone(&registry));
    let target = fp(TARGET);
    let candidates = vec![
        Candidate::new(
            "C",
            Category::Technology,
            fp("setting=digital,fear=surveillance,antagonist=technology,mechanism=impersonation,twist=self_is_monster"),
        ),
        Candidate::new(
            "B",
            Category::Technology,
            fp("setting=digital,fear=identity_erasure,antagonist=technology,mechanism=observation,twist=watcher_revealed"),
        ),
        Candidate::new("A", Category::Technology, target),
    ];

    let ranked = service.evaluate_many(&target, &candidates, &[]).unwrap();
    let ids: Vec<&str> = ranked.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["A", "B"]);

    assert_eq!(registry.len(), 3);
    let stored = registry.get(&"C".into()).unwrap();
    assert_eq!(stored.last_outcome, Some(Tier::Rejected));
}

// ============================================================================
// Rejection precedence
// ============================================================================

#[test]
fn test_category_filter_runs_before_everything() {
    let target = fp(TARGET);
    let c = Candidate::new("x", Category::History, target).with_avoid_rules(["no online stories"]);

    let verdict = default_scorer()
        .score(&target, &c, &[Category::Technology])
        .unwrap();
    assert_eq!(verdict.block_reasons, vec!["category_mismatch"]);
    assert!(verdict.warnings.is_empty());
}

#[test]
fn test_avoid_conflict_overrides_good_tier() {
    let target = fp(TARGET);
    let c = Candidate::new(
        "x",
        Category::Technology,
        fp("setting=digital,fear=identity_erasure,antagonist=technology,mechanism=impersonation,twist=cyclical"),
    )
    .with_avoid_rules(["Avoid pairing with doppelganger plots", "keep it short"]);

    let verdict = default_scorer().score(&target, &c, &[]).unwrap();
    assert_eq!(verdict.tier, Tier::Rejected);
    assert!(!verdict.hard_block);
    assert!(verdict.has_reason(RejectReason::ExplicitAvoidConflict));
    assert_eq!(verdict.warning_count(WarningKind::AvoidConflict), 1);
    assert_eq!(verdict.warning_count(WarningKind::UnparsedConstraint), 1);
}

#[test]
fn test_denylisted_antagonists_block_even_with_wildcards_elsewhere() {
    let target = fp("setting=any,fear=mortality,antagonist=supernatural,mechanism=any,twist=any");
    let c = Candidate::new(
        "x",
        Category::Folklore,
        fp("setting=any,fear=mortality,antagonist=institution,mechanism=any,twist=any"),
    );
    let verdict = default_scorer().score(&target, &c, &[]).unwrap();
    assert!(verdict.hard_block);
    assert_eq!(verdict.block_reasons, vec!["exclusive_antagonist_pair"]);
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn test_ranking_is_independent_of_input_order() {
    let scorer = default_scorer();
    let target = fp(TARGET);
    let candidates = [
        Candidate::new("m", Category::Technology, target),
        Candidate::new("k", Category::Technology, target),
        Candidate::new(
            "q",
            Category::Technology,
            fp("setting=any,fear=identity_erasure,antagonist=technology,mechanism=impersonation,twist=self_is_monster"),
        ),
        Candidate::new(
            "b",
            Category::Technology,
            fp("setting=digital,fear=identity_erasure,antagonist=any,mechanism=any,twist=self_is_monster"),
        ),
    ];

    let forward: Vec<String> = rank(
        candidates
            .iter()
            .map(|c| (c.id.clone(), scorer.score(&target, c, &[]).unwrap())),
    )
    .into_iter()
    .map(|r| r.id.to_string())
    .collect();
    let backward: Vec<String> = rank(
        candidates
            .iter()
            .rev()
            .map(|c| (c.id.clone(), scorer.score(&target, c, &[]).unwrap())),
    )
    .into_iter()
    .map(|r| r.id.to_string())
    .collect();

    assert_eq!(forward, backward);
    assert_eq!(forward, vec!["k", "m", "q", "b"]);
}

// ============================================================================
// Configuration-driven rules
// ============================================================================

#[test]
fn test_config_extends_denylist_and_keywords() {
    let config = TaleprintConfig::from_toml(
        r#"
        [rules]
        antagonist_denylist = [["creature", "technology"]]

        [rules.avoid_keywords]
        "mechanism.impersonation" = ["skinwalker"]
        "#,
    )
    .unwrap()
    .validated()
    .unwrap();
    let scorer = CompatibilityScorer::new(&config).unwrap();
    let target = fp(TARGET);

    let creature = Candidate::new(
        "x",
        Category::Folklore,
        fp("setting=digital,fear=identity_erasure,antagonist=creature,mechanism=impersonation,twist=self_is_monster"),
    );
    let verdict = scorer.score(&target, &creature, &[]).unwrap();
    assert!(verdict.has_reason(RejectReason::ExclusiveAntagonistPair));

    let skinwalker = Candidate::new("y", Category::Folklore, target)
        .with_avoid_rules(["no skinwalker stories"]);
    let verdict = scorer.score(&target, &skinwalker, &[]).unwrap();
    assert!(verdict.has_reason(RejectReason::ExplicitAvoidConflict));
}

#[test]
fn test_disabled_domain_value_is_validation_error() {
    let config = TaleprintConfig::from_toml(
        r#"
        [rules.domains]
        twist = ["any", "cyclical"]
        "#,
    )
    .unwrap();
    let scorer = CompatibilityScorer::new(&config).unwrap();
    let target = fp(TARGET);
    let result = scorer.score(&target, &Candidate::new("x", Category::Story, target), &[]);
    assert!(matches!(result, Err(taleprint::Error::Validation { .. })));
}
