//! Free-text avoid-rule scanning.
//!
//! A rule is *parsed* when it mentions at least one known keyword (whole word,
//! case-insensitive). Parsed rules conflict when a keyword belongs to one of
//! the target's concrete values. Rules with no known keyword are returned as
//! unparsed so a human can review them; they never reject on their own.

use crate::config::RuleTables;
use crate::models::{CanonicalFingerprint, Dimension};
use crate::{Error, Result};
use regex::{Regex, RegexBuilder};

/// A rule that names one of the target's values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvoidConflict {
    /// The offending rule text.
    pub rule: String,
    /// Dimension of the matched value.
    pub dimension: Dimension,
    /// The target's value the rule forbids.
    pub value: &'static str,
}

/// Result of scanning a candidate's avoid rules against a target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvoidScan {
    /// Rules that forbid one of the target's values.
    pub conflicts: Vec<AvoidConflict>,
    /// Rules that matched no known keyword.
    pub unparsed: Vec<String>,
}

impl AvoidScan {
    /// Returns true if any rule conflicts with the target.
    #[must_use]
    pub fn has_conflict(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

#[derive(Debug, Clone)]
struct KeywordPattern {
    dimension: Dimension,
    value: &'static str,
    regex: Regex,
}

/// Compiled keyword matcher built from the rule tables.
#[derive(Debug, Clone)]
pub struct AvoidRuleMatcher {
    patterns: Vec<KeywordPattern>,
}

impl AvoidRuleMatcher {
    /// Compiles one whole-word pattern per `(dimension, value)` keyword list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a keyword pattern fails to compile.
    pub fn from_rules(rules: &RuleTables) -> Result<Self> {
        let mut patterns = Vec::with_capacity(rules.avoid_keywords().len());

        for ((dimension, value), keywords) in rules.avoid_keywords() {
            if keywords.is_empty() {
                continue;
            }
            let alternatives: Vec<String> = keywords
                .iter()
                .map(|k| {
                    k.split_whitespace()
                        .map(regex::escape)
                        .collect::<Vec<_>>()
                        .join(r"\s+")
                })
                .filter(|k| !k.is_empty())
                .collect();
            let pattern = format!(r"\b(?:{})\b", alternatives.join("|"));
            let regex = RegexBuilder::new(&pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| {
                    Error::InvalidConfig(format!("avoid keywords for {dimension}.{value}: {e}"))
                })?;

            patterns.push(KeywordPattern {
                dimension: *dimension,
                value: *value,
                regex,
            });
        }

        Ok(Self { patterns })
    }

    /// Scans `rules` against the target fingerprint.
    #[must_use]
    pub fn scan<S: AsRef<str>>(&self, target: &CanonicalFingerprint, rules: &[S]) -> AvoidScan {
        let mut scan = AvoidScan::default();

        for rule in rules {
            let rule = rule.as_ref().trim();
            if rule.is_empty() {
                continue;
            }

            let mut parsed = false;
            for pattern in &self.patterns {
                if !pattern.regex.is_match(rule) {
                    continue;
                }
                parsed = true;
                if target.value_of(pattern.dimension) == pattern.value {
                    scan.conflicts.push(AvoidConflict {
                        rule: rule.to_string(),
                        dimension: pattern.dimension,
                        value: pattern.value,
                    });
                }
            }

            if !parsed {
                scan.unparsed.push(rule.to_string());
            }
        }

        scan
    }
}
