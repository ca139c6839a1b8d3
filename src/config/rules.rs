//! Static rule tables: dimension domains, the antagonist denylist, and
//! avoid-rule keywords.
//!
//! Loaded once at startup and treated as immutable afterwards.

use crate::models::{Antagonist, CanonicalFingerprint, Dimension};
use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Antagonist pairs declared structurally incompatible.
///
/// Only the documented pairs are built in. Additional pairs come from configuration.
pub const DEFAULT_ANTAGONIST_DENYLIST: &[(Antagonist, Antagonist)] = &[
    (Antagonist::Supernatural, Antagonist::Technology),
    (Antagonist::Supernatural, Antagonist::Institution),
];

/// Built-in avoid-rule keywords per `(dimension, value)`.
const DEFAULT_KEYWORDS: &[(Dimension, &str, &[&str])] = &[
    (Dimension::Setting, "digital", &["digital", "online", "internet", "virtual", "computer", "cyberspace"]),
    (Dimension::Setting, "domestic", &["home", "house", "domestic", "household"]),
    (Dimension::Setting, "urban", &["city", "urban", "apartment", "subway", "downtown"]),
    (Dimension::Setting, "rural", &["rural", "farm", "village", "small town", "countryside"]),
    (Dimension::Setting, "wilderness", &["forest", "woods", "wilderness", "mountain", "desert"]),
    (Dimension::Setting, "institutional", &["hospital", "asylum", "school", "prison", "office"]),
    (Dimension::Setting, "aquatic", &["sea", "ocean", "ship", "lake", "underwater"]),
    (Dimension::Setting, "liminal", &["liminal", "stairwell", "hallway", "parking garage", "backrooms"]),
    (Dimension::PrimaryFear, "identity_erasure", &["identity", "identity erasure", "replaced", "replacement"]),
    (Dimension::PrimaryFear, "isolation", &["isolation", "isolated", "alone", "loneliness"]),
    (Dimension::PrimaryFear, "loss_of_control", &["loss of control", "helpless", "paralysis"]),
    (Dimension::PrimaryFear, "contamination", &["contamination", "contaminated", "rot", "disease"]),
    (Dimension::PrimaryFear, "abandonment", &["abandonment", "abandoned", "left behind"]),
    (Dimension::PrimaryFear, "surveillance", &["surveillance", "spying", "monitored"]),
    (Dimension::PrimaryFear, "mortality", &["death", "dying", "mortality", "grave"]),
    (Dimension::PrimaryFear, "madness", &["madness", "insanity", "sanity", "hallucination"]),
    (Dimension::Antagonist, "technology", &["technology", "ai", "artificial intelligence", "machine", "algorithm", "robot"]),
    (Dimension::Antagonist, "supernatural", &["supernatural", "ghost", "demon", "spirit", "haunting"]),
    (Dimension::Antagonist, "human", &["killer", "stalker", "stranger", "cult"]),
    (Dimension::Antagonist, "creature", &["creature", "beast", "animal"]),
    (Dimension::Antagonist, "environment", &["storm", "weather", "nature", "flood"]),
    (Dimension::Antagonist, "self", &["inner demon", "own mind", "themselves"]),
    (Dimension::Antagonist, "institution", &["corporation", "government", "institution", "agency"]),
    (Dimension::Mechanism, "impersonation", &["impersonation", "impostor", "doppelganger", "mimic"]),
    (Dimension::Mechanism, "possession", &["possession", "possessed"]),
    (Dimension::Mechanism, "infection", &["infection", "virus", "parasite", "contagion"]),
    (Dimension::Mechanism, "entrapment", &["trapped", "entrapment", "locked in", "no exit"]),
    (Dimension::Mechanism, "time_loop", &["time loop", "repeating day"]),
    (Dimension::Mechanism, "erasure", &["erased", "erasure", "vanish", "disappear"]),
    (Dimension::Mechanism, "manipulation", &["manipulation", "gaslighting", "manipulated"]),
    (Dimension::Mechanism, "observation", &["observation", "watching", "cameras"]),
    (Dimension::Twist, "self_is_monster", &["narrator is the monster", "was the monster", "self is monster"]),
    (Dimension::Twist, "unreliable_narrator", &["unreliable narrator", "unreliable"]),
    (Dimension::Twist, "already_dead", &["already dead", "dead all along"]),
    (Dimension::Twist, "never_escaped", &["never escaped", "still trapped"]),
    (Dimension::Twist, "cyclical", &["cyclical", "starts again", "cycle"]),
    (Dimension::Twist, "complicity", &["complicit", "complicity"]),
    (Dimension::Twist, "watcher_revealed", &["watcher revealed", "watched all along"]),
];

/// Rule tables shared by the compatibility scorer.
#[derive(Debug, Clone)]
pub struct RuleTables {
    /// Enabled values per dimension (canonical names).
    domains: BTreeMap<Dimension, BTreeSet<&'static str>>,
    /// Mutually exclusive antagonist pairs, normalized so `.0 <= .1`.
    antagonist_denylist: BTreeSet<(Antagonist, Antagonist)>,
    /// Keywords per `(dimension, value)`.
    avoid_keywords: BTreeMap<(Dimension, &'static str), Vec<String>>,
}

impl Default for RuleTables {
    fn default() -> Self {
        let domains = Dimension::ALL
            .iter()
            .map(|d| (*d, d.value_names().into_iter().collect()))
            .collect();

        let avoid_keywords = DEFAULT_KEYWORDS
            .iter()
            .map(|(dimension, value, words)| {
                (
                    (*dimension, *value),
                    words.iter().map(|w| (*w).to_string()).collect(),
                )
            })
            .collect();

        let mut tables = Self {
            domains,
            antagonist_denylist: BTreeSet::new(),
            avoid_keywords,
        };
        for (a, b) in DEFAULT_ANTAGONIST_DENYLIST {
            tables.deny_antagonists(*a, *b);
        }
        tables
    }
}

impl RuleTables {
    /// Restricts a dimension to a subset of its enumeration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if a value is not part of the dimension's enumeration.
    pub fn restrict_domain<S: AsRef<str>>(
        &mut self,
        dimension: Dimension,
        values: &[S],
    ) -> Result<()> {
        let mut enabled = BTreeSet::new();
        for value in values {
            enabled.insert(dimension.canonical_value(value.as_ref())?);
        }
        self.domains.insert(dimension, enabled);
        Ok(())
    }

    /// Adds a mutually exclusive antagonist pair (symmetric).
    pub fn deny_antagonists(&mut self, a: Antagonist, b: Antagonist) {
        let pair = if a <= b { (a, b) } else { (b, a) };
        self.antagonist_denylist.insert(pair);
    }

    /// Adds avoid-rule keywords for a dimension value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the value is not part of the
    /// dimension's enumeration or is the wildcard, which never conflicts.
    pub fn add_keywords<S: AsRef<str>>(
        &mut self,
        dimension: Dimension,
        value: &str,
        keywords: &[S],
    ) -> Result<()> {
        let canonical = dimension.canonical_value(value)?;
        if dimension.wildcard() == Some(canonical) {
            return Err(Error::Validation {
                dimension: dimension.as_str().to_string(),
                value: canonical.to_string(),
            });
        }
        let entry = self.avoid_keywords.entry((dimension, canonical)).or_default();
        for keyword in keywords {
            let keyword = keyword.as_ref().trim().to_lowercase();
            if !keyword.is_empty() && !entry.contains(&keyword) {
                entry.push(keyword);
            }
        }
        Ok(())
    }

    /// Returns true if the pair is on the denylist, in either order.
    #[must_use]
    pub fn is_exclusive_pair(&self, a: Antagonist, b: Antagonist) -> bool {
        let pair = if a <= b { (a, b) } else { (b, a) };
        self.antagonist_denylist.contains(&pair)
    }

    /// Returns the denylist pairs.
    pub fn antagonist_denylist(&self) -> impl Iterator<Item = &(Antagonist, Antagonist)> {
        self.antagonist_denylist.iter()
    }

    /// Returns the keyword table.
    #[must_use]
    pub const fn avoid_keywords(&self) -> &BTreeMap<(Dimension, &'static str), Vec<String>> {
        &self.avoid_keywords
    }

    /// Returns true if the value is in the dimension's enabled domain.
    #[must_use]
    pub fn is_enabled(&self, dimension: Dimension, value: &str) -> bool {
        self.domains
            .get(&dimension)
            .is_some_and(|values| values.contains(value))
    }

    /// Checks every dimension value of a fingerprint against the enabled domains.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the first value outside its domain.
    pub fn validate_fingerprint(&self, fingerprint: &CanonicalFingerprint) -> Result<()> {
        for (dimension, value) in fingerprint.values() {
            if !self.is_enabled(dimension, value) {
                return Err(Error::Validation {
                    dimension: dimension.as_str().to_string(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Validates the tables themselves.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a domain is empty, a wildcard
    /// dimension lost its wildcard, or the denylist names a wildcard.
    pub fn validate(&self) -> Result<()> {
        for dimension in Dimension::ALL {
            let Some(values) = self.domains.get(&dimension) else {
                return Err(Error::InvalidConfig(format!(
                    "missing domain for dimension '{dimension}'"
                )));
            };
            if values.is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "domain for dimension '{dimension}' is empty"
                )));
            }
            if let Some(wildcard) = dimension.wildcard()
                && !values.contains(wildcard)
            {
                return Err(Error::InvalidConfig(format!(
                    "domain for dimension '{dimension}' must keep the wildcard '{wildcard}'"
                )));
            }
        }

        if let Some((a, b)) = self
            .antagonist_denylist
            .iter()
            .find(|(a, b)| *a == Antagonist::Any || *b == Antagonist::Any)
        {
            return Err(Error::InvalidConfig(format!(
                "antagonist denylist entry ({a}, {b}) must name concrete values"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Mechanism, PrimaryFear, Setting, Twist};

    #[test]
    fn test_default_tables_validate() {
        let tables = RuleTables::default();
        assert!(tables.validate().is_ok());
        assert!(tables.is_enabled(Dimension::Setting, "digital"));
        assert!(tables.is_enabled(Dimension::PrimaryFear, "madness"));
    }

    #[test]
    fn test_denylist_is_symmetric() {
        let tables = RuleTables::default();
        assert!(tables.is_exclusive_pair(Antagonist::Technology, Antagonist::Supernatural));
        assert!(tables.is_exclusive_pair(Antagonist::Supernatural, Antagonist::Technology));
        assert!(!tables.is_exclusive_pair(Antagonist::Human, Antagonist::Technology));
    }

    #[test]
    fn test_denylist_is_extensible() {
        let mut tables = RuleTables::default();
        assert!(!tables.is_exclusive_pair(Antagonist::Creature, Antagonist::Technology));
        tables.deny_antagonists(Antagonist::Technology, Antagonist::Creature);
        assert!(tables.is_exclusive_pair(Antagonist::Creature, Antagonist::Technology));
    }

    #[test]
    fn test_restricted_domain_rejects_fingerprint() {
        let mut tables = RuleTables::default();
        tables
            .restrict_domain(Dimension::Setting, &["any", "urban"])
            .unwrap();

        let fp = CanonicalFingerprint::new(
            Setting::Digital,
            PrimaryFear::Isolation,
            Antagonist::Any,
            Mechanism::Any,
            Twist::Any,
        );
        let err = tables.validate_fingerprint(&fp).unwrap_err();
        assert!(matches!(err, Error::Validation { ref value, .. } if value == "digital"));
    }

    #[test]
    fn test_restricting_away_wildcard_is_invalid() {
        let mut tables = RuleTables::default();
        tables
            .restrict_domain(Dimension::Twist, &["cyclical"])
            .unwrap();
        assert!(matches!(tables.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_wildcard_in_denylist_is_invalid() {
        let mut tables = RuleTables::default();
        tables.deny_antagonists(Antagonist::Any, Antagonist::Human);
        assert!(tables.validate().is_err());
    }

    #[test]
    fn test_add_keywords_deduplicates() {
        let mut tables = RuleTables::default();
        tables
            .add_keywords(Dimension::Setting, "digital", &["Cyberspace", "metaverse"])
            .unwrap();
        let words = &tables.avoid_keywords()[&(Dimension::Setting, "digital")];
        assert_eq!(words.iter().filter(|w| *w == "cyberspace").count(), 1);
        assert!(words.contains(&"metaverse".to_string()));
        assert!(tables.add_keywords(Dimension::Setting, "moon", &["x"]).is_err());
    }

    #[test]
    fn test_add_keywords_rejects_wildcard() {
        let mut tables = RuleTables::default();
        let result = tables.add_keywords(Dimension::Twist, "ANY", &["anything"]);
        assert!(matches!(
            result,
            Err(Error::Validation { ref dimension, ref value }) if dimension == "twist" && value == "any"
        ));
        assert!(!tables.avoid_keywords().contains_key(&(Dimension::Twist, "any")));
    }
}
