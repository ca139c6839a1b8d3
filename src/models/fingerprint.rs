//! Canonical fingerprint types.
//!
//! A fingerprint is a fixed tuple of five closed enumerations. Every value is a
//! tagged variant, so a misspelled value fails at parse time instead of falling
//! through a lookup table.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The five fingerprint dimensions, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// Where the story takes place.
    Setting,
    /// The identity-defining fear. Never reconciled, never wildcarded.
    PrimaryFear,
    /// What opposes the protagonist.
    Antagonist,
    /// How the threat operates.
    Mechanism,
    /// The closing reversal.
    Twist,
}

impl Dimension {
    /// All dimensions in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Setting,
        Self::PrimaryFear,
        Self::Antagonist,
        Self::Mechanism,
        Self::Twist,
    ];

    /// Returns the dimension name as used in configuration and reports.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Setting => "setting",
            Self::PrimaryFear => "primary_fear",
            Self::Antagonist => "antagonist",
            Self::Mechanism => "mechanism",
            Self::Twist => "twist",
        }
    }

    /// Parses a dimension name. Accepts `fear` as a short form of `primary_fear`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match normalize_token(s).as_str() {
            "setting" => Some(Self::Setting),
            "primary_fear" | "fear" => Some(Self::PrimaryFear),
            "antagonist" => Some(Self::Antagonist),
            "mechanism" => Some(Self::Mechanism),
            "twist" => Some(Self::Twist),
            _ => None,
        }
    }

    /// Parses a value string for this dimension into its canonical name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the value is not part of the dimension's enumeration.
    pub fn canonical_value(self, value: &str) -> Result<&'static str> {
        let parsed = match self {
            Self::Setting => Setting::parse(value).map(|v| v.as_str()),
            Self::PrimaryFear => PrimaryFear::parse(value).map(|v| v.as_str()),
            Self::Antagonist => Antagonist::parse(value).map(|v| v.as_str()),
            Self::Mechanism => Mechanism::parse(value).map(|v| v.as_str()),
            Self::Twist => Twist::parse(value).map(|v| v.as_str()),
        };
        parsed.ok_or_else(|| Error::Validation {
            dimension: self.as_str().to_string(),
            value: value.to_string(),
        })
    }

    /// Returns every value name of the dimension's enumeration.
    #[must_use]
    pub fn value_names(self) -> Vec<&'static str> {
        match self {
            Self::Setting => Setting::ALL.iter().map(Setting::as_str).collect(),
            Self::PrimaryFear => PrimaryFear::ALL.iter().map(PrimaryFear::as_str).collect(),
            Self::Antagonist => Antagonist::ALL.iter().map(Antagonist::as_str).collect(),
            Self::Mechanism => Mechanism::ALL.iter().map(Mechanism::as_str).collect(),
            Self::Twist => Twist::ALL.iter().map(Twist::as_str).collect(),
        }
    }

    /// Returns the wildcard value name, if the dimension has one.
    #[must_use]
    pub const fn wildcard(self) -> Option<&'static str> {
        match self {
            Self::PrimaryFear => None,
            Self::Setting | Self::Antagonist | Self::Mechanism | Self::Twist => Some(WILDCARD),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Name of the wildcard value ("abstract / unset") shared by wildcard dimensions.
pub const WILDCARD: &str = "any";

/// Normalizes user-supplied tokens: lowercase, `-` and spaces become `_`.
pub(crate) fn normalize_token(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect()
}

/// Common behaviour of a dimension value enumeration.
pub trait DimensionValue: Copy + Eq + fmt::Debug + 'static {
    /// The dimension this enumeration belongs to.
    const DIMENSION: Dimension;

    /// Returns the canonical `snake_case` name.
    fn name(&self) -> &'static str;

    /// Returns true for the wildcard ("abstract / unset") value.
    fn is_wildcard(&self) -> bool;
}

macro_rules! dimension_values {
    (
        $(#[$meta:meta])*
        $name:ident: $dimension:ident, wildcard = $wildcard:expr;
        $( $(#[$vmeta:meta])* $variant:ident => $text:literal $(| $alias:literal)* ),+ $(,)?
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $name {
            /// All values in declaration order.
            pub const ALL: &'static [Self] = &[ $( Self::$variant, )+ ];

            /// Returns the canonical `snake_case` name.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $text, )+
                }
            }

            /// Parses a value, case-insensitively, with `-` and spaces read as `_`.
            #[must_use]
            pub fn parse(s: &str) -> Option<Self> {
                match normalize_token(s).as_str() {
                    $( $text $(| $alias)* => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl DimensionValue for $name {
            const DIMENSION: Dimension = Dimension::$dimension;

            fn name(&self) -> &'static str {
                self.as_str()
            }

            fn is_wildcard(&self) -> bool {
                let wildcard: Option<Self> = $wildcard;
                wildcard == Some(*self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Self::parse(s).ok_or_else(|| Error::Validation {
                    dimension: Dimension::$dimension.as_str().to_string(),
                    value: s.to_string(),
                })
            }
        }
    };
}

dimension_values! {
    /// Where the story takes place.
    Setting: Setting, wildcard = Some(Self::Any);
    /// Abstract or unset location; reconciles with any concrete setting.
    Any => "any",
    /// Screens, networks, virtual spaces.
    Digital => "digital",
    /// The home.
    Domestic => "domestic",
    /// Cities, apartments, transit.
    Urban => "urban",
    /// Farms, small towns.
    Rural => "rural",
    /// Forests, mountains, open country.
    Wilderness => "wilderness",
    /// Hospitals, schools, offices, prisons.
    Institutional => "institutional",
    /// Sea, lakes, ships.
    Aquatic => "aquatic",
    /// Transitional spaces: stairwells, parking garages, empty malls.
    Liminal => "liminal",
}

dimension_values! {
    /// The identity-defining fear of a story.
    PrimaryFear: PrimaryFear, wildcard = None;
    /// Losing or being replaced in one's own identity.
    IdentityErasure => "identity_erasure",
    /// Being cut off from everyone.
    Isolation => "isolation",
    /// Losing agency over body or circumstance.
    LossOfControl => "loss_of_control",
    /// Infection, rot, impurity.
    Contamination => "contamination",
    /// Being left behind.
    Abandonment => "abandonment",
    /// Being watched.
    Surveillance => "surveillance",
    /// Death and its approach.
    Mortality => "mortality",
    /// Losing one's grip on reality.
    Madness => "madness",
}

dimension_values! {
    /// What opposes the protagonist.
    Antagonist: Antagonist, wildcard = Some(Self::Any);
    /// Unspecified antagonist.
    Any => "any",
    /// Machines, software, networks.
    Technology => "technology" | "tech",
    /// Ghosts, demons, entities.
    Supernatural => "supernatural",
    /// Ordinary people.
    Human => "human",
    /// Animals or monsters of flesh.
    Creature => "creature",
    /// Weather, terrain, nature itself.
    Environment => "environment",
    /// The protagonist.
    SelfAntagonist => "self",
    /// Organisations, governments, corporations.
    Institution => "institution",
}

dimension_values! {
    /// How the threat operates.
    Mechanism: Mechanism, wildcard = Some(Self::Any);
    /// Unspecified mechanism.
    Any => "any",
    /// Something takes a familiar shape.
    Impersonation => "impersonation",
    /// Something takes control of a body.
    Possession => "possession",
    /// Something spreads.
    Infection => "infection",
    /// Someone cannot leave.
    Entrapment => "entrapment",
    /// Events repeat.
    TimeLoop => "time_loop",
    /// Things or people are removed from existence.
    Erasure => "erasure",
    /// Someone is steered without noticing.
    Manipulation => "manipulation",
    /// Someone is watched.
    Observation => "observation",
}

dimension_values! {
    /// The closing reversal.
    Twist: Twist, wildcard = Some(Self::Any);
    /// No particular twist.
    Any => "any" | "none",
    /// The narrator is the monster.
    SelfIsMonster => "self_is_monster",
    /// The narrator cannot be trusted.
    UnreliableNarrator => "unreliable_narrator",
    /// The protagonist was dead all along.
    AlreadyDead => "already_dead",
    /// The escape never happened.
    NeverEscaped => "never_escaped",
    /// The ending restarts the story.
    Cyclical => "cyclical",
    /// The protagonist was complicit.
    Complicity => "complicity",
    /// Someone was watching all along.
    WatcherRevealed => "watcher_revealed",
}

/// Canonical five-dimension classification of a narrative unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalFingerprint {
    /// Setting dimension.
    pub setting: Setting,
    /// Identity-defining fear dimension.
    pub primary_fear: PrimaryFear,
    /// Antagonist dimension.
    pub antagonist: Antagonist,
    /// Mechanism dimension.
    pub mechanism: Mechanism,
    /// Twist dimension.
    pub twist: Twist,
}

impl CanonicalFingerprint {
    /// Creates a fingerprint from already-typed values.
    #[must_use]
    pub const fn new(
        setting: Setting,
        primary_fear: PrimaryFear,
        antagonist: Antagonist,
        mechanism: Mechanism,
        twist: Twist,
    ) -> Self {
        Self {
            setting,
            primary_fear,
            antagonist,
            mechanism,
            twist,
        }
    }

    /// Parses a fingerprint from five value strings in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the first value outside its domain.
    pub fn from_strs(
        setting: &str,
        primary_fear: &str,
        antagonist: &str,
        mechanism: &str,
        twist: &str,
    ) -> Result<Self> {
        Ok(Self {
            setting: setting.parse()?,
            primary_fear: primary_fear.parse()?,
            antagonist: antagonist.parse()?,
            mechanism: mechanism.parse()?,
            twist: twist.parse()?,
        })
    }

    /// Returns the canonical value name for a dimension.
    #[must_use]
    pub const fn value_of(&self, dimension: Dimension) -> &'static str {
        match dimension {
            Dimension::Setting => self.setting.as_str(),
            Dimension::PrimaryFear => self.primary_fear.as_str(),
            Dimension::Antagonist => self.antagonist.as_str(),
            Dimension::Mechanism => self.mechanism.as_str(),
            Dimension::Twist => self.twist.as_str(),
        }
    }

    /// Returns `(dimension, value)` pairs in declaration order.
    #[must_use]
    pub fn values(&self) -> [(Dimension, &'static str); 5] {
        Dimension::ALL.map(|d| (d, self.value_of(d)))
    }
}

impl fmt::Display for CanonicalFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .values()
            .iter()
            .map(|(d, v)| format!("{d}={v}"))
            .collect();
        write!(f, "{}", parts.join(","))
    }
}

/// Parses the compact `setting=digital,fear=identity_erasure,...` form.
///
/// All five dimensions must be present exactly once.
impl FromStr for CanonicalFingerprint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut slots: [Option<String>; 5] = Default::default();

        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                Error::InvalidInput(format!("expected dimension=value, got '{pair}'"))
            })?;
            let dimension = Dimension::parse(key)
                .ok_or_else(|| Error::InvalidInput(format!("unknown dimension '{key}'")))?;
            let slot = &mut slots[dimension as usize];
            if slot.is_some() {
                return Err(Error::InvalidInput(format!(
                    "dimension '{dimension}' given twice"
                )));
            }
            *slot = Some(value.trim().to_string());
        }

        let mut values = Vec::with_capacity(5);
        for (dimension, slot) in Dimension::ALL.iter().zip(slots) {
            values.push(slot.ok_or_else(|| {
                Error::InvalidInput(format!("missing dimension '{dimension}'"))
            })?);
        }

        Self::from_strs(&values[0], &values[1], &values[2], &values[3], &values[4])
    }
}
