//! Candidate categories.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared category of a knowledge fragment or generated artifact.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Cognitive biases, perception, memory.
    Psychology,
    /// Software, hardware, networks.
    Technology,
    /// Myths, legends, rituals.
    Folklore,
    /// Physics, biology, chemistry.
    Science,
    /// Historical events and places.
    History,
    /// Illness, anatomy, treatment.
    Medicine,
    /// Groups, institutions, social dynamics.
    Sociology,
    /// A generated story.
    #[default]
    Story,
}

impl Category {
    /// All categories.
    pub const ALL: [Self; 8] = [
        Self::Psychology,
        Self::Technology,
        Self::Folklore,
        Self::Science,
        Self::History,
        Self::Medicine,
        Self::Sociology,
        Self::Story,
    ];

    /// Returns the category as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Psychology => "psychology",
            Self::Technology => "technology",
            Self::Folklore => "folklore",
            Self::Science => "science",
            Self::History => "history",
            Self::Medicine => "medicine",
            Self::Sociology => "sociology",
            Self::Story => "story",
        }
    }

    /// Parses a category name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "psychology" => Some(Self::Psychology),
            "technology" | "tech" => Some(Self::Technology),
            "folklore" => Some(Self::Folklore),
            "science" => Some(Self::Science),
            "history" => Some(Self::History),
            "medicine" | "medical" => Some(Self::Medicine),
            "sociology" => Some(Self::Sociology),
            "story" => Some(Self::Story),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
