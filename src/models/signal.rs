//! Duplicate signal types.

use super::RecordId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discrete, advisory duplicate-risk level.
///
/// `Unknown` means the embedding provider could not answer. It is not `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateLevel {
    /// Similarity below the low bound.
    Low,
    /// Similarity in `[low_bound, high_bound)`.
    Medium,
    /// Similarity at or above the high bound. Advisory only.
    High,
    /// No embedding was available.
    Unknown,
}

impl DuplicateLevel {
    /// All levels.
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Unknown];

    /// Returns the level as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Unknown => "unknown",
        }
    }

    /// Parses a level name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for DuplicateLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of classifying a candidate against its nearest neighbour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateSignal {
    /// Similarity to the nearest neighbour, clamped to `[0.0, 1.0]`.
    pub score: f32,
    /// Discrete level.
    pub level: DuplicateLevel,
    /// Nearest neighbour, if the index had one.
    pub nearest_id: Option<RecordId>,
}

impl DuplicateSignal {
    /// Signal for an unavailable provider.
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            score: 0.0,
            level: DuplicateLevel::Unknown,
            nearest_id: None,
        }
    }

    /// Returns true if this signal should deprioritize future reuse.
    #[must_use]
    pub fn is_high(&self) -> bool {
        self.level == DuplicateLevel::High
    }
}
