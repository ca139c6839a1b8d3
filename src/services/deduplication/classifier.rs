//! Threshold classifier for duplicate signals.

use crate::config::DedupThresholds;
use crate::models::{DuplicateLevel, DuplicateSignal, RecordId};
use crate::Result;

/// Maps a similarity score onto a [`DuplicateLevel`].
///
/// `[0, low)` is `Low`, `[low, high)` is `Medium`, `[high, 1]` is `High`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DuplicateClassifier {
    thresholds: DedupThresholds,
}

impl DuplicateClassifier {
    /// Creates a classifier over validated thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidConfig`] if the thresholds are out of order.
    pub fn new(thresholds: DedupThresholds) -> Result<Self> {
        thresholds.validate()?;
        Ok(Self { thresholds })
    }

    /// Returns the thresholds.
    #[must_use]
    pub const fn thresholds(&self) -> DedupThresholds {
        self.thresholds
    }

    /// Classifies a similarity. NaN is treated as no similarity.
    #[must_use]
    pub fn classify(&self, similarity: f32) -> DuplicateLevel {
        if similarity.is_nan() || similarity < self.thresholds.low_bound {
            DuplicateLevel::Low
        } else if similarity < self.thresholds.high_bound {
            DuplicateLevel::Medium
        } else {
            DuplicateLevel::High
        }
    }

    /// Builds a signal from the nearest neighbour, or `Low` with score 0 if
    /// the index had none.
    #[must_use]
    pub fn signal(&self, nearest: Option<(RecordId, f32)>) -> DuplicateSignal {
        match nearest {
            Some((id, similarity)) => {
                let score = if similarity.is_nan() {
                    0.0
                } else {
                    similarity.clamp(0.0, 1.0)
                };
                DuplicateSignal {
                    score,
                    level: self.classify(score),
                    nearest_id: Some(id),
                }
            },
            None => DuplicateSignal {
                score: 0.0,
                level: DuplicateLevel::Low,
                nearest_id: None,
            },
        }
    }
}
