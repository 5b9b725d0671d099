//! Sentiment score type.
//!
//! A sentiment score is a signed float in `[-100, 100]`. Construction clamps out-of-range
//! values and maps non-finite input to the neutral score, so every `SentimentScore` in the
//! system is finite and bounded.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{MAX_SENTIMENT, MIN_SENTIMENT};

/// Aggregate sentiment extracted from a text corpus.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
#[serde(transparent)]
pub struct SentimentScore(f64);

impl SentimentScore {
    /// The neutral score (`0.0`).
    pub const NEUTRAL: SentimentScore = SentimentScore(0.0);

    /// Create a score, clamping into `[-100, 100]`. NaN becomes neutral.
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::NEUTRAL;
        }
        SentimentScore(value.clamp(MIN_SENTIMENT, MAX_SENTIMENT))
    }

    /// Raw value.
    pub const fn value(&self) -> f64 {
        self.0
    }

    /// True for exactly zero.
    pub fn is_neutral(&self) -> bool {
        self.0 == 0.0
    }

    /// True for strictly positive scores.
    pub fn is_positive(&self) -> bool {
        self.0 > 0.0
    }

    /// Absolute magnitude in sentiment points.
    pub fn magnitude(&self) -> f64 {
        self.0.abs()
    }
}

impl From<f64> for SentimentScore {
    fn from(value: f64) -> Self {
        SentimentScore::new(value)
    }
}

impl fmt::Display for SentimentScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Deserialization goes through `new` so stored scores are re-clamped.
impl<'de> Deserialize<'de> for SentimentScore {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Ok(SentimentScore::new(value))
    }
}
