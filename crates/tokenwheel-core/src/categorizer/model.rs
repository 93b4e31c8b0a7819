//! Categorisation result types.

use crate::distribution::TokenProbability;
use serde::{Deserialize, Serialize};

/// Which side of the threshold a token fell on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenCategory {
    AboveThreshold,
    Other,
}

impl TokenCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenCategory::AboveThreshold => "above_threshold",
            TokenCategory::Other => "other",
        }
    }
}

impl std::fmt::Display for TokenCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate of the below-threshold tail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtherSummary {
    pub total_probability: f64,
    pub count: usize,
    /// Highest-probability members of the bucket with their original
    /// (not renormalised) probabilities.
    pub sample_tokens: Vec<TokenProbability>,
}

/// A distribution split at a threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizationResult {
    /// Descending by probability, ties by ascending token id.
    pub above_threshold: Vec<TokenProbability>,
    pub other: OtherSummary,
    pub total_above_threshold_probability: f64,
}

/// A token drawn from the Other bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OtherSelection {
    pub token_id: u32,
    /// Probability in the full distribution, not the renormalised one.
    pub probability: f64,
    /// 1-based position in the full distribution's ranking.
    pub rank: usize,
    /// Mass of the Other bucket the token was drawn from.
    pub other_total_probability: f64,
    /// Size of the Other bucket the token was drawn from.
    pub other_count: usize,
}
