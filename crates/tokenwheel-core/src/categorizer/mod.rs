//! Threshold partitioning of next-token distributions.
//!
//! Splits a [`Distribution`] into the tokens shown individually (probability at
//! or above the threshold) and an aggregated "Other" bucket holding the tail.
//!
//! The same predicate, [`is_above_threshold`], drives listing, sampling and the
//! categorisation of appended tokens, so a token at exactly the threshold is
//! `above_threshold` everywhere and never Other-eligible.

mod model;
mod sampler;

pub use model::{CategorizationResult, OtherSelection, OtherSummary, TokenCategory};
pub use sampler::sample_from_other;

use crate::distribution::{Distribution, TokenProbability};
use crate::error::{Result, WheelError};
use std::cmp::Ordering;

/// `true` if a token with `probability` is listed individually.
pub fn is_above_threshold(probability: f64, threshold: f64) -> bool {
    probability >= threshold
}

/// Category for a token with `probability` under `threshold`.
pub fn classify(probability: f64, threshold: f64) -> TokenCategory {
    if is_above_threshold(probability, threshold) {
        TokenCategory::AboveThreshold
    } else {
        TokenCategory::Other
    }
}

/// Rejects thresholds outside `[0, 1]` (and NaN).
pub fn validate_threshold(threshold: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(WheelError::invalid_argument(format!(
            "threshold must be between 0.0 and 1.0, got {}",
            threshold
        )));
    }
    Ok(())
}

/// Ranking order: probability descending, then token id ascending.
pub(crate) fn rank_order(a: &TokenProbability, b: &TokenProbability) -> Ordering {
    b.probability
        .total_cmp(&a.probability)
        .then_with(|| a.token_id.cmp(&b.token_id))
}

/// 1-based rank of `token` within the whole distribution.
pub(crate) fn rank_of(distribution: &Distribution, token: &TokenProbability) -> usize {
    distribution
        .iter()
        .filter(|other| rank_order(other, token) == Ordering::Less)
        .count()
        + 1
}

/// Partitions `distribution` at `threshold`.
///
/// `top_k` bounds how many Other members are returned as samples; it does not
/// affect `count` or `total_probability`.
///
/// # Errors
///
/// `InvalidArgument` if `threshold` is outside `[0, 1]`.
pub fn categorize(
    distribution: &Distribution,
    threshold: f64,
    top_k: usize,
) -> Result<CategorizationResult> {
    validate_threshold(threshold)?;

    let (mut above, mut other): (Vec<TokenProbability>, Vec<TokenProbability>) = distribution
        .iter()
        .copied()
        .partition(|token| is_above_threshold(token.probability, threshold));

    above.sort_by(rank_order);
    let total_above_threshold_probability = above.iter().map(|t| t.probability).sum();

    let other_total = other.iter().map(|t| t.probability).sum();
    let other_count = other.len();

    if top_k < other.len() {
        if top_k > 0 {
            other.select_nth_unstable_by(top_k - 1, rank_order);
        }
        other.truncate(top_k);
    }
    other.sort_by(rank_order);

    Ok(CategorizationResult {
        above_threshold: above,
        other: OtherSummary {
            total_probability: other_total,
            count: other_count,
            sample_tokens: other,
        },
        total_above_threshold_probability,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> Distribution {
        // A..E = ids 0..4
        Distribution::from_probabilities(vec![0.5, 0.2, 0.15, 0.1, 0.05]).unwrap()
    }

    fn ids(tokens: &[TokenProbability]) -> Vec<u32> {
        tokens.iter().map(|t| t.token_id).collect()
    }

    #[test]
    fn test_threshold_splits_ranked_list_and_other() {
        let result = categorize(&scenario(), 0.15, 2).unwrap();

        assert_eq!(ids(&result.above_threshold), vec![0, 1, 2]);
        assert_eq!(result.other.count, 2);
        assert!((result.other.total_probability - 0.15).abs() < 1e-9);
        assert_eq!(ids(&result.other.sample_tokens), vec![3, 4]);
        assert!((result.other.sample_tokens[0].probability - 0.1).abs() < 1e-12);
        assert!((result.total_above_threshold_probability - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_zero_threshold_empties_other() {
        let result = categorize(&scenario(), 0.0, 10).unwrap();
        assert_eq!(result.above_threshold.len(), 5);
        assert_eq!(result.other.count, 0);
        assert_eq!(result.other.total_probability, 0.0);
        assert!(result.other.sample_tokens.is_empty());
    }

    #[test]
    fn test_ties_broken_by_ascending_id() {
        let dist = Distribution::from_probabilities(vec![0.1, 0.3, 0.3, 0.1, 0.2]).unwrap();
        let result = categorize(&dist, 0.2, 5).unwrap();
        assert_eq!(ids(&result.above_threshold), vec![1, 2, 4]);
        assert_eq!(ids(&result.other.sample_tokens), vec![0, 3]);
    }

    #[test]
    fn test_top_k_limits_samples_only() {
        let dist =
            Distribution::from_probabilities(vec![0.6, 0.1, 0.08, 0.07, 0.06, 0.05, 0.04]).unwrap();
        let result = categorize(&dist, 0.5, 3).unwrap();
        assert_eq!(result.other.count, 6);
        assert_eq!(ids(&result.other.sample_tokens), vec![1, 2, 3]);

        let none = categorize(&dist, 0.5, 0).unwrap();
        assert_eq!(none.other.count, 6);
        assert!(none.other.sample_tokens.is_empty());
    }

    #[test]
    fn test_invalid_threshold() {
        for bad in [-0.01, 1.01, f64::NAN] {
            let err = categorize(&scenario(), bad, 3).unwrap_err();
            assert!(err.is_invalid_argument(), "threshold {} should be rejected", bad);
        }
    }

    #[test]
    fn test_boundary_token_is_above_threshold() {
        assert_eq!(classify(0.15, 0.15), TokenCategory::AboveThreshold);
        assert_eq!(classify(0.1499, 0.15), TokenCategory::Other);
        let result = categorize(&scenario(), 0.2, 0).unwrap();
        assert_eq!(ids(&result.above_threshold), vec![0, 1]);
    }

    #[test]
    fn test_mass_is_conserved_across_thresholds() {
        let dist = Distribution::from_logits(&[2.0, 1.5, 0.3, -1.0, 0.0, 0.9, -2.5], 1.0).unwrap();
        for step in 0..=20 {
            let threshold = step as f64 / 20.0;
            let result = categorize(&dist, threshold, 3).unwrap();
            let total = result.total_above_threshold_probability + result.other.total_probability;
            assert!((total - 1.0).abs() < 1e-9, "threshold {}: total {}", threshold, total);
            assert_eq!(result.above_threshold.len() + result.other.count, dist.len());
        }
    }

    #[test]
    fn test_raising_threshold_is_monotone() {
        let dist = Distribution::from_logits(&[2.0, 1.5, 0.3, -1.0, 0.0, 0.9, -2.5], 0.8).unwrap();
        let mut last_above = usize::MAX;
        let mut last_other = 0;
        for step in 0..=50 {
            let result = categorize(&dist, step as f64 / 50.0, 0).unwrap();
            assert!(result.above_threshold.len() <= last_above);
            assert!(result.other.count >= last_other);
            last_above = result.above_threshold.len();
            last_other = result.other.count;
        }
    }

    #[test]
    fn test_rank_of_uses_full_distribution() {
        let dist = scenario();
        assert_eq!(rank_of(&dist, dist.get(0).unwrap()), 1);
        assert_eq!(rank_of(&dist, dist.get(4).unwrap()), 5);

        let tied = Distribution::from_probabilities(vec![0.4, 0.3, 0.3]).unwrap();
        assert_eq!(rank_of(&tied, tied.get(1).unwrap()), 2);
        assert_eq!(rank_of(&tied, tied.get(2).unwrap()), 3);
    }
}
