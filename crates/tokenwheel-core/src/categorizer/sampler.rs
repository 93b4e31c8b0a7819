//! Weighted sampling from the Other bucket.

use super::model::{OtherSelection, TokenCategory};
use super::{is_above_threshold, rank_of, validate_threshold};
use crate::distribution::{Distribution, TokenProbability};
use crate::error::{Result, WheelError};
use rand::Rng;
use rand::distributions::{Distribution as _, WeightedIndex};

/// Draws one token from the below-threshold tail of `distribution`.
///
/// The tail is renormalised to sum to one and sampled proportionally. The
/// entropy source is supplied by the caller so seeded generators reproduce
/// the same sequence of picks.
///
/// # Errors
///
/// - `InvalidArgument` if `threshold` is outside `[0, 1]`
/// - `NoTokensInCategory` if no token falls below the threshold, or the tail
///   carries no probability mass
pub fn sample_from_other<R>(
    distribution: &Distribution,
    threshold: f64,
    rng: &mut R,
) -> Result<OtherSelection>
where
    R: Rng + ?Sized,
{
    validate_threshold(threshold)?;

    let tail: Vec<&TokenProbability> = distribution
        .iter()
        .filter(|token| !is_above_threshold(token.probability, threshold))
        .collect();

    let total: f64 = tail.iter().map(|t| t.probability).sum();
    if tail.is_empty() || total <= 0.0 {
        return Err(WheelError::NoTokensInCategory(
            TokenCategory::Other.to_string(),
        ));
    }

    let weights = tail.iter().map(|t| t.probability / total);
    let index = WeightedIndex::new(weights)
        .map_err(|_| WheelError::NoTokensInCategory(TokenCategory::Other.to_string()))?;
    let picked = tail[index.sample(rng)];

    Ok(OtherSelection {
        token_id: picked.token_id,
        probability: picked.probability,
        rank: rank_of(distribution, picked),
        other_total_probability: total,
        other_count: tail.len(),
    })
}
