//! Next-token probability distributions.
//!
//! A [`Distribution`] is a per-request snapshot of the oracle's output over the
//! full vocabulary. Temperature is folded in when the snapshot is built, so
//! everything downstream (categorisation, sampling) sees the final shape.

use crate::error::{Result, WheelError};
use serde::{Deserialize, Serialize};

/// One vocabulary entry of a distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenProbability {
    pub token_id: u32,
    pub probability: f64,
    /// Natural log of `probability`; `-inf` when the probability is zero.
    pub log_probability: f64,
}

/// Full-vocabulary next-token distribution, indexed by token id.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    entries: Vec<TokenProbability>,
}

impl Distribution {
    /// Builds a distribution from probabilities that already sum to (about) one.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the vector is empty or holds a value outside
    /// `[0, 1]` (NaN included).
    pub fn from_probabilities(probabilities: Vec<f64>) -> Result<Self> {
        if probabilities.is_empty() {
            return Err(WheelError::invalid_argument("distribution is empty"));
        }

        let mut entries = Vec::with_capacity(probabilities.len());
        for (index, probability) in probabilities.into_iter().enumerate() {
            if !(0.0..=1.0).contains(&probability) {
                return Err(WheelError::invalid_argument(format!(
                    "probability for token {} is not a valid probability: {}",
                    index, probability
                )));
            }
            entries.push(TokenProbability {
                token_id: index as u32,
                probability,
                log_probability: probability.ln(),
            });
        }

        Ok(Self { entries })
    }

    /// Builds a distribution from raw logits, scaling by `1 / temperature`
    /// before a numerically stable log-softmax.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `temperature` is not a positive finite number,
    /// the logits are empty, or no logit is finite.
    pub fn from_logits(logits: &[f32], temperature: f64) -> Result<Self> {
        validate_temperature(temperature)?;
        if logits.is_empty() {
            return Err(WheelError::invalid_argument("logits are empty"));
        }

        let scaled: Vec<f64> = logits
            .iter()
            .map(|&logit| logit as f64 / temperature)
            .collect();

        let max = scaled
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(f64::NEG_INFINITY, f64::max);
        if !max.is_finite() {
            return Err(WheelError::invalid_argument(
                "logits contain no finite value",
            ));
        }

        // log_softmax(x)_i = (x_i - max) - ln(sum_j exp(x_j - max))
        let log_sum = scaled
            .iter()
            .map(|&v| if v.is_nan() { 0.0 } else { (v - max).exp() })
            .sum::<f64>()
            .ln();

        let entries = scaled
            .iter()
            .enumerate()
            .map(|(index, &v)| {
                let log_probability = if v.is_nan() {
                    f64::NEG_INFINITY
                } else {
                    v - max - log_sum
                };
                TokenProbability {
                    token_id: index as u32,
                    probability: log_probability.exp(),
                    log_probability,
                }
            })
            .collect();

        Ok(Self { entries })
    }

    /// Number of vocabulary entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up one token.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `token_id` is outside the vocabulary.
    pub fn get(&self, token_id: u32) -> Result<&TokenProbability> {
        self.entries.get(token_id as usize).ok_or_else(|| {
            WheelError::invalid_argument(format!(
                "token id {} is outside the vocabulary (size {})",
                token_id,
                self.entries.len()
            ))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &TokenProbability> {
        self.entries.iter()
    }

    /// Sum of all probabilities.
    pub fn total_probability(&self) -> f64 {
        self.entries.iter().map(|e| e.probability).sum()
    }
}

/// Rejects temperatures the scaling step cannot use.
pub fn validate_temperature(temperature: f64) -> Result<()> {
    if !temperature.is_finite() || temperature <= 0.0 {
        return Err(WheelError::invalid_argument(format!(
            "temperature must be greater than 0, got {}",
            temperature
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_probabilities_keeps_order_and_ids() {
        let dist = Distribution::from_probabilities(vec![0.25, 0.75]).unwrap();
        assert_eq!(dist.len(), 2);
        assert_eq!(dist.get(1).unwrap().token_id, 1);
        assert!((dist.get(1).unwrap().log_probability - 0.75f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_zero_probability_has_negative_infinite_log() {
        let dist = Distribution::from_probabilities(vec![1.0, 0.0]).unwrap();
        assert_eq!(dist.get(1).unwrap().log_probability, f64::NEG_INFINITY);
    }

    #[test]
    fn test_from_probabilities_rejects_bad_values() {
        assert!(Distribution::from_probabilities(vec![]).is_err());
        assert!(Distribution::from_probabilities(vec![0.5, -0.1]).is_err());
        assert!(Distribution::from_probabilities(vec![f64::NAN]).is_err());
        assert!(Distribution::from_probabilities(vec![2.0]).unwrap_err().is_invalid_argument());
        assert!(Distribution::from_probabilities(vec![f64::INFINITY]).is_err());
    }

    #[test]
    fn test_from_logits_is_normalized() {
        let dist = Distribution::from_logits(&[1.0, 2.0, 3.0], 1.0).unwrap();
        assert!((dist.total_probability() - 1.0).abs() < 1e-9);
        assert!(dist.get(2).unwrap().probability > dist.get(1).unwrap().probability);
    }

    #[test]
    fn test_temperature_flattens_distribution() {
        let sharp = Distribution::from_logits(&[1.0, 3.0], 0.5).unwrap();
        let flat = Distribution::from_logits(&[1.0, 3.0], 4.0).unwrap();
        assert!(sharp.get(1).unwrap().probability > flat.get(1).unwrap().probability);
        assert!((flat.total_probability() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_large_logits_do_not_overflow() {
        let dist = Distribution::from_logits(&[1000.0, 1000.0], 1.0).unwrap();
        assert!((dist.get(0).unwrap().probability - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_temperature_rejected() {
        assert!(Distribution::from_logits(&[1.0], 0.0).unwrap_err().is_invalid_argument());
        assert!(Distribution::from_logits(&[1.0], -1.0).is_err());
        assert!(Distribution::from_logits(&[1.0], f64::INFINITY).is_err());
    }

    #[test]
    fn test_get_out_of_range() {
        let dist = Distribution::from_probabilities(vec![1.0]).unwrap();
        assert!(dist.get(5).unwrap_err().is_invalid_argument());
    }
}
