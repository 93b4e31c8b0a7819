//! Fixed-table oracle.
//!
//! Scores every text with the same logit table. Useful for demos, offline
//! development and tests where a real model is not available.

use async_trait::async_trait;
use tokenwheel_core::distribution::Distribution;
use tokenwheel_core::error::{Result, WheelError};
use tokenwheel_core::oracle::ModelOracle;

#[derive(Debug, Clone)]
pub struct FixedOracle {
    model_name: String,
    vocabulary: Vec<String>,
    logits: Vec<f32>,
}

impl FixedOracle {
    /// # Errors
    ///
    /// `Config` if the table is empty or the two vectors differ in length.
    pub fn new(
        model_name: impl Into<String>,
        vocabulary: Vec<String>,
        logits: Vec<f32>,
    ) -> Result<Self> {
        let model_name = model_name.into();
        if vocabulary.is_empty() || vocabulary.len() != logits.len() {
            return Err(WheelError::config(format!(
                "fixed oracle '{}' needs one logit per vocabulary entry ({} entries, {} logits)",
                model_name,
                vocabulary.len(),
                logits.len()
            )));
        }
        Ok(Self {
            model_name,
            vocabulary,
            logits,
        })
    }

    /// Builds a table whose softmax at temperature 1 equals `probabilities`.
    pub fn from_probabilities(
        model_name: impl Into<String>,
        entries: &[(&str, f64)],
    ) -> Result<Self> {
        let vocabulary = entries.iter().map(|(text, _)| text.to_string()).collect();
        let logits = entries.iter().map(|(_, p)| p.ln() as f32).collect();
        Self::new(model_name, vocabulary, logits)
    }
}

#[async_trait]
impl ModelOracle for FixedOracle {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    async fn score_next_token(&self, _text: &str, temperature: f64) -> Result<Distribution> {
        Distribution::from_logits(&self.logits, temperature)
    }

    async fn decode(&self, token_id: u32) -> Result<String> {
        self.vocabulary
            .get(token_id as usize)
            .cloned()
            .ok_or_else(|| {
                WheelError::invalid_argument(format!(
                    "token id {} is outside the vocabulary (size {})",
                    token_id,
                    self.vocabulary.len()
                ))
            })
    }

    /// Greedy longest-match segmentation over the vocabulary.
    async fn encode(&self, text: &str) -> Result<Vec<u32>> {
        self.segment(text)
            .into_iter()
            .map(|piece| match piece {
                Piece::Token(id) => Ok(id),
                Piece::Unknown(rest) => Err(WheelError::invalid_argument(format!(
                    "text {:?} cannot be tokenized by model '{}'",
                    rest, self.model_name
                ))),
            })
            .collect()
    }

    /// Like `encode`, but each character outside the vocabulary counts as one token.
    async fn count_tokens(&self, text: &str) -> Result<usize> {
        Ok(self.segment(text).len())
    }
}

enum Piece<'a> {
    Token(u32),
    Unknown(&'a str),
}

impl FixedOracle {
    fn segment<'a>(&self, text: &'a str) -> Vec<Piece<'a>> {
        let mut pieces = Vec::new();
        let mut rest = text;
        while let Some(ch) = rest.chars().next() {
            let longest = self
                .vocabulary
                .iter()
                .enumerate()
                .filter(|(_, entry)| !entry.is_empty() && rest.starts_with(entry.as_str()))
                .max_by(|(a_id, a), (b_id, b)| a.len().cmp(&b.len()).then(b_id.cmp(a_id)));
            match longest {
                Some((id, entry)) => {
                    pieces.push(Piece::Token(id as u32));
                    rest = &rest[entry.len()..];
                }
                None => {
                    pieces.push(Piece::Unknown(rest));
                    rest = &rest[ch.len_utf8()..];
                }
            }
        }
        pieces
    }
}
