//! Model oracle interfaces.
//!
//! The language model and its tokenizer are opaque to the core: they are
//! reached through [`ModelOracle`], and oracles are obtained by model name from
//! an injected [`OracleProvider`] rather than from any ambient cache.

use crate::distribution::Distribution;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A loaded model/tokenizer pair that scores text and maps tokens to text.
///
/// # Implementation Notes
///
/// Implementations may be slow or remote. Callers never hold a session lock
/// across these calls.
#[async_trait]
pub trait ModelOracle: Send + Sync {
    /// Identifier this oracle was loaded under.
    fn model_name(&self) -> &str;

    /// Number of entries in every distribution this oracle returns.
    fn vocabulary_size(&self) -> usize;

    /// Full-vocabulary next-token distribution for `text`, with `temperature`
    /// already applied.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for a non-positive temperature
    /// - `OracleUnavailable` if the backend cannot answer
    async fn score_next_token(&self, text: &str, temperature: f64) -> Result<Distribution>;

    /// Surface text of one token.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `token_id` is outside the vocabulary.
    async fn decode(&self, token_id: u32) -> Result<String>;

    /// Surface text of several tokens, one string per id, in order.
    async fn decode_batch(&self, token_ids: &[u32]) -> Result<Vec<String>> {
        let mut texts = Vec::with_capacity(token_ids.len());
        for &token_id in token_ids {
            texts.push(self.decode(token_id).await?);
        }
        Ok(texts)
    }

    /// Token ids for `text`, without special tokens.
    async fn encode(&self, text: &str) -> Result<Vec<u32>>;

    /// Number of tokens `text` occupies.
    async fn count_tokens(&self, text: &str) -> Result<usize> {
        Ok(self.encode(text).await?.len())
    }
}

/// Descriptive entry for a model a session may be created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub parameters: String,
    pub default: bool,
}

/// Source of oracles keyed by model name, with its own loading lifecycle.
#[async_trait]
pub trait OracleProvider: Send + Sync {
    /// Returns the oracle for `model_name`, loading it on first use.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if the model is not configured
    /// - `OracleUnavailable` if loading fails
    async fn oracle(&self, model_name: &str) -> Result<Arc<dyn ModelOracle>>;

    /// `true` once `model_name` has been loaded successfully.
    async fn is_loaded(&self, model_name: &str) -> bool;

    /// Every configured model.
    fn available_models(&self) -> Vec<ModelInfo>;

    /// `true` if `model_name` is configured (loaded or not).
    fn is_known(&self, model_name: &str) -> bool {
        self.available_models().iter().any(|m| m.id == model_name)
    }

    /// The model flagged as default, if any.
    fn default_model(&self) -> Option<String> {
        self.available_models()
            .into_iter()
            .find(|m| m.default)
            .map(|m| m.id)
    }
}
