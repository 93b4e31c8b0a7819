//! Request and response payloads for the Token Wheel operations.
//!
//! Field names are the wire names; the transport serialises these directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokenwheel_core::categorizer::TokenCategory;
use tokenwheel_core::distribution::TokenProbability;
use tokenwheel_core::oracle::ModelInfo;
use tokenwheel_core::session::TokenSelection;

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CreateSessionRequest {
    /// Model to score with; the configured default when absent.
    #[serde(default)]
    pub model_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SetPromptRequest {
    pub prompt: String,
}

/// Query parameters of `next-token-probs`. Absent values use the configured defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NextTokenQuery {
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub other_top_k: Option<usize>,
    #[serde(default)]
    pub temperature: Option<f64>,
}

/// Token to append: by id, by text, or `category = "other"` to sample.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppendTokenRequest {
    #[serde(default)]
    pub token_id: Option<u32>,
    #[serde(default)]
    pub token_text: Option<String>,
    #[serde(default)]
    pub category: Option<TokenCategory>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub model_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetPromptResponse {
    pub session_id: String,
    pub current_text: String,
    /// Number of tokens the prompt encodes to.
    pub token_count: usize,
    pub message: String,
}

/// A scored token with its surface text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenData {
    pub token_id: u32,
    pub token_text: String,
    pub probability: f64,
    /// `None` for zero-probability tokens (log is `-inf`).
    pub log_probability: Option<f64>,
}

impl TokenData {
    pub fn new(token: &TokenProbability, token_text: String) -> Self {
        Self {
            token_id: token.token_id,
            token_text,
            probability: token.probability,
            log_probability: token
                .log_probability
                .is_finite()
                .then_some(token.log_probability),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtherCategoryInfo {
    pub total_probability: f64,
    pub token_count: usize,
    pub sample_tokens: Vec<TokenData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextTokenProbsResponse {
    pub session_id: String,
    pub current_text: String,
    pub threshold: f64,
    pub temperature: f64,
    pub above_threshold_tokens: Vec<TokenData>,
    pub other_category: OtherCategoryInfo,
    pub total_above_threshold_probability: f64,
    pub vocabulary_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppendedTokenInfo {
    pub token_id: u32,
    pub token_text: String,
    pub probability: f64,
    pub category: TokenCategory,
    pub sampled_from_other: bool,
}

impl From<&TokenSelection> for AppendedTokenInfo {
    fn from(selection: &TokenSelection) -> Self {
        Self {
            token_id: selection.token_id,
            token_text: selection.token_text.clone(),
            probability: selection.probability,
            category: selection.category,
            sampled_from_other: selection.sampled_from_other,
        }
    }
}

/// Where a sampled token sat within the Other bucket it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtherCategorySelectionInfo {
    pub total_probability: f64,
    pub token_count: usize,
    /// 1-based rank in the full distribution.
    pub selected_token_rank: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppendTokenResponse {
    pub session_id: String,
    pub previous_text: String,
    pub appended_token: AppendedTokenInfo,
    pub current_text: String,
    pub token_history: Vec<TokenSelection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_category_info: Option<OtherCategorySelectionInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndoTokenResponse {
    pub session_id: String,
    pub previous_text: String,
    pub removed_token: AppendedTokenInfo,
    pub current_text: String,
    pub token_history: Vec<TokenSelection>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteSessionResponse {
    pub message: String,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Whether the default model is loaded.
    pub model_loaded: bool,
    pub timestamp: DateTime<Utc>,
}
