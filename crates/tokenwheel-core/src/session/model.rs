//! Session domain model.
//!
//! A session is one learner's evolving text: a prompt plus the ordered list of
//! tokens picked so far. The current text is always derived from those two,
//! never stored on its own.

use crate::categorizer::{OtherSelection, TokenCategory, classify};
use crate::error::{Result, WheelError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// One token picked by the user (or sampled on their behalf).
///
/// Immutable once appended; leaves the history only through undo or a prompt
/// reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSelection {
    pub token_id: u32,
    pub token_text: String,
    pub probability: f64,
    pub category: TokenCategory,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sampled_from_other: bool,
    pub selected_at: DateTime<Utc>,
}

impl TokenSelection {
    /// A token chosen explicitly by id or text, categorised against `threshold`.
    pub fn explicit(
        token_id: u32,
        token_text: impl Into<String>,
        probability: f64,
        threshold: f64,
    ) -> Self {
        Self {
            token_id,
            token_text: token_text.into(),
            probability,
            category: classify(probability, threshold),
            sampled_from_other: false,
            selected_at: Utc::now(),
        }
    }

    /// A token drawn from the Other bucket.
    pub fn sampled(selection: &OtherSelection, token_text: impl Into<String>) -> Self {
        Self {
            token_id: selection.token_id,
            token_text: token_text.into(),
            probability: selection.probability,
            category: TokenCategory::Other,
            sampled_from_other: true,
            selected_at: Utc::now(),
        }
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No prompt set yet
    Uninitialized,
    /// Prompt set; history may change
    Active,
}

/// Owned, serialisable view of a session at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub model_name: String,
    pub initial_prompt: String,
    pub current_text: String,
    pub token_history: Vec<TokenSelection>,
    pub generation_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    model_name: String,
    prompt: Option<String>,
    history: Vec<TokenSelection>,
    created_at: DateTime<Utc>,
    last_accessed_at: DateTime<Utc>,
    /// Bumped by every prompt/history mutation.
    revision: u64,
    /// Set once the store has dropped this session; later access reports NotFound.
    retired: bool,
}

impl Session {
    /// Creates an uninitialised session with a fresh random id.
    pub fn new(model_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            model_name: model_name.into(),
            prompt: None,
            history: Vec::new(),
            created_at: now,
            last_accessed_at: now,
            revision: 0,
            retired: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// The prompt, or `""` while uninitialised.
    pub fn prompt(&self) -> &str {
        self.prompt.as_deref().unwrap_or("")
    }

    pub fn history(&self) -> &[TokenSelection] {
        &self.history
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_accessed_at(&self) -> DateTime<Utc> {
        self.last_accessed_at
    }

    pub fn state(&self) -> SessionState {
        match self.prompt {
            Some(_) => SessionState::Active,
            None => SessionState::Uninitialized,
        }
    }

    /// Prompt followed by every selected token's text, in order.
    pub fn current_text(&self) -> String {
        let mut text = self.prompt().to_string();
        for selection in &self.history {
            text.push_str(&selection.token_text);
        }
        text
    }

    /// Number of tokens selected since the prompt was set.
    pub fn generation_count(&self) -> usize {
        self.history.len()
    }

    /// Counter that changes whenever the prompt or history changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Refreshes the access time that drives expiry.
    pub fn touch(&mut self) {
        self.last_accessed_at = Utc::now();
    }

    /// Sets (or resets) the prompt and clears the history.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `text` is empty or only whitespace.
    pub fn set_prompt(&mut self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(WheelError::invalid_argument("Empty or invalid prompt"));
        }
        self.prompt = Some(text);
        self.history.clear();
        self.revision += 1;
        self.touch();
        Ok(())
    }

    /// Appends a selection to the end of the history.
    ///
    /// # Errors
    ///
    /// `PromptNotSet` if the session is uninitialised.
    pub fn append(&mut self, selection: TokenSelection) -> Result<()> {
        self.ensure_active()?;
        self.history.push(selection);
        self.revision += 1;
        self.touch();
        Ok(())
    }

    /// Appends only if nothing has changed since [`Session::revision`]
    /// returned `expected_revision`.
    ///
    /// Callers that scored the text without holding the session lock use this
    /// to avoid committing a token computed against stale text.
    ///
    /// # Errors
    ///
    /// - `PromptNotSet` if the session is uninitialised
    /// - `Conflict` if the prompt or history changed
    pub fn append_if_current(
        &mut self,
        expected_revision: u64,
        selection: TokenSelection,
    ) -> Result<()> {
        self.ensure_active()?;
        if self.revision != expected_revision {
            return Err(WheelError::Conflict(self.id.clone()));
        }
        self.append(selection)
    }

    /// Removes and returns the most recent selection. Never touches the prompt.
    ///
    /// # Errors
    ///
    /// - `PromptNotSet` if the session is uninitialised
    /// - `NothingToUndo` if the history is empty
    pub fn undo(&mut self) -> Result<TokenSelection> {
        self.ensure_active()?;
        let removed = self.history.pop().ok_or(WheelError::NothingToUndo)?;
        self.revision += 1;
        self.touch();
        Ok(removed)
    }

    /// `true` if the session has been idle for longer than `ttl`.
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.is_expired_at(ttl, Utc::now())
    }

    /// [`Session::is_expired`] against an explicit clock reading.
    pub fn is_expired_at(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => match self.last_accessed_at.checked_add_signed(ttl) {
                Some(deadline) => now > deadline,
                None => false,
            },
            // A TTL too large to represent never elapses.
            Err(_) => false,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.clone(),
            model_name: self.model_name.clone(),
            initial_prompt: self.prompt().to_string(),
            current_text: self.current_text(),
            token_history: self.history.clone(),
            generation_count: self.generation_count(),
            created_at: self.created_at,
            last_accessed: self.last_accessed_at,
        }
    }

    pub(crate) fn is_retired(&self) -> bool {
        self.retired
    }

    pub(crate) fn retire(&mut self) {
        self.retired = true;
    }

    fn ensure_active(&self) -> Result<()> {
        match self.state() {
            SessionState::Active => Ok(()),
            SessionState::Uninitialized => Err(WheelError::PromptNotSet(self.id.clone())),
        }
    }
}
