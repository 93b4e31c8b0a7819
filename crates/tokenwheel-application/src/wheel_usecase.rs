//! Token Wheel use case implementation.
//!
//! `TokenWheelUseCase` is the single entry point the transport talks to. It
//! looks sessions up in the [`SessionStore`], asks the model oracle for a
//! distribution, partitions it and commits the user's choice.
//!
//! Oracle calls are never made while a session lock is held: the text is read
//! under the lock, scored without it, and the selection is committed with
//! [`Session::append_if_current`] so a concurrent change surfaces as
//! `Conflict` instead of a token appended to the wrong text.
//!
//! [`Session::append_if_current`]: tokenwheel_core::session::Session::append_if_current

use crate::dto::{
    AppendTokenRequest, AppendTokenResponse, AppendedTokenInfo, CreateSessionResponse,
    DeleteSessionResponse, HealthResponse, ModelsResponse, NextTokenProbsResponse,
    NextTokenQuery, OtherCategoryInfo, OtherCategorySelectionInfo, SetPromptResponse, TokenData,
    UndoTokenResponse,
};
use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Duration;
use tokenwheel_core::categorizer::{TokenCategory, categorize, sample_from_other, validate_threshold};
use tokenwheel_core::config::{SamplingConfig, SessionConfig};
use tokenwheel_core::distribution::{Distribution, validate_temperature};
use tokenwheel_core::error::{Result, WheelError};
use tokenwheel_core::oracle::{ModelOracle, OracleProvider};
use tokenwheel_core::session::{SessionSnapshot, SessionState, SessionStore, TokenSelection};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// What a scoring request needs from a session, read under its lock.
struct ScoringContext {
    model_name: String,
    text: String,
    revision: u64,
}

/// Use case for building text token by token.
///
/// # Responsibilities
///
/// - Creating sessions against a configured model
/// - Setting prompts, listing next-token probabilities, appending and undoing
/// - Sampling from the Other bucket with the use case's own RNG
/// - Expiring idle sessions on a timer
pub struct TokenWheelUseCase {
    store: SessionStore,
    oracles: Arc<dyn OracleProvider>,
    sampling: SamplingConfig,
    session_ttl: Duration,
    sweep_interval: Duration,
    /// Entropy for Other sampling; seeded from config when a seed is given.
    rng: Mutex<StdRng>,
}

impl TokenWheelUseCase {
    /// Creates a use case with an empty session store.
    pub fn new(
        oracles: Arc<dyn OracleProvider>,
        sampling: SamplingConfig,
        sessions: SessionConfig,
    ) -> Self {
        let rng = match sampling.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            store: SessionStore::new(),
            oracles,
            session_ttl: sessions.ttl(),
            sweep_interval: sessions.sweep_interval(),
            sampling,
            rng: Mutex::new(rng),
        }
    }

    /// Overrides the idle TTL and sweep period taken from [`SessionConfig`].
    pub fn with_expiry(mut self, ttl: Duration, sweep_interval: Duration) -> Self {
        self.session_ttl = ttl;
        self.sweep_interval = sweep_interval;
        self
    }

    // ============================================================================
    // Sessions
    // ============================================================================

    /// Creates a session after making sure its model can be loaded.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for an unknown model (or none configured)
    /// - `OracleUnavailable` if the model fails to load
    pub async fn create_session(&self, model_name: Option<String>) -> Result<CreateSessionResponse> {
        let model_name = match model_name {
            Some(name) => name,
            None => self
                .oracles
                .default_model()
                .ok_or_else(|| WheelError::invalid_argument("No models are configured"))?,
        };

        self.oracles.oracle(&model_name).await?;
        let snapshot = self.store.create(model_name).await;

        tracing::info!(
            session_id = %snapshot.session_id,
            model = %snapshot.model_name,
            "Session created"
        );
        Ok(CreateSessionResponse {
            session_id: snapshot.session_id,
            model_name: snapshot.model_name,
            created_at: snapshot.created_at,
        })
    }

    pub async fn get_state(&self, session_id: &str) -> Result<SessionSnapshot> {
        self.store.snapshot(session_id).await
    }

    /// Sets (or resets) the prompt, clearing the history.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown session
    /// - `InvalidArgument` for an empty or whitespace-only prompt
    pub async fn set_prompt(&self, session_id: &str, prompt: String) -> Result<SetPromptResponse> {
        let model_name = self
            .store
            .with_session(session_id, |session| Ok(session.model_name().to_string()))
            .await?;
        if prompt.trim().is_empty() {
            return Err(WheelError::invalid_argument("Empty or invalid prompt"));
        }

        let oracle = self.oracles.oracle(&model_name).await?;
        let token_count = oracle.count_tokens(&prompt).await?;

        let current_text = self
            .store
            .with_session(session_id, |session| {
                session.set_prompt(prompt)?;
                Ok(session.current_text())
            })
            .await?;

        tracing::debug!(session_id = %session_id, token_count, "Prompt set");
        Ok(SetPromptResponse {
            session_id: session_id.to_string(),
            current_text,
            token_count,
            message: "Prompt set successfully".to_string(),
        })
    }

    /// Scores the session's current text and partitions the distribution.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown session
    /// - `PromptNotSet` before a prompt is set
    /// - `InvalidArgument` for a threshold outside `[0, 1]` or a non-positive temperature
    /// - `OracleUnavailable` if scoring fails
    pub async fn next_token_probs(
        &self,
        session_id: &str,
        query: NextTokenQuery,
    ) -> Result<NextTokenProbsResponse> {
        let context = self.scoring_context(session_id).await?;

        let threshold = query.threshold.unwrap_or(self.sampling.default_threshold);
        let top_k = query.other_top_k.unwrap_or(self.sampling.default_other_top_k);
        let temperature = query.temperature.unwrap_or(self.sampling.default_temperature);
        validate_threshold(threshold)?;
        validate_temperature(temperature)?;

        let oracle = self.oracles.oracle(&context.model_name).await?;
        let distribution = oracle.score_next_token(&context.text, temperature).await?;
        let result = categorize(&distribution, threshold, top_k)?;

        let ids: Vec<u32> = result
            .above_threshold
            .iter()
            .chain(&result.other.sample_tokens)
            .map(|token| token.token_id)
            .collect();
        let mut texts = oracle.decode_batch(&ids).await?.into_iter();

        let above_threshold_tokens = result
            .above_threshold
            .iter()
            .zip(texts.by_ref())
            .map(|(token, text)| TokenData::new(token, text))
            .collect();
        let sample_tokens = result
            .other
            .sample_tokens
            .iter()
            .zip(texts)
            .map(|(token, text)| TokenData::new(token, text))
            .collect();

        tracing::debug!(
            session_id = %session_id,
            threshold,
            temperature,
            above = result.above_threshold.len(),
            other = result.other.count,
            "Next-token distribution categorized"
        );

        Ok(NextTokenProbsResponse {
            session_id: session_id.to_string(),
            current_text: context.text,
            threshold,
            temperature,
            above_threshold_tokens,
            other_category: OtherCategoryInfo {
                total_probability: result.other.total_probability,
                token_count: result.other.count,
                sample_tokens,
            },
            total_above_threshold_probability: result.total_above_threshold_probability,
            vocabulary_size: distribution.len(),
        })
    }

    /// Appends a token chosen by id, by text, or sampled from Other.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown session
    /// - `PromptNotSet` before a prompt is set
    /// - `InvalidArgument` for a bad token reference, threshold or temperature
    /// - `NoTokensInCategory` when sampling from an empty Other bucket
    /// - `Conflict` if the session changed while the oracle was scoring
    /// - `OracleUnavailable` if scoring fails
    pub async fn append_token(
        &self,
        session_id: &str,
        request: AppendTokenRequest,
    ) -> Result<AppendTokenResponse> {
        let context = self.scoring_context(session_id).await?;

        let threshold = request.threshold.unwrap_or(self.sampling.default_threshold);
        let temperature = request
            .temperature
            .unwrap_or(self.sampling.default_temperature);
        validate_threshold(threshold)?;
        validate_temperature(temperature)?;

        let oracle = self.oracles.oracle(&context.model_name).await?;
        let distribution = oracle.score_next_token(&context.text, temperature).await?;

        let (selection, other_category_info) = match request.category {
            Some(TokenCategory::Other) => {
                let picked = {
                    let mut rng = self.rng.lock().await;
                    sample_from_other(&distribution, threshold, &mut *rng)?
                };
                let token_text = oracle.decode(picked.token_id).await?;
                let info = OtherCategorySelectionInfo {
                    total_probability: picked.other_total_probability,
                    token_count: picked.other_count,
                    selected_token_rank: picked.rank,
                };
                (TokenSelection::sampled(&picked, token_text), Some(info))
            }
            _ => {
                let selection = self
                    .explicit_selection(oracle.as_ref(), &distribution, &request, threshold)
                    .await?;
                (selection, None)
            }
        };

        let (previous_text, current_text, token_history) = self
            .store
            .with_session(session_id, |session| {
                let previous_text = session.current_text();
                session.append_if_current(context.revision, selection.clone())?;
                Ok((previous_text, session.current_text(), session.history().to_vec()))
            })
            .await?;

        tracing::debug!(
            session_id = %session_id,
            token_id = selection.token_id,
            category = %selection.category,
            sampled = selection.sampled_from_other,
            "Token appended"
        );

        Ok(AppendTokenResponse {
            session_id: session_id.to_string(),
            previous_text,
            appended_token: AppendedTokenInfo::from(&selection),
            current_text,
            token_history,
            other_category_info,
        })
    }

    /// Removes the most recent selection; the prompt is never touched.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown session
    /// - `PromptNotSet` before a prompt is set
    /// - `NothingToUndo` when only the prompt remains
    pub async fn undo(&self, session_id: &str) -> Result<UndoTokenResponse> {
        let (previous_text, removed, current_text, token_history) = self
            .store
            .with_session(session_id, |session| {
                let previous_text = session.current_text();
                let removed = session.undo()?;
                Ok((
                    previous_text,
                    removed,
                    session.current_text(),
                    session.history().to_vec(),
                ))
            })
            .await?;

        tracing::debug!(session_id = %session_id, token_id = removed.token_id, "Token undone");
        Ok(UndoTokenResponse {
            session_id: session_id.to_string(),
            previous_text,
            removed_token: AppendedTokenInfo::from(&removed),
            current_text,
            token_history,
            message: "Last token removed successfully".to_string(),
        })
    }

    /// # Errors
    ///
    /// `NotFound` for an unknown session.
    pub async fn delete_session(&self, session_id: &str) -> Result<DeleteSessionResponse> {
        if !self.store.delete(session_id).await {
            return Err(WheelError::session_not_found(session_id));
        }
        tracing::info!(session_id = %session_id, "Session deleted");
        Ok(DeleteSessionResponse {
            message: "Session deleted successfully".to_string(),
            session_id: session_id.to_string(),
        })
    }

    // ============================================================================
    // Models and health
    // ============================================================================

    pub fn list_models(&self) -> ModelsResponse {
        ModelsResponse {
            models: self.oracles.available_models(),
        }
    }

    /// Whether the default model has been loaded.
    pub async fn is_ready(&self) -> bool {
        match self.oracles.default_model() {
            Some(model_name) => self.oracles.is_loaded(&model_name).await,
            None => false,
        }
    }

    pub async fn health(&self) -> HealthResponse {
        HealthResponse {
            status: "healthy".to_string(),
            model_loaded: self.is_ready().await,
            timestamp: Utc::now(),
        }
    }

    // ============================================================================
    // Expiry
    // ============================================================================

    /// Runs one expiry pass. Returns how many sessions were removed.
    pub async fn run_expiry_sweep(&self) -> usize {
        let removed = self.store.sweep_expired(self.session_ttl).await;
        if removed > 0 {
            let remaining = self.store.count().await;
            tracing::info!(target: "session_sweep", removed, remaining, "Expired sessions removed");
        } else {
            tracing::debug!(target: "session_sweep", "No expired sessions");
        }
        removed
    }

    /// Starts the background expiry sweep.
    ///
    /// The sweep runs every `sweep_interval` until `shutdown` is cancelled.
    pub fn start_expiry_sweeper(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        use tokio::time::{MissedTickBehavior, interval};

        let usecase = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = interval(usecase.sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(
                target: "session_sweep",
                "Sweeper started ({:?} interval, {:?} TTL)",
                usecase.sweep_interval,
                usecase.session_ttl
            );

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        usecase.run_expiry_sweep().await;
                    }
                }
            }

            tracing::info!(target: "session_sweep", "Sweeper stopped");
        })
    }

    // ============================================================================
    // Helpers
    // ============================================================================

    async fn scoring_context(&self, session_id: &str) -> Result<ScoringContext> {
        self.store
            .with_session(session_id, |session| {
                if session.state() == SessionState::Uninitialized {
                    return Err(WheelError::PromptNotSet(session.id().to_string()));
                }
                Ok(ScoringContext {
                    model_name: session.model_name().to_string(),
                    text: session.current_text(),
                    revision: session.revision(),
                })
            })
            .await
    }

    async fn explicit_selection(
        &self,
        oracle: &dyn ModelOracle,
        distribution: &Distribution,
        request: &AppendTokenRequest,
        threshold: f64,
    ) -> Result<TokenSelection> {
        let (token_id, token_text) = match (request.token_id, &request.token_text) {
            (Some(token_id), _) => {
                distribution.get(token_id)?;
                (token_id, oracle.decode(token_id).await?)
            }
            (None, Some(token_text)) => match oracle.encode(token_text).await?.as_slice() {
                [token_id] => (*token_id, token_text.clone()),
                _ => {
                    return Err(WheelError::invalid_argument(
                        "Token text must correspond to exactly one token",
                    ));
                }
            },
            (None, None) => {
                return Err(WheelError::invalid_argument(
                    "Either token_id or token_text must be provided",
                ));
            }
        };

        let probability = distribution.get(token_id)?.probability;
        Ok(TokenSelection::explicit(
            token_id,
            token_text,
            probability,
            threshold,
        ))
    }
}
