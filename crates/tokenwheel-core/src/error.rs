//! Error types for the Token Wheel core.

use thiserror::Error;

/// The shared error type for every Token Wheel crate.
///
/// Each variant is one member of the error taxonomy the transport layer maps
/// to a user-facing status. Core operations return these immediately and never
/// leave a half-applied mutation behind.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WheelError {
    /// Unknown entity (e.g. session id)
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Bad threshold, temperature, prompt or token reference
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Mutation attempted on a session that has no prompt yet
    #[error("No prompt has been set for session '{0}'")]
    PromptNotSet(String),

    /// Undo on an empty history
    #[error("Nothing to undo: only the prompt remains")]
    NothingToUndo,

    /// Sampling from an empty (or massless) Other bucket
    #[error("No tokens available in the '{0}' category")]
    NoTokensInCategory(String),

    /// The scoring oracle failed to load or to answer
    #[error("Model oracle unavailable: {0}")]
    OracleUnavailable(String),

    /// The session changed between scoring and committing a selection
    #[error("Session '{0}' was modified concurrently; retry the request")]
    Conflict(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl WheelError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a NotFound error for a session id
    pub fn session_not_found(id: impl Into<String>) -> Self {
        Self::not_found("session", id)
    }

    /// Creates an InvalidArgument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Creates an OracleUnavailable error
    pub fn oracle_unavailable(message: impl Into<String>) -> Self {
        Self::OracleUnavailable(message.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is an InvalidArgument error
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Check if the caller may retry the same request later.
    ///
    /// Oracle outages and concurrent-modification conflicts are transient;
    /// everything else will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::OracleUnavailable(_) | Self::Conflict(_))
    }

    /// Stable machine-readable code for this error, used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::PromptNotSet(_) => "prompt_not_set",
            Self::NothingToUndo => "nothing_to_undo",
            Self::NoTokensInCategory(_) => "no_tokens_in_category",
            Self::OracleUnavailable(_) => "oracle_unavailable",
            Self::Conflict(_) => "conflict",
            Self::Config(_) => "config",
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for WheelError {
    fn from(err: std::io::Error) -> Self {
        Self::Config(format!("{} (kind: {:?})", err, err.kind()))
    }
}

impl From<toml::de::Error> for WheelError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("TOML - {}", err))
    }
}

impl From<toml::ser::Error> for WheelError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Config(format!("TOML - {}", err))
    }
}

impl From<serde_json::Error> for WheelError {
    fn from(err: serde_json::Error) -> Self {
        Self::OracleUnavailable(format!("malformed oracle payload: {}", err))
    }
}

/// A type alias for `Result<T, WheelError>`.
pub type Result<T> = std::result::Result<T, WheelError>;
