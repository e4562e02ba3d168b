//! Error types for Docent.

use crate::agent::Transcript;
use thiserror::Error;

/// Library-level error type for Docent operations.
#[derive(Error, Debug)]
pub enum DocentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Invalid model response: {0}")]
    ModelResponseInvalid(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool '{tool}' failed: {reason}")]
    ToolExecution { tool: String, reason: String },

    #[error("Tool '{0}' is registered more than once")]
    DuplicateTool(String),

    #[error("Invalid transcript: {0}")]
    InvalidTranscript(String),

    /// The turn stopped because the checkpoint could not be written.
    /// The in-memory transcript is carried so the caller keeps the work.
    #[error("Checkpoint write failed for session {session_id}: {reason}")]
    CheckpointWriteFailed {
        session_id: String,
        reason: String,
        transcript: Box<Transcript>,
    },

    #[error("Checkpoint store error: {0}")]
    Checkpoint(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session {0} has no unfinished turn")]
    NothingToResume(String),

    #[error("Turn budget exceeded: {0}")]
    TurnBudgetExceeded(String),

    #[error("Turn cancelled")]
    Cancelled,

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Corpus error: {0}")]
    Corpus(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),
}

impl DocentError {
    /// Whether retrying the same turn from the same transcript may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DocentError::ModelUnavailable(_) | DocentError::CheckpointWriteFailed { .. }
        )
    }
}

/// Result type alias for Docent operations.
pub type Result<T> = std::result::Result<T, DocentError>;
