//! Checkpoint storage for conversation sessions.
//!
//! A checkpoint is the full transcript of a session, keyed by session id.
//! Saving under an existing id supersedes the previous checkpoint.

mod memory;
mod sqlite;

pub use memory::MemoryCheckpointStore;
pub use sqlite::SqliteCheckpointStore;

use crate::agent::{Role, Transcript};
use crate::config::Settings;
use crate::error::{DocentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Summary information about a stored session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session id.
    pub session_id: String,
    /// Number of messages in the stored transcript.
    pub message_count: usize,
    /// Number of saves for this session.
    pub revision: u64,
    /// Start of the first user message.
    pub preview: Option<String>,
    /// When the session was first saved.
    pub created_at: DateTime<Utc>,
    /// When the session was last saved.
    pub updated_at: DateTime<Utc>,
}

/// Trait for checkpoint store implementations.
///
/// Saves for one session id are applied in call order; saves for different
/// ids do not affect each other.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Store `transcript` as the current checkpoint of `session_id`.
    async fn save(&self, session_id: &str, transcript: &Transcript) -> Result<()>;

    /// Load the checkpoint of `session_id`, or `None` if there is none.
    async fn load(&self, session_id: &str) -> Result<Option<Transcript>>;

    /// List stored sessions, most recently updated first.
    async fn list(&self) -> Result<Vec<SessionSummary>>;

    /// Delete a session. Returns whether it existed.
    async fn delete(&self, session_id: &str) -> Result<bool>;
}

/// Open the checkpoint store selected in the settings.
pub fn open_store(settings: &Settings) -> Result<Arc<dyn CheckpointStore>> {
    match settings.checkpoint.provider.as_str() {
        "sqlite" => Ok(Arc::new(SqliteCheckpointStore::new(&settings.checkpoint_path())?)),
        "memory" => Ok(Arc::new(MemoryCheckpointStore::new())),
        other => Err(DocentError::Config(format!(
            "Unknown checkpoint provider: {}",
            other
        ))),
    }
}

const PREVIEW_CHARS: usize = 60;

/// First user message of a transcript, shortened for listings.
pub(crate) fn preview(transcript: &Transcript) -> Option<String> {
    transcript
        .iter()
        .find(|m| m.role() == Role::User)
        .map(|m| {
            let text = m.content().replace('\n', " ");
            if text.chars().count() > PREVIEW_CHARS {
                format!("{}...", text.chars().take(PREVIEW_CHARS).collect::<String>())
            } else {
                text
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_first_user_message() {
        let mut transcript = Transcript::new();
        assert_eq!(preview(&transcript), None);

        transcript.append_user("a".repeat(100));
        transcript.append_user("second");
        let text = preview(&transcript).unwrap();
        assert_eq!(text.chars().count(), PREVIEW_CHARS + 3);
        assert!(text.ends_with("..."));
    }

    #[test]
    fn test_open_store_rejects_unknown_provider() {
        let mut settings = Settings::default();
        settings.checkpoint.provider = "redis".to_string();
        assert!(open_store(&settings).is_err());

        settings.checkpoint.provider = "memory".to_string();
        assert!(open_store(&settings).is_ok());
    }
}
