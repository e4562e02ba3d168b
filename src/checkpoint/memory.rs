//! In-memory checkpoint store.
//!
//! Useful for testing and ephemeral sessions.

use super::{preview, CheckpointStore, SessionSummary};
use crate::agent::Transcript;
use crate::error::{DocentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

struct Entry {
    transcript: Transcript,
    revision: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// In-memory checkpoint store.
pub struct MemoryCheckpointStore {
    sessions: RwLock<HashMap<String, Entry>>,
}

impl MemoryCheckpointStore {
    /// Create a new in-memory checkpoint store.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryCheckpointStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> DocentError {
    DocentError::Checkpoint(format!("Failed to acquire lock: {}", e))
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, session_id: &str, transcript: &Transcript) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        let now = Utc::now();

        sessions
            .entry(session_id.to_string())
            .and_modify(|entry| {
                entry.transcript = transcript.clone();
                entry.revision += 1;
                entry.updated_at = now;
            })
            .or_insert_with(|| Entry {
                transcript: transcript.clone(),
                revision: 1,
                created_at: now,
                updated_at: now,
            });

        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<Transcript>> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        Ok(sessions.get(session_id).map(|entry| entry.transcript.clone()))
    }

    async fn list(&self) -> Result<Vec<SessionSummary>> {
        let sessions = self.sessions.read().map_err(poisoned)?;

        let mut summaries: Vec<SessionSummary> = sessions
            .iter()
            .map(|(id, entry)| SessionSummary {
                session_id: id.clone(),
                message_count: entry.transcript.len(),
                revision: entry.revision,
                preview: preview(&entry.transcript),
                created_at: entry.created_at,
                updated_at: entry.updated_at,
            })
            .collect();

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        Ok(sessions.remove(session_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Message;

    #[tokio::test]
    async fn test_memory_round_trip() {
        let store = MemoryCheckpointStore::new();
        let mut transcript = Transcript::new();
        transcript.append_user("hello");
        transcript.append_reply(Message::assistant("hi", vec![])).unwrap();

        assert!(store.load("s1").await.unwrap().is_none());

        store.save("s1", &transcript).await.unwrap();
        assert_eq!(store.load("s1").await.unwrap(), Some(transcript.clone()));

        transcript.append_user("again");
        store.save("s1", &transcript).await.unwrap();

        let sessions = store.list().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].revision, 2);
        assert_eq!(sessions[0].message_count, 3);
        assert_eq!(sessions[0].preview.as_deref(), Some("hello"));

        assert!(store.delete("s1").await.unwrap());
        assert!(!store.delete("s1").await.unwrap());
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let store = std::sync::Arc::new(MemoryCheckpointStore::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    let mut transcript = Transcript::new();
                    transcript.append_user(format!("session {}", i));
                    store.save(&format!("s{}", i), &transcript).await.unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        for i in 0..8 {
            let transcript = store.load(&format!("s{}", i)).await.unwrap().unwrap();
            assert_eq!(transcript.messages()[0].content(), format!("session {}", i));
        }
    }
}
