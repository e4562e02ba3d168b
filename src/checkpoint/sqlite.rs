//! SQLite-based checkpoint store.
//!
//! One row per session holding the JSON-encoded transcript. Every save bumps
//! the row's revision inside a single upsert statement.

use super::{preview, CheckpointStore, SessionSummary};
use crate::agent::Transcript;
use crate::error::{DocentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS sessions (
        session_id TEXT PRIMARY KEY,
        transcript_json TEXT NOT NULL,
        message_count INTEGER NOT NULL,
        revision INTEGER NOT NULL,
        preview TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_sessions_updated_at ON sessions(updated_at);
"#;

/// SQLite-based checkpoint store.
pub struct SqliteCheckpointStore {
    conn: Mutex<Connection>,
}

impl SqliteCheckpointStore {
    /// Open (or create) a checkpoint database at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite checkpoint store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory checkpoint database (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DocentError::Checkpoint(format!("Failed to acquire lock: {}", e)))
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    #[instrument(skip(self, transcript), fields(messages = transcript.len()))]
    async fn save(&self, session_id: &str, transcript: &Transcript) -> Result<()> {
        let json = serde_json::to_string(transcript)?;
        let now = Utc::now().to_rfc3339();
        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT INTO sessions
            (session_id, transcript_json, message_count, revision, preview, created_at, updated_at)
            VALUES (?1, ?2, ?3, 1, ?4, ?5, ?5)
            ON CONFLICT(session_id) DO UPDATE SET
                transcript_json = excluded.transcript_json,
                message_count = excluded.message_count,
                revision = sessions.revision + 1,
                preview = excluded.preview,
                updated_at = excluded.updated_at
            "#,
            params![
                session_id,
                json,
                transcript.len() as i64,
                preview(transcript),
                now,
            ],
        )?;

        debug!("Saved checkpoint for session {}", session_id);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn load(&self, session_id: &str) -> Result<Option<Transcript>> {
        let conn = self.lock()?;

        let result = conn.query_row(
            "SELECT transcript_json FROM sessions WHERE session_id = ?1",
            params![session_id],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(json) => {
                let transcript: Transcript = serde_json::from_str(&json).map_err(|e| {
                    DocentError::InvalidTranscript(format!(
                        "Stored checkpoint for {} is unreadable: {}",
                        session_id, e
                    ))
                })?;
                Ok(Some(transcript))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<SessionSummary>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT session_id, message_count, revision, preview, created_at, updated_at
            FROM sessions
            ORDER BY updated_at DESC
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            let message_count: i64 = row.get(1)?;
            let revision: i64 = row.get(2)?;
            let created_at: String = row.get(4)?;
            let updated_at: String = row.get(5)?;

            Ok(SessionSummary {
                session_id: row.get(0)?,
                message_count: message_count as usize,
                revision: revision as u64,
                preview: row.get(3)?,
                created_at: parse_timestamp(&created_at),
                updated_at: parse_timestamp(&updated_at),
            })
        })?;

        let sessions = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    #[instrument(skip(self))]
    async fn delete(&self, session_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM sessions WHERE session_id = ?1",
            params![session_id],
        )?;

        if deleted > 0 {
            info!("Deleted session {}", session_id);
        }
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Message, ToolRequest};
    use serde_json::json;

    fn sample_transcript() -> Transcript {
        let request = ToolRequest::new(
            "call_1",
            "search_documents",
            json!({"query": "torque limits"}).as_object().cloned().unwrap(),
        );

        let mut transcript = Transcript::new();
        transcript.append_user("What are the torque limits?");
        transcript
            .append_exchange(
                Message::assistant("", vec![request.clone()]),
                vec![Message::tool_result(&request, "Found 1 passage")],
            )
            .unwrap();
        transcript
            .append_reply(Message::assistant("The limit is 40 Nm.", vec![]))
            .unwrap();
        transcript
    }

    #[tokio::test]
    async fn test_sqlite_round_trip() {
        let store = SqliteCheckpointStore::in_memory().unwrap();
        let transcript = sample_transcript();

        store.save("session-a", &transcript).await.unwrap();
        let loaded = store.load("session-a").await.unwrap();

        assert_eq!(loaded, Some(transcript));
        assert!(store.load("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revisions_and_listing() {
        let store = SqliteCheckpointStore::in_memory().unwrap();
        let mut transcript = Transcript::new();
        transcript.append_user("first question");

        store.save("a", &transcript).await.unwrap();
        transcript.append_reply(Message::assistant("answer", vec![])).unwrap();
        store.save("a", &transcript).await.unwrap();
        store.save("b", &Transcript::new()).await.unwrap();

        let sessions = store.list().await.unwrap();
        assert_eq!(sessions.len(), 2);

        let a = sessions.iter().find(|s| s.session_id == "a").unwrap();
        assert_eq!(a.revision, 2);
        assert_eq!(a.message_count, 2);
        assert_eq!(a.preview.as_deref(), Some("first question"));

        assert_eq!(store.load("a").await.unwrap().map(|t| t.len()), Some(2));
        assert!(store.delete("a").await.unwrap());
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_on_disk_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sessions.db");
        let transcript = sample_transcript();

        {
            let store = SqliteCheckpointStore::new(&path).unwrap();
            store.save("persisted", &transcript).await.unwrap();
        }

        let reopened = SqliteCheckpointStore::new(&path).unwrap();
        assert_eq!(reopened.load("persisted").await.unwrap(), Some(transcript));
    }

    #[tokio::test]
    async fn test_corrupt_checkpoint_is_rejected() {
        let store = SqliteCheckpointStore::in_memory().unwrap();
        {
            let conn = store.lock().unwrap();
            conn.execute(
                "INSERT INTO sessions VALUES ('bad', '[{\"role\":\"tool_result\",\"content\":\"x\",\"created_at\":\"2024-01-01T00:00:00Z\"}]', 1, 1, NULL, '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
                [],
            )
            .unwrap();
        }

        let err = store.load("bad").await.unwrap_err();
        assert!(matches!(err, DocentError::InvalidTranscript(_)));
    }
}
