//! SQLite-based passage store.
//!
//! Cosine similarity is computed in Rust over all stored passages.

use super::{rank, Corpus, DocumentInfo, Passage, SearchResult};
use crate::error::{DocentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS passages (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL,
        document_title TEXT NOT NULL,
        page INTEGER,
        section_title TEXT,
        content TEXT NOT NULL,
        embedding BLOB NOT NULL,
        chunk_order INTEGER NOT NULL,
        indexed_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_passages_document_id ON passages(document_id);
"#;

const PASSAGE_COLUMNS: &str = "id, document_id, document_title, page, section_title, content, \
                               embedding, chunk_order, indexed_at";

/// SQLite-based passage store.
pub struct SqliteCorpus {
    conn: Mutex<Connection>,
}

impl SqliteCorpus {
    /// Open the passage database at `path`, creating the schema if needed.
    #[instrument(skip_all)]
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Opened corpus at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory passage database (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Write passages. This is the ingestion pipeline's side of the store.
    #[instrument(skip(self, passages), fields(count = passages.len()))]
    pub fn insert_batch(&self, passages: &[Passage]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        for passage in passages {
            tx.execute(
                &format!(
                    "INSERT OR REPLACE INTO passages ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    PASSAGE_COLUMNS
                ),
                params![
                    passage.id.to_string(),
                    passage.document_id,
                    passage.document_title,
                    passage.page,
                    passage.section_title,
                    passage.content,
                    embedding_to_bytes(&passage.embedding),
                    passage.chunk_order,
                    passage.indexed_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        Ok(passages.len())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DocentError::Corpus(format!("Failed to acquire lock: {}", e)))
    }
}

/// Serialize embedding to little-endian bytes.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize embedding from little-endian bytes.
fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| {
            let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
            f32::from_le_bytes(arr)
        })
        .collect()
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn passage_from_row(row: &Row<'_>) -> rusqlite::Result<Passage> {
    let id: String = row.get(0)?;
    let embedding: Vec<u8> = row.get(6)?;
    let indexed_at: String = row.get(8)?;

    Ok(Passage {
        id: uuid::Uuid::parse_str(&id).unwrap_or_default(),
        document_id: row.get(1)?,
        document_title: row.get(2)?,
        page: row.get(3)?,
        section_title: row.get(4)?,
        content: row.get(5)?,
        embedding: bytes_to_embedding(&embedding),
        chunk_order: row.get(7)?,
        indexed_at: parse_timestamp(&indexed_at),
    })
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<DocumentInfo> {
    let indexed_at: String = row.get(4)?;
    Ok(DocumentInfo {
        document_id: row.get(0)?,
        document_title: row.get(1)?,
        passage_count: row.get(2)?,
        page_count: row.get(3)?,
        indexed_at: parse_timestamp(&indexed_at),
    })
}

#[async_trait]
impl Corpus for SqliteCorpus {
    #[instrument(skip(self, query_embedding))]
    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM passages", PASSAGE_COLUMNS))?;
        let passages = stmt.query_map([], passage_from_row)?;

        let results = rank(passages.filter_map(|p| p.ok()), query_embedding, limit, min_score);
        debug!("Found {} matching passages", results.len());
        Ok(results)
    }

    #[instrument(skip(self))]
    async fn list_documents(&self) -> Result<Vec<DocumentInfo>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT document_id, document_title, COUNT(*) AS passage_count,
                   MAX(page) AS page_count, MAX(indexed_at) AS indexed_at
            FROM passages
            GROUP BY document_id
            ORDER BY indexed_at DESC
            "#,
        )?;

        let documents = stmt.query_map([], document_from_row)?;
        Ok(documents.filter_map(|d| d.ok()).collect())
    }

    #[instrument(skip(self))]
    async fn get_document(&self, document_id: &str) -> Result<Option<DocumentInfo>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            r#"
            SELECT document_id, document_title, COUNT(*) AS passage_count,
                   MAX(page) AS page_count, MAX(indexed_at) AS indexed_at
            FROM passages
            WHERE document_id = ?1
            GROUP BY document_id
            "#,
            params![document_id],
            document_from_row,
        );

        match result {
            Ok(document) => Ok(Some(document)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn passages(&self, document_id: &str) -> Result<Vec<Passage>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM passages WHERE document_id = ?1 ORDER BY chunk_order",
            PASSAGE_COLUMNS
        ))?;

        let passages = stmt.query_map(params![document_id], passage_from_row)?;
        Ok(passages.filter_map(|p| p.ok()).collect())
    }
}
