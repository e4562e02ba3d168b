//! Read side of the ingested document corpus.
//!
//! The ingestion pipeline splits documents into passages, embeds them and
//! writes them to a passage store. Docent only queries that store.

mod memory;
mod sqlite;

pub use memory::MemoryCorpus;
pub use sqlite::SqliteCorpus;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A passage of an ingested document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    /// Unique passage ID.
    pub id: Uuid,
    /// Document this passage belongs to.
    pub document_id: String,
    /// Document title.
    pub document_title: String,
    /// Page number in the source document, if known.
    pub page: Option<u32>,
    /// Section heading, if the pipeline detected one.
    pub section_title: Option<String>,
    /// Text content of this passage.
    pub content: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// Order of this passage in the document.
    pub chunk_order: i32,
    /// When this passage was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl Passage {
    /// Create a new passage.
    pub fn new(
        document_id: impl Into<String>,
        document_title: impl Into<String>,
        page: Option<u32>,
        content: impl Into<String>,
        embedding: Vec<f32>,
        chunk_order: i32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id: document_id.into(),
            document_title: document_title.into(),
            page,
            section_title: None,
            content: content.into(),
            embedding,
            chunk_order,
            indexed_at: Utc::now(),
        }
    }

    /// Set the section heading.
    pub fn with_section(mut self, title: impl Into<String>) -> Self {
        self.section_title = Some(title.into());
        self
    }

    /// Location for citations, e.g. "p. 12 / Maintenance".
    pub fn location(&self) -> String {
        match (self.page, self.section_title.as_deref()) {
            (Some(page), Some(section)) => format!("p. {} / {}", page, section),
            (Some(page), None) => format!("p. {}", page),
            (None, Some(section)) => section.to_string(),
            (None, None) => format!("passage {}", self.chunk_order + 1),
        }
    }
}

/// A search result with score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The matched passage.
    pub passage: Passage,
    /// Similarity score (higher is better).
    pub score: f32,
}

/// Summary information about an ingested document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub document_id: String,
    pub document_title: String,
    pub passage_count: u32,
    /// Highest page number seen, if pages are known.
    pub page_count: Option<u32>,
    pub indexed_at: DateTime<Utc>,
}

/// Trait for passage store implementations.
#[async_trait]
pub trait Corpus: Send + Sync {
    /// Passages most similar to `query_embedding`, best first.
    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>>;

    /// List all ingested documents.
    async fn list_documents(&self) -> Result<Vec<DocumentInfo>>;

    /// Get a specific document's information.
    async fn get_document(&self, document_id: &str) -> Result<Option<DocumentInfo>>;

    /// All passages of a document, in document order.
    async fn passages(&self, document_id: &str) -> Result<Vec<Passage>>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Score, filter, order and truncate candidate passages.
pub(crate) fn rank(
    passages: impl Iterator<Item = Passage>,
    query_embedding: &[f32],
    limit: usize,
    min_score: f32,
) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = passages
        .map(|passage| {
            let score = cosine_similarity(query_embedding, &passage.embedding);
            SearchResult { passage, score }
        })
        .filter(|r| r.score >= min_score)
        .collect();

    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(limit);
    results
}
