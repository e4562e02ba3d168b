//! In-memory passage store.
//!
//! Useful for testing and small corpora.

use super::{rank, Corpus, DocumentInfo, Passage, SearchResult};
use crate::error::{DocentError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory passage store.
pub struct MemoryCorpus {
    passages: RwLock<Vec<Passage>>,
}

impl MemoryCorpus {
    /// Create an empty corpus.
    pub fn new() -> Self {
        Self {
            passages: RwLock::new(Vec::new()),
        }
    }

    /// Create a corpus holding `passages`.
    pub fn with_passages(passages: Vec<Passage>) -> Self {
        Self {
            passages: RwLock::new(passages),
        }
    }

    /// Add passages.
    pub fn insert(&self, passages: impl IntoIterator<Item = Passage>) -> Result<()> {
        let mut store = self.passages.write().map_err(poisoned)?;
        store.extend(passages);
        Ok(())
    }
}

impl Default for MemoryCorpus {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> DocentError {
    DocentError::Corpus(format!("Failed to acquire lock: {}", e))
}

#[async_trait]
impl Corpus for MemoryCorpus {
    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>> {
        let passages = self.passages.read().map_err(poisoned)?;
        Ok(rank(passages.iter().cloned(), query_embedding, limit, min_score))
    }

    async fn list_documents(&self) -> Result<Vec<DocumentInfo>> {
        let passages = self.passages.read().map_err(poisoned)?;
        let mut documents: HashMap<String, DocumentInfo> = HashMap::new();

        for passage in passages.iter() {
            let entry = documents
                .entry(passage.document_id.clone())
                .or_insert_with(|| DocumentInfo {
                    document_id: passage.document_id.clone(),
                    document_title: passage.document_title.clone(),
                    passage_count: 0,
                    page_count: None,
                    indexed_at: passage.indexed_at,
                });

            entry.passage_count += 1;
            entry.page_count = entry.page_count.max(passage.page);
            if passage.indexed_at > entry.indexed_at {
                entry.indexed_at = passage.indexed_at;
            }
        }

        let mut documents: Vec<DocumentInfo> = documents.into_values().collect();
        documents.sort_by(|a, b| b.indexed_at.cmp(&a.indexed_at));
        Ok(documents)
    }

    async fn get_document(&self, document_id: &str) -> Result<Option<DocumentInfo>> {
        let documents = self.list_documents().await?;
        Ok(documents.into_iter().find(|d| d.document_id == document_id))
    }

    async fn passages(&self, document_id: &str) -> Result<Vec<Passage>> {
        let passages = self.passages.read().map_err(poisoned)?;
        let mut result: Vec<Passage> = passages
            .iter()
            .filter(|p| p.document_id == document_id)
            .cloned()
            .collect();
        result.sort_by_key(|p| p.chunk_order);
        Ok(result)
    }
}
