//! Document tools backed by the ingested corpus.

use crate::agent::{optional_u64, required_str, Tool, ToolError};
use crate::corpus::Corpus;
use crate::embedding::Embedder;
use crate::error::DocentError;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Characters of each passage shown in search results.
const SEARCH_PREVIEW_CHARS: usize = 500;

/// Upper bound on the `limit` argument.
const MAX_SEARCH_LIMIT: u64 = 20;

/// Retrieval tool: passages relevant to a query.
pub struct SearchDocumentsTool {
    corpus: Arc<dyn Corpus>,
    embedder: Arc<dyn Embedder>,
    default_limit: usize,
    min_score: f32,
}

impl SearchDocumentsTool {
    pub fn new(corpus: Arc<dyn Corpus>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            corpus,
            embedder,
            default_limit: 5,
            min_score: 0.3,
        }
    }

    /// Set the number of passages returned when the model gives no limit.
    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    /// Set the minimum similarity score threshold.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }
}

#[async_trait]
impl Tool for SearchDocumentsTool {
    fn name(&self) -> &str {
        "search_documents"
    }

    fn description(&self) -> &str {
        "Search the document collection for passages relevant to a query. \
         Use this when you need specific information from the documents."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of passages (default: 5)",
                    "default": 5
                }
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let query = required_str(arguments, "query")?;
        if query.trim().is_empty() {
            return Err(ToolError::InvalidArgument {
                name: "query".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        let limit = optional_u64(arguments, "limit")?
            .map(|l| l.clamp(1, MAX_SEARCH_LIMIT) as usize)
            .unwrap_or(self.default_limit);

        let embedding = self.embedder.embed(query).await?;
        let results = self.corpus.search(&embedding, limit, self.min_score).await?;
        debug!("search_documents '{}' matched {} passages", query, results.len());

        if results.is_empty() {
            return Ok("No relevant passages found.".to_string());
        }

        let formatted = results
            .iter()
            .enumerate()
            .map(|(i, r)| {
                format!(
                    "{}. [{}] {} @ {} (score: {:.2})\n   {}",
                    i + 1,
                    r.passage.document_id,
                    r.passage.document_title,
                    r.passage.location(),
                    r.score,
                    r.passage.content.chars().take(SEARCH_PREVIEW_CHARS).collect::<String>()
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(format!("Found {} passages:\n\n{}", results.len(), formatted))
    }
}

/// Lists the ingested documents.
pub struct ListDocumentsTool {
    corpus: Arc<dyn Corpus>,
}

impl ListDocumentsTool {
    pub fn new(corpus: Arc<dyn Corpus>) -> Self {
        Self { corpus }
    }
}

#[async_trait]
impl Tool for ListDocumentsTool {
    fn name(&self) -> &str {
        "list_documents"
    }

    fn description(&self) -> &str {
        "List all documents in the collection. Use this to see what content is available."
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn invoke(&self, _arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let documents = self.corpus.list_documents().await?;

        if documents.is_empty() {
            return Ok("No documents ingested yet.".to_string());
        }

        let formatted = documents
            .iter()
            .map(|d| {
                let pages = d
                    .page_count
                    .map(|p| format!(", {} pages", p))
                    .unwrap_or_default();
                format!(
                    "- {} (ID: {}, {} passages{})",
                    d.document_title, d.document_id, d.passage_count, pages
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(format!("Documents ({}):\n\n{}", documents.len(), formatted))
    }
}

/// Reads every passage of one document in order.
pub struct GetDocumentTool {
    corpus: Arc<dyn Corpus>,
}

impl GetDocumentTool {
    pub fn new(corpus: Arc<dyn Corpus>) -> Self {
        Self { corpus }
    }
}

#[async_trait]
impl Tool for GetDocumentTool {
    fn name(&self) -> &str {
        "get_document"
    }

    fn description(&self) -> &str {
        "Get the full text of a document. Use this when you need complete context, \
         like for summaries or comparisons."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "document_id": {
                    "type": "string",
                    "description": "The document ID"
                }
            },
            "required": ["document_id"]
        })
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let document_id = required_str(arguments, "document_id")?;
        let Some(info) = self.corpus.get_document(document_id).await? else {
            return Err(DocentError::DocumentNotFound(document_id.to_string()).into());
        };
        let passages = self.corpus.passages(document_id).await?;

        let body = passages
            .iter()
            .map(|p| format!("[{}] {}", p.location(), p.content))
            .collect::<Vec<_>>()
            .join("\n\n");
        let pages = info
            .page_count
            .map(|p| format!(", Pages: {}", p))
            .unwrap_or_default();

        Ok(format!(
            "# {}\n\nPassages: {}{}\n\n{}",
            info.document_title, info.passage_count, pages, body
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{MemoryCorpus, Passage};
    use crate::error::Result;

    /// Embeds every query to the same vector.
    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }

        fn dimensions(&self) -> usize {
            self.0.len()
        }
    }

    fn corpus() -> Arc<dyn Corpus> {
        Arc::new(MemoryCorpus::with_passages(vec![
            Passage::new("manual", "Pump Manual", Some(1), "Wear gloves.", vec![1.0, 0.0], 0),
            Passage::new("manual", "Pump Manual", Some(4), "Torque bolts to 40 Nm.", vec![0.0, 1.0], 1)
                .with_section("Assembly"),
        ]))
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_search_documents() {
        let tool = SearchDocumentsTool::new(corpus(), Arc::new(FixedEmbedder(vec![0.0, 1.0])));

        let output = tool.invoke(&args(json!({"query": "torque"}))).await.unwrap();
        assert!(output.starts_with("Found 1 passages"));
        assert!(output.contains("Pump Manual @ p. 4 / Assembly"));
        assert!(output.contains("Torque bolts to 40 Nm."));
    }

    #[tokio::test]
    async fn test_search_documents_no_match_and_bad_args() {
        let tool = SearchDocumentsTool::new(corpus(), Arc::new(FixedEmbedder(vec![-1.0, -1.0])));

        let output = tool.invoke(&args(json!({"query": "torque"}))).await.unwrap();
        assert_eq!(output, "No relevant passages found.");

        assert!(matches!(
            tool.invoke(&args(json!({}))).await,
            Err(ToolError::MissingArgument(_))
        ));
        assert!(matches!(
            tool.invoke(&args(json!({"query": "  "}))).await,
            Err(ToolError::InvalidArgument { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_documents() {
        let output = ListDocumentsTool::new(corpus()).invoke(&Map::new()).await.unwrap();
        assert!(output.contains("- Pump Manual (ID: manual, 2 passages, 4 pages)"));

        let empty = ListDocumentsTool::new(Arc::new(MemoryCorpus::new()));
        assert_eq!(empty.invoke(&Map::new()).await.unwrap(), "No documents ingested yet.");
    }

    #[tokio::test]
    async fn test_get_document() {
        let tool = GetDocumentTool::new(corpus());

        let output = tool
            .invoke(&args(json!({"document_id": "manual"})))
            .await
            .unwrap();
        assert!(output.starts_with("# Pump Manual\n\nPassages: 2, Pages: 4"));
        let wear = output.find("Wear gloves").unwrap();
        let torque = output.find("Torque bolts").unwrap();
        assert!(wear < torque);

        let missing = tool.invoke(&args(json!({"document_id": "nope"}))).await;
        assert!(matches!(missing, Err(ToolError::Failed(msg)) if msg.contains("nope")));
    }
}
