//! Built-in tools offered to the model.

mod documents;

pub use documents::{GetDocumentTool, ListDocumentsTool, SearchDocumentsTool};

use crate::agent::{ToolRegistry, ToolRegistryBuilder};
use crate::config::CorpusSettings;
use crate::corpus::Corpus;
use crate::embedding::Embedder;
use crate::error::Result;
use std::sync::Arc;

/// Register the document tools on `builder`.
pub fn register_document_tools(
    builder: ToolRegistryBuilder,
    corpus: Arc<dyn Corpus>,
    embedder: Arc<dyn Embedder>,
    settings: &CorpusSettings,
) -> ToolRegistryBuilder {
    builder
        .register(
            SearchDocumentsTool::new(corpus.clone(), embedder)
                .with_default_limit(settings.search_limit)
                .with_min_score(settings.min_score),
        )
        .register(ListDocumentsTool::new(corpus.clone()))
        .register(GetDocumentTool::new(corpus))
}

/// Registry holding only the document tools.
pub fn document_registry(
    corpus: Arc<dyn Corpus>,
    embedder: Arc<dyn Embedder>,
    settings: &CorpusSettings,
) -> Result<ToolRegistry> {
    register_document_tools(ToolRegistry::builder(), corpus, embedder, settings).build()
}
