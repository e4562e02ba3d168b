//! Documents command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::corpus::{Corpus, SqliteCorpus};
use anyhow::Result;

/// Run the documents command.
pub async fn run_documents(settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Browse, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let corpus = SqliteCorpus::open(&settings.corpus_path())?;
    let documents = corpus.list_documents().await?;

    if documents.is_empty() {
        Output::info("No documents ingested yet.");
        return Ok(());
    }

    Output::header(&format!("Documents ({})", documents.len()));
    println!();

    for document in &documents {
        Output::document_info(document);
    }

    let total_passages: u32 = documents.iter().map(|d| d.passage_count).sum();
    println!();
    Output::kv("Total documents", &documents.len().to_string());
    Output::kv("Total passages", &total_passages.to_string());

    Ok(())
}
