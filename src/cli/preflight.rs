//! Pre-flight checks before expensive operations.
//!
//! Validates that required configuration and data are available
//! before starting operations that would otherwise fail midway.

use crate::config::Settings;
use crate::error::{DocentError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Conversations need model access and the corpus.
    Converse,
    /// Browsing documents only needs the corpus.
    Browse,
    /// Session inspection has no external requirements.
    Sessions,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Converse => {
            if needs_api_key(settings) {
                check_api_key()?;
            }
            check_corpus(settings)?;
        }
        Operation::Browse => {
            check_corpus(settings)?;
        }
        Operation::Sessions => {}
    }
    Ok(())
}

/// An API key is only required when some endpoint is OpenAI itself.
fn needs_api_key(settings: &Settings) -> bool {
    settings.model.api_base.is_none() || settings.embedding.api_base.is_none()
}

/// Check if OpenAI API key is configured.
fn check_api_key() -> Result<()> {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(()),
        Ok(_) => Err(DocentError::Config(
            "OPENAI_API_KEY is empty. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
        Err(_) => Err(DocentError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
    }
}

/// Check that the ingestion pipeline has produced a passage database.
fn check_corpus(settings: &Settings) -> Result<()> {
    let path = settings.corpus_path();
    if path.exists() {
        Ok(())
    } else {
        Err(DocentError::Corpus(format!(
            "No passage database at {}. Ingest documents first, or set corpus.sqlite_path.",
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sessions_no_requirements() {
        assert!(check(Operation::Sessions, &Settings::default()).is_ok());
    }

    #[test]
    fn test_browse_requires_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.corpus.sqlite_path = dir.path().join("missing.db").to_string_lossy().to_string();
        assert!(matches!(
            check(Operation::Browse, &settings),
            Err(DocentError::Corpus(_))
        ));

        let db = dir.path().join("corpus.db");
        std::fs::write(&db, b"").unwrap();
        settings.corpus.sqlite_path = db.to_string_lossy().to_string();
        assert!(check(Operation::Browse, &settings).is_ok());
    }

    #[test]
    fn test_local_endpoints_skip_api_key() {
        let mut settings = Settings::default();
        assert!(needs_api_key(&settings));

        settings.model.api_base = Some("http://localhost:11434/v1".to_string());
        assert!(needs_api_key(&settings));

        settings.embedding.api_base = Some("http://localhost:11434/v1".to_string());
        assert!(!needs_api_key(&settings));
    }
}
