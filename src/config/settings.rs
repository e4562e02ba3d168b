//! Configuration settings for Docent.

use crate::openai::ClientConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub model: ModelSettings,
    pub agent: AgentSettings,
    pub checkpoint: CheckpointSettings,
    pub corpus: CorpusSettings,
    pub embedding: EmbeddingSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level when no `-v` flag is given (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.docent".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Language model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Chat model name.
    pub name: String,
    /// Base URL of an OpenAI-compatible endpoint. Defaults to OpenAI.
    pub api_base: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Timeout for a single model request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            name: "gpt-4o-mini".to_string(),
            api_base: None,
            temperature: None,
            request_timeout_secs: 300,
        }
    }
}

impl ModelSettings {
    /// Client settings for the chat endpoint.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            api_base: self.api_base.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

/// Conversation loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Maximum model calls in one turn.
    pub max_model_calls: usize,
    /// Wall-clock budget for one turn, in seconds. Unbounded when unset.
    pub turn_timeout_secs: Option<u64>,
    /// Timeout for a single tool invocation, in seconds.
    pub tool_timeout_secs: Option<u64>,
    /// Run the tool requests of one model response concurrently.
    pub parallel_tools: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_model_calls: 15,
            turn_timeout_secs: None,
            tool_timeout_secs: Some(60),
            parallel_tools: true,
        }
    }
}

/// Checkpoint store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointSettings {
    /// Checkpoint provider (sqlite, memory).
    pub provider: String,
    /// Path to the SQLite database (for sqlite provider).
    pub sqlite_path: String,
}

impl Default for CheckpointSettings {
    fn default() -> Self {
        Self {
            provider: "sqlite".to_string(),
            sqlite_path: "~/.docent/sessions.db".to_string(),
        }
    }
}

/// Document corpus settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusSettings {
    /// Path to the passage database written by the ingestion pipeline.
    pub sqlite_path: String,
    /// Default number of passages returned by a search.
    pub search_limit: usize,
    /// Minimum similarity score for a passage to be returned.
    pub min_score: f32,
}

impl Default for CorpusSettings {
    fn default() -> Self {
        Self {
            sqlite_path: "~/.docent/corpus.db".to_string(),
            search_limit: 5,
            min_score: 0.3,
        }
    }
}

/// Query embedding settings. Must match the model used at ingestion time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
    /// Base URL of an OpenAI-compatible embedding endpoint.
    pub api_base: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            api_base: None,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::DocentError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docent")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded checkpoint database path.
    pub fn checkpoint_path(&self) -> PathBuf {
        Self::expand_path(&self.checkpoint.sqlite_path)
    }

    /// Get the expanded corpus database path.
    pub fn corpus_path(&self) -> PathBuf {
        Self::expand_path(&self.corpus.sqlite_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [model]
            name = "llama3.1"
            api_base = "http://localhost:11434/v1"

            [agent]
            max_model_calls = 4
            "#,
        )
        .unwrap();

        assert_eq!(settings.model.name, "llama3.1");
        assert_eq!(settings.model.request_timeout_secs, 300);
        assert_eq!(settings.agent.max_model_calls, 4);
        assert!(settings.agent.parallel_tools);
        assert_eq!(settings.checkpoint.provider, "sqlite");
        assert_eq!(settings.corpus.search_limit, 5);
        assert_eq!(settings.general.log_level, "warn");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut settings = Settings::default();
        settings.agent.turn_timeout_secs = Some(90);
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.agent.turn_timeout_secs, Some(90));
        assert_eq!(loaded.embedding.dimensions, 1536);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(settings.model.name, "gpt-4o-mini");
    }
}
