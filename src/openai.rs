//! OpenAI client configuration with sensible defaults.

use crate::error::{DocentError, Result};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for OpenAI API requests (5 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL override, e.g. a local OpenAI-compatible server.
    pub api_base: Option<String>,
    /// Request timeout.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Create an OpenAI client for the given endpoint settings.
///
/// The API key is read from `OPENAI_API_KEY`.
pub fn create_client_with_config(config: &ClientConfig) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| DocentError::Config(format!("Failed to create HTTP client: {}", e)))?;

    let mut openai_config = OpenAIConfig::default();
    if let Some(base) = config.api_base.as_deref().filter(|b| !b.is_empty()) {
        openai_config = openai_config.with_api_base(base);
    }

    Ok(Client::with_config(openai_config).with_http_client(http_client))
}
