//! OpenAI embeddings implementation.

use super::Embedder;
use crate::config::EmbeddingSettings;
use crate::error::{DocentError, Result};
use crate::openai::{create_client_with_config, ClientConfig};
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// OpenAI-based embedder.
pub struct OpenAIEmbedder {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbedder {
    /// Create an embedder with custom model and dimensions.
    pub fn with_config(config: &ClientConfig, model: &str, dimensions: usize) -> Result<Self> {
        Ok(Self {
            client: create_client_with_config(config)?,
            model: model.to_string(),
            dimensions,
        })
    }

    /// Create an embedder from the embedding settings.
    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self> {
        let config = ClientConfig {
            api_base: settings.api_base.clone(),
            ..ClientConfig::default()
        };
        Self::with_config(&config, &settings.model, settings.dimensions as usize)
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    #[instrument(skip(self, text), fields(chars = text.len()))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::String(text.to_string()))
            .dimensions(self.dimensions as u32)
            .build()
            .map_err(|e| DocentError::Embedding(format!("Failed to build request: {}", e)))?;

        let response = self.client.embeddings().create(request).await.map_err(|e| {
            DocentError::OpenAI(format!("Embedding API error: {}", e))
        })?;

        let embedding = response
            .data
            .into_iter()
            .min_by_key(|e| e.index)
            .map(|e| e.embedding)
            .ok_or_else(|| DocentError::Embedding("Empty embedding response".to_string()))?;

        debug!("Generated embedding with {} dimensions", embedding.len());
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedder_creation() {
        let embedder = OpenAIEmbedder::from_settings(&EmbeddingSettings::default()).unwrap();
        assert_eq!(embedder.dimensions(), 1536);

        let embedder =
            OpenAIEmbedder::with_config(&ClientConfig::default(), "text-embedding-3-large", 3072)
                .unwrap();
        assert_eq!(embedder.dimensions(), 3072);
    }
}
