//! Embedding provider trait and factory.

use crate::error::EmbedError;
use docqa_core::EmbeddingSettings;
use std::sync::Arc;

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "trigram", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| EmbedError::EmbeddingFailed("No embedding returned".to_string()))
    }
}

/// Create an embedding provider based on configuration.
///
/// `default_endpoint` is used by HTTP providers when the settings do not
/// name their own endpoint.
pub fn create_provider(
    settings: &EmbeddingSettings,
    default_endpoint: &str,
) -> Result<Arc<dyn EmbeddingProvider>, EmbedError> {
    match settings.provider.to_lowercase().as_str() {
        "trigram" => {
            let provider = super::providers::TrigramProvider::new(settings.dimensions);
            Ok(Arc::new(provider))
        }

        "ollama" => {
            let endpoint = settings.endpoint.as_deref().unwrap_or(default_endpoint);
            let provider = super::providers::OllamaProvider::new(
                endpoint,
                &settings.model,
                settings.dimensions,
            )?;
            Ok(Arc::new(provider))
        }

        _ => Err(EmbedError::ModelUnavailable {
            model: settings.model.clone(),
            reason: format!(
                "Unknown embedding provider: '{}'. Supported providers: trigram, ollama",
                settings.provider
            ),
        }),
    }
}
