//! Embedding engine.
//!
//! `Embedder` wraps a provider with batching and dimension checks. Its
//! `ModelIdentity` is recorded with every persisted index so that a query
//! is never embedded with a different model than the one that built it.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};

use crate::error::EmbedError;
use docqa_core::EmbeddingSettings;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Provider, model and dimensionality of an embedding space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelIdentity {
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
}

impl fmt::Display for ModelIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({} dims)", self.provider, self.model, self.dimensions)
    }
}

/// Maps text to fixed-dimension vectors.
#[derive(Debug, Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl Embedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, batch_size: usize) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
        }
    }

    /// Build from settings; HTTP providers fall back to `default_endpoint`.
    pub fn from_settings(
        settings: &EmbeddingSettings,
        default_endpoint: &str,
    ) -> Result<Self, EmbedError> {
        let provider = create_provider(settings, default_endpoint)?;
        Ok(Self::new(provider, settings.batch_size))
    }

    pub fn identity(&self) -> ModelIdentity {
        ModelIdentity {
            provider: self.provider.provider_name().to_string(),
            model: self.provider.model_name().to_string(),
            dimensions: self.provider.dimensions(),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    /// Embed one text.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let vector = self.provider.embed(text).await?;
        self.check_dimensions(&vector)?;
        Ok(vector)
    }

    /// Embed many texts in provider batches. Output is element-wise equal to `embed`.
    pub async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        tracing::info!(
            "Embedding {} texts using provider '{}' (model: {})",
            texts.len(),
            self.provider.provider_name(),
            self.provider.model_name()
        );

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let embedded = self.provider.embed_batch(batch).await?;
            if embedded.len() != batch.len() {
                return Err(EmbedError::EmbeddingFailed(format!(
                    "provider returned {} embeddings for {} texts",
                    embedded.len(),
                    batch.len()
                )));
            }
            for vector in &embedded {
                self.check_dimensions(vector)?;
            }
            vectors.extend(embedded);
        }

        tracing::debug!(
            "Generated {} embeddings of dimension {}",
            vectors.len(),
            self.dimensions()
        );

        Ok(vectors)
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<(), EmbedError> {
        if vector.len() != self.dimensions() {
            return Err(EmbedError::DimensionMismatch {
                expected: self.dimensions(),
                actual: vector.len(),
            });
        }
        Ok(())
    }
}
