//! Question → top-K chunks.

use crate::cache::IndexCache;
use crate::embeddings::Embedder;
use crate::error::{AnswerError, StoreError};
use crate::types::{RetrievalResult, RetrievedChunk};
use std::sync::Arc;

/// Embeds questions and searches the cached index snapshot.
#[derive(Debug, Clone)]
pub struct Retriever {
    embedder: Arc<Embedder>,
    cache: Arc<IndexCache>,
    min_score: Option<f32>,
}

impl Retriever {
    pub fn new(embedder: Arc<Embedder>, cache: Arc<IndexCache>) -> Self {
        Self {
            embedder,
            cache,
            min_score: None,
        }
    }

    pub fn embedder(&self) -> &Arc<Embedder> {
        &self.embedder
    }

    /// Drop hits whose relevance score is below `min_score`.
    pub fn with_min_score(mut self, min_score: Option<f32>) -> Self {
        self.min_score = min_score;
        self
    }

    /// Retrieve up to `k` chunks for `question`, most relevant first.
    ///
    /// Fails with `NoIndexAvailable` before anything is ingested. An index
    /// that was built but holds no chunks yields an empty result.
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<RetrievalResult, AnswerError> {
        if k == 0 {
            return Err(AnswerError::InvalidTopK(k));
        }
        if question.trim().is_empty() {
            return Err(AnswerError::EmptyQuestion);
        }

        let snapshot = self.cache.snapshot().await?;

        let configured = self.embedder.identity();
        if snapshot.identity != configured {
            return Err(StoreError::ModelMismatch {
                indexed: snapshot.identity.to_string(),
                configured: configured.to_string(),
            }
            .into());
        }

        if snapshot.index.is_empty() {
            return Ok(RetrievalResult::default());
        }

        let query = self.embedder.embed(question).await?;
        let neighbors = snapshot.index.search(&query, k)?;

        let mut chunks = Vec::with_capacity(neighbors.len());
        for neighbor in neighbors {
            let score = neighbor.score();
            if self.min_score.is_some_and(|min| score < min) {
                continue;
            }
            let chunk = snapshot.store.get(neighbor.id).ok_or_else(|| {
                AnswerError::IndexCorrupt(format!("chunk {} missing from store", neighbor.id))
            })?;
            chunks.push(RetrievedChunk {
                chunk: chunk.clone(),
                score,
            });
        }

        tracing::debug!(
            generation = %snapshot.generation,
            hits = chunks.len(),
            top_score = chunks.first().map(|c| c.score),
            "Retrieved chunks"
        );

        Ok(RetrievalResult { chunks })
    }
}
