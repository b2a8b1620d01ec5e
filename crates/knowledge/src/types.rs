//! Result types shared by the ingestion and answering operations.

use crate::chunker::Chunk;
use crate::embeddings::ModelIdentity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A document that was left out of an ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SkippedDocument {
    pub path: PathBuf,
    /// Error kind, e.g. `unsupported_format`, `extraction_failed`, `empty`
    pub kind: String,
    pub reason: String,
}

/// Outcome of a successful ingestion. Also persisted as `manifest.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionReport {
    pub generation: String,
    pub documents_dir: PathBuf,
    pub documents_ingested: usize,
    pub chunks: usize,
    pub skipped: Vec<SkippedDocument>,
    pub identity: ModelIdentity,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// One retrieved chunk with its relevance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    /// `1 - cosine distance`; higher is more relevant
    pub score: f32,
}

/// Chunks for one query, by descending relevance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunks: Vec<RetrievedChunk>,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn top(&self) -> Option<&RetrievedChunk> {
        self.chunks.first()
    }

    /// Distinct sources in relevance order.
    pub fn sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = Vec::new();
        for retrieved in &self.chunks {
            if !sources.contains(&retrieved.chunk.source) {
                sources.push(retrieved.chunk.source.clone());
            }
        }
        sources
    }
}

/// How an answer was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum AnswerStrategy {
    /// A model candidate generated the text
    Generated { candidate: String, model: String },
    /// Excerpt of the most relevant chunk
    Extracted,
    /// Retrieval found nothing to ground an answer in
    NoContext,
}

/// Record of one candidate attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub candidate: String,
    /// `None` on success, otherwise the failure kind
    pub failure: Option<String>,
    pub detail: Option<String>,
    pub elapsed_ms: u64,
}

/// Answer to one question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub strategy: AnswerStrategy,
    pub sources: Vec<String>,
    pub attempts: Vec<AttemptRecord>,
}

/// Per-call answering options.
#[derive(Debug, Clone, Default)]
pub struct AnswerOptions {
    /// Overrides the configured top-K
    pub top_k: Option<usize>,
    /// Skip model candidates and answer by extraction
    pub extraction_only: bool,
}

/// Summary of the active index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub generation: String,
    pub identity: ModelIdentity,
    pub chunks: usize,
    pub documents: usize,
    pub index_bytes: u64,
    pub store_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub last_report: Option<IngestionReport>,
}
