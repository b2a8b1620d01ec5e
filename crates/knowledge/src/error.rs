//! Typed errors for ingestion, persistence, retrieval and answering.
//!
//! Each boundary has its own enum. Everything converts into
//! `AppError::Knowledge` for the CLI, and every error exposes a stable
//! `kind()` string the outer layer maps to a user-facing status.

use docqa_core::AppError;
use docqa_llm::LlmError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Text extraction failures for a single document.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Unsupported document format: {0:?}")]
    UnsupportedFormat(PathBuf),

    #[error("Failed to extract text from {path:?}: {reason}")]
    ExtractionFailed { path: PathBuf, reason: String },
}

impl ExtractError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::ExtractionFailed { .. } => "extraction_failed",
        }
    }
}

/// Embedding failures.
#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("Embedding model '{model}' unavailable: {reason}")]
    ModelUnavailable { model: String, reason: String },

    #[error("Embedding failed: {0}")]
    EmbeddingFailed(String),

    #[error("Embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Failures of the persisted VectorIndex + ChunkStore pair.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No index found at {0:?}")]
    IndexNotFound(PathBuf),

    #[error("Index at {path:?} is corrupt: {reason}")]
    IndexCorrupt { path: PathBuf, reason: String },

    #[error("Invalid index input: {0}")]
    InvalidIndexInput(String),

    #[error("Index was built with embedding model {indexed}, but {configured} is configured")]
    ModelMismatch { indexed: String, configured: String },

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::IndexCorrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::IndexNotFound(_) => "no_index",
            Self::IndexCorrupt { .. } => "index_corrupt",
            Self::InvalidIndexInput(_) => "invalid_index_input",
            Self::ModelMismatch { .. } => "index_stale",
            Self::Io(_) => "storage",
        }
    }
}

/// Failure of one generation candidate. Recovered inside the answer chain.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("generation timed out after {0:?}")]
    GenerationTimeout(Duration),

    #[error("backend failed: {0}")]
    ProcessFailed(String),

    #[error("malformed output: {0}")]
    MalformedOutput(String),

    #[error("request deadline exhausted before this candidate could run")]
    DeadlineExhausted,

    /// Every model candidate failed; the chain continues with extraction.
    #[error("all {attempts} generation backends exhausted")]
    AllBackendsExhausted { attempts: usize },
}

impl GenerationError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ModelUnavailable(_) => "model_unavailable",
            Self::GenerationTimeout(_) => "generation_timeout",
            Self::ProcessFailed(_) => "process_failed",
            Self::MalformedOutput(_) => "malformed_output",
            Self::DeadlineExhausted => "deadline_exhausted",
            Self::AllBackendsExhausted { .. } => "all_backends_exhausted",
        }
    }
}

impl From<LlmError> for GenerationError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Unavailable(msg) | LlmError::InvalidConfig(msg) => {
                Self::ModelUnavailable(msg)
            }
            LlmError::Timeout(d) => Self::GenerationTimeout(d),
            LlmError::Malformed(msg) => Self::MalformedOutput(msg),
            LlmError::Failed(msg) => Self::ProcessFailed(msg),
        }
    }
}

/// Errors surfaced by `ingest`.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("No documents found in {0:?}")]
    NoDocumentsFound(PathBuf),

    #[error("No document produced any text ({skipped} skipped)")]
    NoChunksProduced { skipped: usize },

    #[error("Another ingestion is already running")]
    InProgress,

    #[error(transparent)]
    Embedding(#[from] EmbedError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O error during ingestion: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoDocumentsFound(_) => "no_documents",
            Self::NoChunksProduced { .. } => "extraction_failed",
            Self::InProgress => "in_progress",
            Self::Embedding(_) => "embedding_failed",
            Self::Store(e) => e.kind(),
            Self::Io(_) => "storage",
        }
    }
}

/// Errors surfaced by `answer`.
#[derive(Error, Debug)]
pub enum AnswerError {
    #[error("No documents have been ingested yet")]
    NoIndexAvailable,

    #[error("The document index is corrupt: {0}")]
    IndexCorrupt(String),

    #[error("The index was built with embedding model {indexed}, but {configured} is configured; re-ingest the documents")]
    IndexStale { indexed: String, configured: String },

    #[error("Failed to embed the question: {0}")]
    EmbeddingFailed(#[from] EmbedError),

    #[error("top-k must be greater than 0, got {0}")]
    InvalidTopK(usize),

    #[error("The question is empty")]
    EmptyQuestion,

    #[error("Answering timed out after {0:?}")]
    Timeout(Duration),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl AnswerError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoIndexAvailable => "no_index",
            Self::IndexCorrupt(_) => "index_corrupt",
            Self::IndexStale { .. } => "index_stale",
            Self::EmbeddingFailed(_) => "embedding_failed",
            Self::InvalidTopK(_) | Self::EmptyQuestion => "invalid_input",
            Self::Timeout(_) => "timeout",
            Self::Storage(_) => "storage",
        }
    }
}

impl From<StoreError> for AnswerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::IndexNotFound(_) => Self::NoIndexAvailable,
            StoreError::ModelMismatch {
                indexed,
                configured,
            } => Self::IndexStale {
                indexed,
                configured,
            },
            e @ (StoreError::IndexCorrupt { .. } | StoreError::InvalidIndexInput(_)) => {
                Self::IndexCorrupt(e.to_string())
            }
            StoreError::Io(e) => Self::Storage(e.to_string()),
        }
    }
}

macro_rules! into_app_error {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for AppError {
                fn from(err: $ty) -> Self {
                    AppError::Knowledge(err.to_string())
                }
            }
        )*
    };
}

into_app_error!(ExtractError, EmbedError, StoreError, IngestError, AnswerError);
