//! Document question answering over a local vector index.
//!
//! Documents are extracted, chunked and embedded into an immutable index
//! generation. Questions are embedded, matched against the active generation
//! and answered by a ranked chain of local models that always ends in a
//! plain excerpt of the best match.
//!
//! [`QaService`] is the entry point used by the CLI.

pub mod answer;
pub mod cache;
pub mod chunker;
pub mod document;
pub mod embeddings;
pub mod error;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod persist;
pub mod progress;
pub mod retriever;
pub mod service;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use answer::{AnswerGenerator, Candidate, GenerationSettings, NO_RELEVANT_CONTENT};
pub use cache::IndexCache;
pub use chunker::{Chunk, Chunker};
pub use embeddings::{Embedder, EmbeddingProvider, ModelIdentity};
pub use error::{
    AnswerError, EmbedError, ExtractError, GenerationError, IngestError, StoreError,
};
pub use extract::{ExtractorRegistry, TextExtractor};
pub use index::{FlatIndex, Neighbor};
pub use ingest::IngestionPipeline;
pub use persist::{IndexLayout, IndexSnapshot};
pub use progress::{Phase, ProgressEvent, ProgressReporter};
pub use retriever::Retriever;
pub use service::QaService;
pub use store::ChunkStore;
pub use types::{
    Answer, AnswerOptions, AnswerStrategy, AttemptRecord, IndexStats, IngestionReport,
    RetrievalResult, RetrievedChunk, SkippedDocument,
};
