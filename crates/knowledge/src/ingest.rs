//! Ingestion: documents directory in, committed index generation out.
//!
//! Each run rebuilds the whole index from every readable document. The new
//! generation becomes visible only when it is committed, so readers keep
//! answering from the previous generation until then.

use crate::chunker::{Chunk, Chunker};
use crate::document::{Document, DocumentFormat};
use crate::embeddings::Embedder;
use crate::error::IngestError;
use crate::extract::ExtractorRegistry;
use crate::index::FlatIndex;
use crate::persist::IndexLayout;
use crate::progress::ProgressReporter;
use crate::store::ChunkStore;
use crate::types::{IngestionReport, SkippedDocument};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use walkdir::WalkDir;

pub struct IngestionPipeline {
    chunker: Chunker,
    embedder: Arc<Embedder>,
    extractors: ExtractorRegistry,
    layout: IndexLayout,
}

impl std::fmt::Debug for IngestionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionPipeline")
            .field("chunker", &self.chunker)
            .field("embedder", &self.embedder)
            .field("layout", &self.layout)
            .finish()
    }
}

impl IngestionPipeline {
    pub fn new(
        chunker: Chunker,
        embedder: Arc<Embedder>,
        extractors: ExtractorRegistry,
        layout: IndexLayout,
    ) -> Self {
        Self {
            chunker,
            embedder,
            extractors,
            layout,
        }
    }

    /// Ingest every document under `dir` and commit a new generation.
    ///
    /// Documents that cannot be read are skipped and listed in the report.
    /// The run fails only when nothing was found, nothing produced text, or
    /// embedding or persistence failed. On failure the active generation is
    /// left untouched.
    pub async fn run(
        &self,
        dir: &Path,
        progress: &ProgressReporter,
    ) -> Result<IngestionReport, IngestError> {
        let started_at = Utc::now();
        let start = Instant::now();
        tracing::info!(dir = %dir.display(), "Starting ingestion");

        let files = discover(dir)?;
        progress.discover(files.len() as u64, &dir.display().to_string());

        let total = files.len() as u64;
        let mut skipped = Vec::new();
        let mut chunks: Vec<Chunk> = Vec::new();
        let mut ingested = 0usize;

        for (i, path) in files.iter().enumerate() {
            let source = source_name(dir, path);
            progress.extract(i as u64 + 1, total, &source);

            match self.read_document(path, &source).await {
                Ok(text) => {
                    let produced = self.chunker.chunk(&source, &text, chunks.len() as u64);
                    if produced.is_empty() {
                        skipped.push(skip(path, "empty", "document contains no text"));
                        continue;
                    }
                    tracing::debug!(source = %source, chunks = produced.len(), "Chunked document");
                    chunks.extend(produced);
                    ingested += 1;
                    progress.chunk(i as u64 + 1, total, chunks.len());
                }
                Err(skipped_doc) => {
                    tracing::warn!(
                        path = %path.display(),
                        kind = %skipped_doc.kind,
                        "Skipping document: {}",
                        skipped_doc.reason
                    );
                    skipped.push(skipped_doc);
                }
            }
        }

        if chunks.is_empty() {
            return Err(IngestError::NoChunksProduced {
                skipped: skipped.len(),
            });
        }

        let identity = self.embedder.identity();
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        progress.embed(0, texts.len() as u64, &identity.model);
        let vectors = self.embedder.embed_many(&texts).await?;
        progress.embed(vectors.len() as u64, texts.len() as u64, &identity.model);

        let ids: Vec<u64> = chunks.iter().map(|c| c.id).collect();
        let index = FlatIndex::build(identity.dimensions, ids, vectors)?;
        let store = ChunkStore::new(identity.clone(), chunks)?;

        let generation = self.layout.stage()?;
        let report = IngestionReport {
            generation: generation.id.clone(),
            documents_dir: dir.to_path_buf(),
            documents_ingested: ingested,
            chunks: store.len(),
            skipped,
            identity: identity.clone(),
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        progress.index(store.len() as u64, &generation.id);

        let layout = self.layout.clone();
        let staged = generation.clone();
        let manifest = report.clone();
        let persisted: Result<(), IngestError> = match tokio::task::spawn_blocking(move || {
            layout.write(&staged, &identity, &index, &store, &manifest)?;
            layout.commit(&staged)
        })
        .await
        {
            Ok(result) => result.map_err(IngestError::from),
            Err(e) => Err(std::io::Error::other(e.to_string()).into()),
        };

        if let Err(e) = persisted {
            self.layout.discard(&generation);
            return Err(e);
        }

        tracing::info!(
            generation = %report.generation,
            documents = report.documents_ingested,
            chunks = report.chunks,
            skipped = report.skipped.len(),
            "Ingestion completed in {:.2}s",
            start.elapsed().as_secs_f64()
        );
        Ok(report)
    }

    async fn read_document(&self, path: &Path, source: &str) -> Result<String, SkippedDocument> {
        let Some(format) = DocumentFormat::from_path(path) else {
            return Err(skip(path, "unsupported_format", "unrecognised file extension"));
        };
        if !self.extractors.supports(format) {
            return Err(skip(
                path,
                "unsupported_format",
                &format!("no extractor configured for {}", format.as_str()),
            ));
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| skip(path, "io", &e.to_string()))?;
        let document = Document::new(path.to_path_buf(), source.to_string(), format, bytes);

        let text = self
            .extractors
            .extract(&document)
            .await
            .map_err(|e| skip(path, e.kind(), &e.to_string()))?;
        if text.trim().is_empty() {
            return Err(skip(path, "empty", "document contains no text"));
        }
        Ok(text)
    }
}

fn skip(path: &Path, kind: &str, reason: &str) -> SkippedDocument {
    SkippedDocument {
        path: path.to_path_buf(),
        kind: kind.to_string(),
        reason: reason.to_string(),
    }
}

/// Regular, non-hidden files under `dir` in a stable order.
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
    if !dir.is_dir() {
        return Err(IngestError::NoDocumentsFound(dir.to_path_buf()));
    }

    let files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Failed to read directory entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();

    if files.is_empty() {
        return Err(IngestError::NoDocumentsFound(dir.to_path_buf()));
    }
    Ok(files)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Path relative to the documents directory, `/`-separated.
fn source_name(dir: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(dir).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
