//! `QaService`: the ingest / answer / clear / stats facade.
//!
//! One service is shared by every caller in a process. Answers run
//! concurrently against immutable snapshots; ingest and clear are serialised
//! by a single mutex.

use crate::answer::AnswerGenerator;
use crate::cache::IndexCache;
use crate::chunker::Chunker;
use crate::embeddings::Embedder;
use crate::error::{AnswerError, IngestError, StoreError};
use crate::extract::ExtractorRegistry;
use crate::ingest::IngestionPipeline;
use crate::persist::IndexLayout;
use crate::progress::ProgressReporter;
use crate::retriever::Retriever;
use crate::types::{Answer, AnswerOptions, IndexStats, IngestionReport};
use docqa_core::{AppConfig, AppResult};
use docqa_prompt::{load_or_default, GROUNDED_ANSWER_ID};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::Instrument;

#[derive(Debug)]
pub struct QaService {
    pipeline: IngestionPipeline,
    retriever: Retriever,
    generator: Arc<AnswerGenerator>,
    cache: Arc<IndexCache>,
    write_lock: Mutex<()>,
    documents_dir: PathBuf,
    top_k: usize,
    request_timeout: Duration,
}

impl QaService {
    /// Wire up every component from configuration.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let qa = &config.qa;
        let embedder = Arc::new(Embedder::from_settings(
            &qa.embedding,
            &qa.generation.endpoint,
        )?);
        let prompt = load_or_default(&config.prompts_dir(), GROUNDED_ANSWER_ID)?;
        let generator = AnswerGenerator::from_config(&qa.generation, prompt)?;

        let service = Self::new(
            IndexLayout::new(config.data_dir()),
            Chunker::new(qa.chunking.clone()),
            embedder,
            ExtractorRegistry::from_config(&qa.extractors),
            generator,
            config.documents_dir.clone(),
        )
        .with_top_k(qa.retrieval.top_k)
        .with_min_score(qa.retrieval.min_score)
        .with_request_timeout(Duration::from_secs(qa.generation.request_timeout_secs));

        tracing::debug!(
            data_dir = %config.data_dir().display(),
            embedding = %service.retriever.embedder().identity(),
            candidates = service.generator.candidates().len(),
            "Initialized QA service"
        );
        Ok(service)
    }

    pub fn new(
        layout: IndexLayout,
        chunker: Chunker,
        embedder: Arc<Embedder>,
        extractors: ExtractorRegistry,
        generator: AnswerGenerator,
        documents_dir: PathBuf,
    ) -> Self {
        let cache = Arc::new(IndexCache::new(layout.clone()));
        Self {
            pipeline: IngestionPipeline::new(chunker, embedder.clone(), extractors, layout),
            retriever: Retriever::new(embedder, cache.clone()),
            generator: Arc::new(generator),
            cache,
            write_lock: Mutex::new(()),
            documents_dir,
            top_k: 5,
            request_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_min_score(mut self, min_score: Option<f32>) -> Self {
        self.retriever = self.retriever.with_min_score(min_score);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn documents_dir(&self) -> &Path {
        &self.documents_dir
    }

    pub fn cache(&self) -> &Arc<IndexCache> {
        &self.cache
    }

    /// Ingest the configured documents directory.
    pub async fn ingest(&self, progress: &ProgressReporter) -> Result<IngestionReport, IngestError> {
        self.ingest_dir(&self.documents_dir, progress).await
    }

    /// Ingest `dir`, replacing the active index on success.
    ///
    /// Rejected with `InProgress` while another ingest or clear holds the lock.
    pub async fn ingest_dir(
        &self,
        dir: &Path,
        progress: &ProgressReporter,
    ) -> Result<IngestionReport, IngestError> {
        let _guard = self.write_lock.try_lock().map_err(|_| IngestError::InProgress)?;
        let result = self.pipeline.run(dir, progress).await;
        if result.is_ok() {
            self.cache.invalidate().await;
        }
        result
    }

    pub async fn answer(&self, question: &str) -> Result<Answer, AnswerError> {
        self.answer_with(question, AnswerOptions::default()).await
    }

    /// Retrieve and answer within the request deadline.
    pub async fn answer_with(
        &self,
        question: &str,
        options: AnswerOptions,
    ) -> Result<Answer, AnswerError> {
        let deadline = Instant::now() + self.request_timeout;
        let k = options.top_k.unwrap_or(self.top_k);
        let span = tracing::info_span!("answer", k, extraction_only = options.extraction_only);

        let work = async {
            let retrieval = self.retriever.retrieve(question, k).await?;
            Ok(self
                .generator
                .answer(question, &retrieval, deadline, !options.extraction_only)
                .await)
        };

        match tokio::time::timeout_at(deadline, work.instrument(span)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Answer exceeded the {:?} request deadline", self.request_timeout);
                Err(AnswerError::Timeout(self.request_timeout))
            }
        }
    }

    /// Remove every persisted generation. Subsequent answers fail with
    /// `NoIndexAvailable` until the next successful ingest.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let layout = self.cache.layout().clone();
        let result = tokio::task::spawn_blocking(move || layout.clear())
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e.to_string())))
            .and_then(|result| result);
        self.cache.invalidate().await;
        result
    }

    /// Statistics for the active generation, or `None` before the first ingest.
    pub async fn stats(&self) -> Result<Option<IndexStats>, StoreError> {
        let snapshot = match self.cache.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(StoreError::IndexNotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let layout = self.cache.layout().clone();
        let id = snapshot.generation.clone();
        let (index_bytes, store_bytes, last_report) = tokio::task::spawn_blocking(move || {
            let generation = layout.generation(&id);
            let size = |path: PathBuf| std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
            (
                size(generation.index_path()),
                size(generation.store_path()),
                layout.manifest(&id),
            )
        })
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(e.to_string())))?;

        Ok(Some(IndexStats {
            generation: snapshot.generation.clone(),
            identity: snapshot.identity.clone(),
            chunks: snapshot.store.len(),
            documents: snapshot.store.sources().len(),
            index_bytes,
            store_bytes,
            created_at: snapshot.store.created_at(),
            last_report,
        }))
    }
}
