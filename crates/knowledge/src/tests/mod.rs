//! Cross-module scenarios: ingest, answer, clear and the fallback chain.

mod fallback_chain;

use crate::answer::{AnswerGenerator, Candidate, GenerationSettings};
use crate::chunker::Chunker;
use crate::embeddings::providers::TrigramProvider;
use crate::embeddings::Embedder;
use crate::extract::ExtractorRegistry;
use crate::persist::IndexLayout;
use crate::service::QaService;
use docqa_core::{ChunkingConfig, GenerationConfig};
use docqa_llm::{LlmClient, LlmError, LlmRequest, LlmResponse, LlmResult, LlmUsage};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub(crate) const CAPITALS: &str =
    "Paris is the capital of France.\n\nBerlin is the capital of Germany.";

pub(crate) fn small_chunks() -> ChunkingConfig {
    ChunkingConfig {
        chunk_size: 40,
        overlap: 0,
        boundary_tolerance: 100,
    }
}

pub(crate) fn settings() -> GenerationSettings {
    let mut settings = GenerationSettings::from(&GenerationConfig::default());
    settings.attempt_timeout = Duration::from_millis(200);
    settings
}

pub(crate) fn extraction_only() -> AnswerGenerator {
    AnswerGenerator::new(vec![], settings(), docqa_prompt::grounded_answer())
}

pub(crate) fn embedder(dimensions: usize) -> Arc<Embedder> {
    Arc::new(Embedder::new(Arc::new(TrigramProvider::new(dimensions)), 8))
}

pub(crate) fn write_docs(temp: &TempDir, files: &[(&str, &str)]) -> std::path::PathBuf {
    let dir = temp.path().join("documents");
    std::fs::create_dir_all(&dir).unwrap();
    for (name, text) in files {
        std::fs::write(dir.join(name), text).unwrap();
    }
    dir
}

pub(crate) fn service_in(root: &Path, generator: AnswerGenerator, dimensions: usize) -> QaService {
    QaService::new(
        IndexLayout::new(root.join("data")),
        Chunker::new(small_chunks()),
        embedder(dimensions),
        ExtractorRegistry::plain_text_only(),
        generator,
        root.join("documents"),
    )
}

/// Scripted generation backend.
#[derive(Debug, Clone)]
pub(crate) enum Behavior {
    Reply(String),
    Empty,
    Unavailable,
    Crash,
    Hang,
}

#[derive(Debug)]
pub(crate) struct FakeClient {
    behavior: Behavior,
    installed: Option<Vec<String>>,
    pub calls: AtomicUsize,
    pub probes: AtomicUsize,
}

impl FakeClient {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            installed: None,
            calls: AtomicUsize::new(0),
            probes: AtomicUsize::new(0),
        })
    }

    pub fn with_installed(behavior: Behavior, installed: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            installed: Some(installed.iter().map(|m| m.to_string()).collect()),
            calls: AtomicUsize::new(0),
            probes: AtomicUsize::new(0),
        })
    }
}

#[async_trait::async_trait]
impl LlmClient for FakeClient {
    fn provider_name(&self) -> &str {
        "fake"
    }

    async fn complete(&self, request: &LlmRequest) -> LlmResult<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let content = match &self.behavior {
            Behavior::Reply(text) => text.clone(),
            Behavior::Empty => "   \n".to_string(),
            Behavior::Unavailable => {
                return Err(LlmError::Unavailable("connection refused".to_string()))
            }
            Behavior::Crash => return Err(LlmError::Failed("exit status 1".to_string())),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                String::new()
            }
        };
        Ok(LlmResponse {
            content,
            model: request.model.clone(),
            usage: LlmUsage::default(),
            done: true,
        })
    }

    async fn list_models(&self) -> LlmResult<Option<Vec<String>>> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(self.installed.clone())
    }
}

pub(crate) fn model(name: &str, rank: u32, client: Arc<FakeClient>) -> Candidate {
    Candidate::LocalModel {
        name: name.to_string(),
        rank,
        model: name.to_string(),
        client,
    }
}
