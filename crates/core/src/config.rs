//! Configuration management for DocQA.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config file (`.docqa/config.yaml`)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric: persisted state lives under `.docqa/`.
//! Chunk size, overlap, top-K and the model list are product tuning parameters;
//! the defaults below are sensible starting points, not measured optima.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{AppError, AppResult};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .docqa/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Directory holding the raw documents to ingest
    pub documents_dir: PathBuf,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Ingestion and answering settings
    pub qa: QaConfig,
}

/// Settings for the ingestion + question answering core.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QaConfig {
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingSettings,
    pub retrieval: RetrievalConfig,
    pub generation: GenerationConfig,
    pub extractors: ExtractionConfig,
}

/// Chunker parameters, in characters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
    /// How far before the hard cut a paragraph/sentence boundary may be used
    pub boundary_tolerance: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
            boundary_tolerance: 100,
        }
    }
}

/// Embedding model selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbeddingSettings {
    /// Provider name: "trigram" (offline) or "ollama"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Endpoint for HTTP providers (defaults to the generation endpoint)
    pub endpoint: Option<String>,

    /// Maximum texts per embedding batch
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            endpoint: None,
            batch_size: 32,
        }
    }
}

/// Retrieval parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RetrievalConfig {
    /// Number of chunks retrieved per question
    pub top_k: usize,

    /// Optional minimum relevance score (1 - cosine distance); None keeps every hit
    pub min_score: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_score: None,
        }
    }
}

/// Answer generation settings: the model candidate chain and its budgets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationConfig {
    /// When false only the extraction fallback answers
    pub enabled: bool,

    /// Local LLM runtime endpoint (Ollama)
    pub endpoint: String,

    /// Generation candidates, tried in ascending rank (then listed) order
    pub candidates: Vec<CandidateConfig>,

    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,

    /// Upper bound for a single candidate attempt
    pub attempt_timeout_secs: u64,

    /// End-to-end deadline for one answer request
    pub request_timeout_secs: u64,

    /// Maximum characters of retrieved context given to a model
    pub max_context_chars: usize,

    /// Maximum characters of an extraction-fallback answer
    pub max_answer_chars: usize,

    /// Prefix extraction answers with a note that they are verbatim excerpts
    pub extraction_disclaimer: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://localhost:11434".to_string(),
            candidates: vec![
                CandidateConfig::ollama("llama3.2:1b"),
                CandidateConfig::ollama("mistral:7b"),
                CandidateConfig::ollama("mistral:latest"),
            ],
            temperature: 0.2,
            top_p: 0.8,
            max_tokens: 800,
            attempt_timeout_secs: 45,
            request_timeout_secs: 120,
            max_context_chars: 4000,
            max_answer_chars: 600,
            extraction_disclaimer: true,
        }
    }
}

/// A configured generation backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CandidateConfig {
    /// A model served by the local Ollama runtime
    Ollama {
        name: String,
        #[serde(default)]
        rank: Option<u32>,
        /// Model tag to request; defaults to `name`
        #[serde(default)]
        model: Option<String>,
    },

    /// A generator program spawned once per attempt.
    ///
    /// The prompt is substituted for a `{prompt}` argument, or written to
    /// stdin when no argument contains the placeholder.
    Command {
        name: String,
        #[serde(default)]
        rank: Option<u32>,
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl CandidateConfig {
    /// Ollama candidate whose model tag equals its name.
    pub fn ollama(name: impl Into<String>) -> Self {
        Self::Ollama {
            name: name.into(),
            rank: None,
            model: None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Ollama { name, .. } | Self::Command { name, .. } => name,
        }
    }

    pub fn rank(&self) -> Option<u32> {
        match self {
            Self::Ollama { rank, .. } | Self::Command { rank, .. } => *rank,
        }
    }
}

/// External commands used to turn non-text formats into plain text.
///
/// `{path}` in an argument is replaced by the document path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractionConfig {
    pub pdf: Vec<String>,
    pub doc: Vec<String>,
    pub docx: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            pdf: vec![
                "pdftotext".to_string(),
                "-layout".to_string(),
                "{path}".to_string(),
                "-".to_string(),
            ],
            doc: vec!["antiword".to_string(), "{path}".to_string()],
            docx: vec![
                "pandoc".to_string(),
                "-t".to_string(),
                "plain".to_string(),
                "{path}".to_string(),
            ],
        }
    }
}

impl QaConfig {
    /// Validate tuning parameters that would make the pipeline misbehave.
    pub fn validate(&self) -> AppResult<()> {
        let chunking = &self.chunking;
        if chunking.chunk_size == 0 {
            return Err(AppError::Config("chunkSize must be greater than 0".to_string()));
        }
        if chunking.overlap >= chunking.chunk_size {
            return Err(AppError::Config(format!(
                "overlap ({}) must be smaller than chunkSize ({})",
                chunking.overlap, chunking.chunk_size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(AppError::Config("topK must be greater than 0".to_string()));
        }
        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "embedding dimensions must be greater than 0".to_string(),
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err(AppError::Config(
                "embedding batchSize must be greater than 0".to_string(),
            ));
        }
        if self.generation.request_timeout_secs == 0 {
            return Err(AppError::Config(
                "requestTimeoutSecs must be greater than 0".to_string(),
            ));
        }
        for candidate in &self.generation.candidates {
            if candidate.name().trim().is_empty() {
                return Err(AppError::Config(
                    "generation candidate name cannot be empty".to_string(),
                ));
            }
            if let CandidateConfig::Command { program, .. } = candidate {
                if program.trim().is_empty() {
                    return Err(AppError::Config(format!(
                        "candidate '{}' has an empty program",
                        candidate.name()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    documents: Option<DocumentsConfig>,
    logging: Option<LoggingConfig>,
    qa: Option<QaConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DocumentsConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let workspace = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            documents_dir: workspace.join("documents"),
            workspace,
            config_file: None,
            log_level: None,
            verbose: false,
            no_color: false,
            qa: QaConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the config file and environment variables.
    ///
    /// Environment variables:
    /// - `DOCQA_WORKSPACE`: Override workspace path
    /// - `DOCQA_CONFIG`: Path to config file
    /// - `DOCQA_DOCUMENTS_DIR`: Directory of documents to ingest
    /// - `DOCQA_USE_OLLAMA`: Enable model generation (`true`/`false`)
    /// - `DOCQA_OLLAMA_URL`: Local LLM runtime endpoint
    /// - `DOCQA_TOP_K`, `DOCQA_CHUNK_SIZE`, `DOCQA_CHUNK_OVERLAP`
    /// - `DOCQA_MAX_ANSWER_LENGTH`, `DOCQA_OLLAMA_TEMPERATURE`, `DOCQA_OLLAMA_TOP_P`,
    ///   `DOCQA_OLLAMA_MAX_TOKENS`, `DOCQA_OLLAMA_TIMEOUT`, `DOCQA_REQUEST_TIMEOUT`
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use docqa_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_with(None, None)
    }

    /// Load configuration with an explicit workspace and/or config file.
    ///
    /// Explicit arguments take precedence over `DOCQA_WORKSPACE`/`DOCQA_CONFIG`.
    pub fn load_with(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) =
            workspace.or_else(|| std::env::var("DOCQA_WORKSPACE").ok().map(PathBuf::from))
        {
            config.documents_dir = workspace.join("documents");
            config.workspace = workspace;
        }

        config.config_file =
            config_file.or_else(|| std::env::var("DOCQA_CONFIG").ok().map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.docqa_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file does not exist: {:?}",
                config_path
            )));
        }

        config.apply_env()?;
        config.qa.validate()?;

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(docs) = config_file.documents {
            if let Some(path) = docs.path {
                let path = PathBuf::from(path);
                result.documents_dir = if path.is_relative() {
                    result.workspace.join(path)
                } else {
                    path
                };
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(qa) = config_file.qa {
            result.qa = qa;
        }

        tracing::debug!("Merged config file {:?}", path);
        Ok(result)
    }

    /// Environment variables override the config file.
    fn apply_env(&mut self) -> AppResult<()> {
        if let Ok(dir) = std::env::var("DOCQA_DOCUMENTS_DIR") {
            self.documents_dir = PathBuf::from(dir);
        }

        let qa = &mut self.qa;
        if let Some(enabled) = env_parse::<bool>("DOCQA_USE_OLLAMA")? {
            qa.generation.enabled = enabled;
        }
        if let Ok(url) = std::env::var("DOCQA_OLLAMA_URL") {
            qa.generation.endpoint = url;
        }
        if let Some(top_k) = env_parse("DOCQA_TOP_K")? {
            qa.retrieval.top_k = top_k;
        }
        if let Some(size) = env_parse("DOCQA_CHUNK_SIZE")? {
            qa.chunking.chunk_size = size;
        }
        if let Some(overlap) = env_parse("DOCQA_CHUNK_OVERLAP")? {
            qa.chunking.overlap = overlap;
        }
        if let Some(max) = env_parse("DOCQA_MAX_ANSWER_LENGTH")? {
            qa.generation.max_answer_chars = max;
        }
        if let Some(temperature) = env_parse("DOCQA_OLLAMA_TEMPERATURE")? {
            qa.generation.temperature = temperature;
        }
        if let Some(top_p) = env_parse("DOCQA_OLLAMA_TOP_P")? {
            qa.generation.top_p = top_p;
        }
        if let Some(max_tokens) = env_parse("DOCQA_OLLAMA_MAX_TOKENS")? {
            qa.generation.max_tokens = max_tokens;
        }
        if let Some(secs) = env_parse("DOCQA_OLLAMA_TIMEOUT")? {
            qa.generation.attempt_timeout_secs = secs;
        }
        if let Some(secs) = env_parse("DOCQA_REQUEST_TIMEOUT")? {
            qa.generation.request_timeout_secs = secs;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.log_level = Some(level);
        }
        if std::env::var("NO_COLOR").is_ok() {
            self.no_color = true;
        }

        Ok(())
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    pub fn with_overrides(
        mut self,
        documents_dir: Option<PathBuf>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(documents_dir) = documents_dir {
            self.documents_dir = documents_dir;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .docqa directory.
    pub fn docqa_dir(&self) -> PathBuf {
        self.workspace.join(".docqa")
    }

    /// Directory holding persisted index generations.
    pub fn data_dir(&self) -> PathBuf {
        self.docqa_dir().join("data")
    }

    /// Directory holding prompt template overrides.
    pub fn prompts_dir(&self) -> PathBuf {
        self.docqa_dir().join("prompts")
    }

    /// Ensure the .docqa directory exists.
    pub fn ensure_docqa_dir(&self) -> AppResult<()> {
        let docqa_dir = self.docqa_dir();
        if !docqa_dir.exists() {
            std::fs::create_dir_all(&docqa_dir).map_err(|e| {
                AppError::Config(format!("Failed to create .docqa directory: {}", e))
            })?;
        }
        Ok(())
    }
}

/// Parse an optional environment variable, rejecting malformed values.
fn env_parse<T: FromStr>(name: &str) -> AppResult<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .to_lowercase()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::Config(format!("Invalid value for {}: {:?}", name, raw))),
        Err(_) => Ok(None),
    }
}
