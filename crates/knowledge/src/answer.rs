//! Answer generation: an ordered chain of model candidates ending in extraction.
//!
//! Candidates are tried in rank order and the first well-formed answer wins.
//! A failing candidate is logged and skipped, never retried. Extraction is
//! always the final candidate and cannot fail: it returns an excerpt of the
//! most relevant chunk, or a fixed message when retrieval found nothing.
//!
//! Every attempt runs under its own timeout carved out of the request
//! deadline. Backends release their resources when an attempt future is
//! dropped, so a timed-out attempt leaves nothing running behind it.

use crate::error::GenerationError;
use crate::types::{Answer, AnswerStrategy, AttemptRecord, RetrievalResult, RetrievedChunk};
use docqa_core::{AppError, AppResult, GenerationConfig};
use docqa_llm::{candidate_model, create_client, LlmClient, LlmRequest, OllamaClient};
use docqa_prompt::{build_prompt, PromptDefinition};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::instrument;

/// Answer returned when retrieval found nothing relevant.
pub const NO_RELEVANT_CONTENT: &str =
    "I couldn't find any relevant information in the uploaded documents to answer your question.";

/// Time kept back from model attempts so extraction can still answer.
const EXTRACTION_RESERVE: Duration = Duration::from_millis(250);

/// Timeout for asking a backend which models it has.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// One entry of the fallback chain.
#[derive(Clone)]
pub enum Candidate {
    /// A local model reached through a generation backend
    LocalModel {
        name: String,
        rank: u32,
        model: String,
        client: Arc<dyn LlmClient>,
    },
    /// Excerpt of the top retrieved chunk
    Extraction,
}

impl Candidate {
    pub fn name(&self) -> &str {
        match self {
            Self::LocalModel { name, .. } => name,
            Self::Extraction => "extraction",
        }
    }
}

impl std::fmt::Debug for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LocalModel {
                name,
                rank,
                model,
                client,
            } => f
                .debug_struct("LocalModel")
                .field("name", name)
                .field("rank", rank)
                .field("model", model)
                .field("provider", &client.provider_name())
                .finish(),
            Self::Extraction => f.write_str("Extraction"),
        }
    }
}

/// Sampling and size limits applied to every answer.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub attempt_timeout: Duration,
    pub max_context_chars: usize,
    pub max_answer_chars: usize,
    pub extraction_disclaimer: bool,
}

impl From<&GenerationConfig> for GenerationSettings {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
            attempt_timeout: Duration::from_secs(config.attempt_timeout_secs),
            max_context_chars: config.max_context_chars,
            max_answer_chars: config.max_answer_chars,
            extraction_disclaimer: config.extraction_disclaimer,
        }
    }
}

/// What a backend said about its installed models.
#[derive(Debug, Clone)]
enum Probe {
    Listed(Vec<String>),
    /// The backend cannot list models; try the candidate anyway
    Unlisted,
    Down(String),
}

/// Probe results gathered during one answer, keyed by client.
type ProbeCache = HashMap<usize, Probe>;

#[derive(Debug)]
pub struct AnswerGenerator {
    candidates: Vec<Candidate>,
    settings: GenerationSettings,
    prompt: PromptDefinition,
}

impl AnswerGenerator {
    /// Build a chain. Model candidates are ordered by rank (stable), and a
    /// single `Extraction` entry is always placed last.
    pub fn new(
        candidates: Vec<Candidate>,
        settings: GenerationSettings,
        prompt: PromptDefinition,
    ) -> Self {
        let mut models: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| matches!(c, Candidate::LocalModel { .. }))
            .collect();
        models.sort_by_key(|c| match c {
            Candidate::LocalModel { rank, .. } => *rank,
            Candidate::Extraction => u32::MAX,
        });
        models.push(Candidate::Extraction);

        Self {
            candidates: models,
            settings,
            prompt,
        }
    }

    /// Chain described by configuration. Unranked candidates keep their
    /// listed position; generation disabled leaves only extraction.
    pub fn from_config(config: &GenerationConfig, prompt: PromptDefinition) -> AppResult<Self> {
        let mut candidates = Vec::new();
        if config.enabled {
            let ollama = Arc::new(OllamaClient::with_base_url(&config.endpoint));
            for (position, candidate) in config.candidates.iter().enumerate() {
                let client = create_client(candidate, &config.endpoint, Some(&ollama))
                    .map_err(AppError::from)?;
                candidates.push(Candidate::LocalModel {
                    name: candidate.name().to_string(),
                    rank: candidate.rank().unwrap_or(position as u32),
                    model: candidate_model(candidate),
                    client,
                });
            }
        }
        Ok(Self::new(candidates, config.into(), prompt))
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Answer `question` from `retrieval` before `deadline`.
    ///
    /// Never fails: model failures fall through to extraction.
    pub async fn answer(
        &self,
        question: &str,
        retrieval: &RetrievalResult,
        deadline: Instant,
        allow_models: bool,
    ) -> Answer {
        let sources = retrieval.sources();
        let Some(top) = retrieval.top() else {
            tracing::info!("No relevant chunks retrieved; skipping generation");
            return Answer {
                text: NO_RELEVANT_CONTENT.to_string(),
                strategy: AnswerStrategy::NoContext,
                sources,
                attempts: Vec::new(),
            };
        };

        let prompt = if allow_models && self.has_models() {
            self.answer_prompt(question, retrieval)
        } else {
            None
        };

        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut probes = ProbeCache::new();
        for (i, candidate) in self.candidates.iter().enumerate() {
            let (name, model, client) = match candidate {
                Candidate::LocalModel {
                    name,
                    model,
                    client,
                    ..
                } => (name, model, client),
                Candidate::Extraction => {
                    if !attempts.is_empty() {
                        let signal = GenerationError::AllBackendsExhausted {
                            attempts: attempts.len(),
                        };
                        tracing::info!("{}; answering by extraction", signal);
                    }
                    return self.extracted(top, sources, attempts);
                }
            };
            let Some(prompt) = prompt.as_ref() else {
                continue;
            };

            let models_left = self.candidates[i..]
                .iter()
                .filter(|c| matches!(c, Candidate::LocalModel { .. }))
                .count();
            let started = Instant::now();
            let result = match self.attempt_budget(deadline, models_left) {
                None => Err(GenerationError::DeadlineExhausted),
                Some(budget) => {
                    self.attempt(name, model, client, prompt, budget, &mut probes)
                        .await
                }
            };
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(text) => {
                    tracing::info!(candidate = %name, elapsed_ms, "Generated answer");
                    attempts.push(AttemptRecord {
                        candidate: name.clone(),
                        failure: None,
                        detail: None,
                        elapsed_ms,
                    });
                    return Answer {
                        text,
                        strategy: AnswerStrategy::Generated {
                            candidate: name.clone(),
                            model: model.clone(),
                        },
                        sources,
                        attempts,
                    };
                }
                Err(err) => {
                    tracing::warn!(candidate = %name, kind = err.kind(), elapsed_ms, "Candidate failed: {}", err);
                    attempts.push(AttemptRecord {
                        candidate: name.clone(),
                        failure: Some(err.kind().to_string()),
                        detail: Some(err.to_string()),
                        elapsed_ms,
                    });
                }
            }
        }

        // `new` always closes the chain with extraction
        self.extracted(top, sources, attempts)
    }

    fn has_models(&self) -> bool {
        self.candidates
            .iter()
            .any(|c| matches!(c, Candidate::LocalModel { .. }))
    }

    /// Grounded prompt for the model candidates, or `None` when it cannot be rendered.
    fn answer_prompt(
        &self,
        question: &str,
        retrieval: &RetrievalResult,
    ) -> Option<docqa_prompt::BuiltPrompt> {
        let context = build_context(retrieval, self.settings.max_context_chars);
        let mut variables = HashMap::new();
        variables.insert("question".to_string(), question.trim().to_string());
        variables.insert("context".to_string(), context);
        match build_prompt(&self.prompt, variables) {
            Ok(prompt) => Some(prompt),
            Err(e) => {
                tracing::warn!("Failed to build answer prompt: {}", e);
                None
            }
        }
    }

    fn extracted(
        &self,
        top: &RetrievedChunk,
        sources: Vec<String>,
        mut attempts: Vec<AttemptRecord>,
    ) -> Answer {
        let started = Instant::now();
        let text = extract_answer(
            &top.chunk.text,
            &top.chunk.source,
            self.settings.max_answer_chars,
            self.settings.extraction_disclaimer,
        );
        attempts.push(AttemptRecord {
            candidate: Candidate::Extraction.name().to_string(),
            failure: None,
            detail: None,
            elapsed_ms: started.elapsed().as_millis() as u64,
        });

        Answer {
            text,
            strategy: AnswerStrategy::Extracted,
            sources,
            attempts,
        }
    }

    /// `min(attempt_timeout, remaining / candidates_left)` after the extraction reserve.
    fn attempt_budget(&self, deadline: Instant, candidates_left: usize) -> Option<Duration> {
        let remaining = deadline
            .saturating_duration_since(Instant::now())
            .saturating_sub(EXTRACTION_RESERVE);
        let share = remaining / candidates_left.max(1) as u32;
        let budget = share.min(self.settings.attempt_timeout);
        (!budget.is_zero()).then_some(budget)
    }

    #[instrument(skip(self, client, prompt, probes), fields(budget_ms = budget.as_millis() as u64))]
    async fn attempt(
        &self,
        name: &str,
        model: &str,
        client: &Arc<dyn LlmClient>,
        prompt: &docqa_prompt::BuiltPrompt,
        budget: Duration,
        probes: &mut ProbeCache,
    ) -> Result<String, GenerationError> {
        let started = Instant::now();

        if let Some(installed) = probe_models(client, budget.min(PROBE_TIMEOUT), probes).await? {
            if !model_installed(&installed, model) {
                return Err(GenerationError::ModelUnavailable(format!(
                    "model '{}' is not installed",
                    model
                )));
            }
        }

        let mut request = LlmRequest::new(prompt.user.clone(), model)
            .with_temperature(self.settings.temperature)
            .with_top_p(self.settings.top_p)
            .with_max_tokens(self.settings.max_tokens);
        if let Some(system) = &prompt.system {
            request = request.with_system(system.clone());
        }

        let remaining = budget.saturating_sub(started.elapsed());
        let response = tokio::time::timeout(remaining, client.complete(&request))
            .await
            .map_err(|_| GenerationError::GenerationTimeout(budget))??;

        let text = response.content.trim();
        if text.is_empty() {
            return Err(GenerationError::MalformedOutput(
                "backend returned no text".to_string(),
            ));
        }
        Ok(text.to_string())
    }
}

/// Installed models for `client`, fetched at most once per answer.
///
/// `Ok(None)` means the list is unknown and the candidate should simply be
/// tried. An unreachable backend fails every candidate that uses it.
async fn probe_models(
    client: &Arc<dyn LlmClient>,
    timeout: Duration,
    probes: &mut ProbeCache,
) -> Result<Option<Vec<String>>, GenerationError> {
    let key = Arc::as_ptr(client) as *const () as usize;
    let probe = match probes.get(&key) {
        Some(probe) => probe.clone(),
        None => {
            let probe = match tokio::time::timeout(timeout, client.list_models()).await {
                Ok(Ok(Some(models))) => Probe::Listed(models),
                Ok(Ok(None)) => Probe::Unlisted,
                Ok(Err(docqa_llm::LlmError::Unavailable(reason))) => Probe::Down(reason),
                Ok(Err(e)) => {
                    tracing::debug!("Model listing unusable, trying anyway: {}", e);
                    Probe::Unlisted
                }
                Err(_) => {
                    tracing::debug!("Model listing timed out, trying anyway");
                    Probe::Unlisted
                }
            };
            probes.insert(key, probe.clone());
            probe
        }
    };

    match probe {
        Probe::Listed(models) => Ok(Some(models)),
        Probe::Unlisted => Ok(None),
        Probe::Down(reason) => Err(GenerationError::ModelUnavailable(reason)),
    }
}

/// Whether `model` is among `installed`; an untagged name matches any tag.
pub fn model_installed(installed: &[String], model: &str) -> bool {
    installed.iter().any(|name| {
        name == model
            || (!model.contains(':')
                && name
                    .strip_prefix(model)
                    .is_some_and(|rest| rest.starts_with(':')))
    })
}

/// Normalise chunk text: line breaks to spaces, curly quotes to ASCII, whitespace collapsed.
pub fn clean_text(text: &str) -> String {
    let replaced: String = text
        .chars()
        .map(|c| match c {
            '\u{201c}' | '\u{201d}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            other => other,
        })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cleaned chunks in relevance order, joined by blank lines, within `max_chars`.
pub fn build_context(retrieval: &RetrievalResult, max_chars: usize) -> String {
    let mut context = String::new();
    let mut used = 0;
    for retrieved in &retrieval.chunks {
        let cleaned = clean_text(&retrieved.chunk.text);
        if cleaned.is_empty() {
            continue;
        }
        let separator = if context.is_empty() { 0 } else { 2 };
        let len = cleaned.chars().count();
        if used + separator + len > max_chars {
            if context.is_empty() {
                // The best chunk alone is too long; keep its head
                context = cleaned.chars().take(max_chars).collect();
            }
            break;
        }
        if separator > 0 {
            context.push_str("\n\n");
        }
        context.push_str(&cleaned);
        used += separator + len;
    }
    context
}

/// Excerpt limited to `max_chars`: cut after the last sentence terminator
/// when it lies in the final 30% of the limit, otherwise hard-cut with "...".
pub fn truncate_excerpt(text: &str, max_chars: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return text.to_string();
    }

    let head = &chars[..max_chars];
    let sentence_end = head.iter().rposition(|c| matches!(c, '.' | '!' | '?'));
    match sentence_end {
        Some(pos) if pos as f64 > max_chars as f64 * 0.7 => head[..=pos].iter().collect(),
        _ => {
            let mut cut: String = head.iter().collect();
            cut.push_str("...");
            cut
        }
    }
}

/// The extraction-fallback answer for one chunk.
pub fn extract_answer(text: &str, source: &str, max_chars: usize, disclaimer: bool) -> String {
    let excerpt = truncate_excerpt(&clean_text(text), max_chars);
    if disclaimer {
        format!("[Extracted from {}] {}", source, excerpt)
    } else {
        excerpt
    }
}
