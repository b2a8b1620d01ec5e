//! Ask command handler.
//!
//! Answers one question against the active index. With `--json` the
//! answer is printed as `{"answer": ...}`; failures are printed as
//! `{"error": ..., "kind": ...}` and the process exits non-zero.

use clap::Args;
use docqa_core::{AppError, AppResult};
use docqa_knowledge::{AnswerOptions, AnswerStrategy, QaService};

/// Ask a question about the ingested documents
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Number of chunks to retrieve
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Skip local models and answer with an excerpt
    #[arg(long)]
    pub no_generate: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Outcome of `ask` for `main`: JSON failures are already printed.
pub enum AskOutcome {
    Answered,
    Failed,
}

impl AskCommand {
    pub async fn execute(&self, service: &QaService) -> AppResult<AskOutcome> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let options = AnswerOptions {
            top_k: self.top_k,
            extraction_only: self.no_generate,
        };

        let answer = match service.answer_with(&self.question, options).await {
            Ok(answer) => answer,
            Err(e) if self.json => {
                tracing::warn!("Answer failed: {}", e);
                super::print_json(&serde_json::json!({
                    "error": e.to_string(),
                    "kind": e.kind(),
                }))?;
                return Ok(AskOutcome::Failed);
            }
            Err(e) => return Err(AppError::from(e)),
        };

        tracing::debug!(
            attempts = answer.attempts.len(),
            sources = answer.sources.len(),
            "Answer strategy: {:?}",
            answer.strategy
        );

        if self.json {
            super::print_json(&serde_json::json!({ "answer": answer.text }))?;
            return Ok(AskOutcome::Answered);
        }

        println!("{}", answer.text);
        println!();
        match &answer.strategy {
            AnswerStrategy::Generated { model, .. } => println!("Answered by: {}", model),
            AnswerStrategy::Extracted => println!("Answered by: excerpt (no model available)"),
            AnswerStrategy::NoContext => {}
        }
        if !answer.sources.is_empty() {
            println!("Sources:");
            for source in &answer.sources {
                println!("- {}", source);
            }
        }

        Ok(AskOutcome::Answered)
    }
}
