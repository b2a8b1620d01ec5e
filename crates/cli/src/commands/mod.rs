//! Command handlers for the DocQA CLI.
//!
//! Each subcommand lives in its own module and talks to a `QaService`.

pub mod ask;
pub mod clear;
pub mod ingest;
pub mod stats;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use clear::ClearCommand;
pub use ingest::IngestCommand;
pub use stats::StatsCommand;

use docqa_core::{AppError, AppResult};

/// Print a value as pretty JSON on stdout.
pub(crate) fn print_json(value: &serde_json::Value) -> AppResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Serialization(format!("JSON serialization failed: {}", e)))?;
    println!("{}", text);
    Ok(())
}
