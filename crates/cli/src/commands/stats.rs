//! Stats command handler.

use clap::Args;
use docqa_core::AppResult;
use docqa_knowledge::QaService;

/// Show statistics for the active index
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, service: &QaService) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let stats = service.stats().await?;

        if self.json {
            let value = match &stats {
                Some(stats) => serde_json::to_value(stats)?,
                None => serde_json::json!({ "ingested": false }),
            };
            return super::print_json(&value);
        }

        let Some(stats) = stats else {
            println!("No documents have been ingested yet");
            return Ok(());
        };

        println!("Generation: {}", stats.generation);
        println!("  Embedding model: {}", stats.identity);
        println!("  Documents: {}", stats.documents);
        println!("  Chunks: {}", stats.chunks);
        println!("  Index size: {} bytes", stats.index_bytes);
        println!("  Store size: {} bytes", stats.store_bytes);
        println!("  Created: {}", stats.created_at);
        if let Some(report) = &stats.last_report {
            println!(
                "  Last ingest: {} skipped, took {}ms",
                report.skipped.len(),
                report.duration_ms
            );
        }

        Ok(())
    }
}
