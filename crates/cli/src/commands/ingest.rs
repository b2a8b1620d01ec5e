//! Ingest command handler.

use clap::Args;
use docqa_core::{config::AppConfig, AppResult};
use docqa_knowledge::{ProgressEvent, ProgressReporter, QaService};
use std::path::PathBuf;
use std::sync::Arc;

/// Build the index from a documents directory
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Documents directory (default: the configured documents path)
    pub dir: Option<PathBuf>,

    /// Output the ingestion report as JSON
    #[arg(long)]
    pub json: bool,

    /// Suppress progress lines
    #[arg(short, long)]
    pub quiet: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig, service: &QaService) -> AppResult<()> {
        let dir = self
            .dir
            .clone()
            .unwrap_or_else(|| config.documents_dir.clone());
        tracing::info!("Executing ingest command for {:?}", dir);

        let progress = if self.quiet || self.json {
            ProgressReporter::noop()
        } else {
            ProgressReporter::new(Arc::new(|event: ProgressEvent| {
                eprintln!("{}", event.format_simple())
            }))
        };

        let report = service.ingest_dir(&dir, &progress).await?;

        if self.json {
            let value = serde_json::to_value(&report)?;
            super::print_json(&value)?;
        } else {
            println!(
                "Ingested {} documents ({} chunks) in {:.2}s",
                report.documents_ingested,
                report.chunks,
                report.duration_ms as f64 / 1000.0
            );
            for skipped in &report.skipped {
                println!(
                    "  skipped {} [{}]: {}",
                    skipped.path.display(),
                    skipped.kind,
                    skipped.reason
                );
            }
        }

        Ok(())
    }
}
