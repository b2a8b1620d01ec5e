//! Clear command handler.

use clap::Args;
use docqa_core::AppResult;
use docqa_knowledge::QaService;

/// Remove the persisted index
#[derive(Args, Debug)]
pub struct ClearCommand {}

impl ClearCommand {
    pub async fn execute(&self, service: &QaService) -> AppResult<()> {
        tracing::info!("Executing clear command");
        service.clear().await?;
        println!("Index cleared");
        Ok(())
    }
}
