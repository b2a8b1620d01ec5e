//! DocQA CLI
//!
//! Main entry point for the docqa command-line tool: ingest a directory of
//! documents, then ask questions answered from them by local models.

mod commands;

use clap::{Parser, Subcommand};
use commands::ask::AskOutcome;
use commands::{AskCommand, ClearCommand, IngestCommand, StatsCommand};
use docqa_core::{config::AppConfig, logging, AppResult};
use docqa_knowledge::QaService;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Instrument;

/// DocQA - question answering over local documents
#[derive(Parser, Debug)]
#[command(name = "docqa")]
#[command(about = "Question answering over local documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "DOCQA_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "DOCQA_CONFIG")]
    config: Option<PathBuf>,

    /// Documents directory
    #[arg(long, global = true)]
    documents_dir: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the index from a documents directory
    Ingest(IngestCommand),

    /// Ask a question about the ingested documents
    Ask(AskCommand),

    /// Remove the persisted index
    Clear(ClearCommand),

    /// Show statistics for the active index
    Stats(StatsCommand),
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> AppResult<ExitCode> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Environment, then config file, then CLI flags
    let config = AppConfig::load_with(cli.workspace, cli.config)?.with_overrides(
        cli.documents_dir,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("DocQA CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Documents: {:?}", config.documents_dir);

    config.ensure_docqa_dir()?;
    let service = QaService::from_config(&config)?;

    let command_name = match &cli.command {
        Commands::Ingest(_) => "ingest",
        Commands::Ask(_) => "ask",
        Commands::Clear(_) => "clear",
        Commands::Stats(_) => "stats",
    };
    let span = tracing::info_span!("command", name = command_name);

    let result = async {
        match cli.command {
            Commands::Ingest(cmd) => cmd.execute(&config, &service).await.map(|_| ExitCode::SUCCESS),
            Commands::Ask(cmd) => cmd.execute(&service).await.map(|outcome| match outcome {
                AskOutcome::Answered => ExitCode::SUCCESS,
                AskOutcome::Failed => ExitCode::FAILURE,
            }),
            Commands::Clear(cmd) => cmd.execute(&service).await.map(|_| ExitCode::SUCCESS),
            Commands::Stats(cmd) => cmd.execute(&service).await.map(|_| ExitCode::SUCCESS),
        }
    }
    .instrument(span)
    .await;

    match &result {
        Ok(_) => tracing::info!("Command completed"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
