//! relnotes CLI
//!
//! Main entry point for the relnotes command-line tool.
//! Answers questions about product release notes with cited sources, and
//! hands unanswerable questions to support.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, ChatCommand, ContactCommand, IndexCommand};
use relnotes_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Instrument;

/// relnotes - grounded answers from product release notes
#[derive(Parser, Debug)]
#[command(name = "relnotes")]
#[command(about = "Grounded answers from product release notes", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "RELNOTES_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "RELNOTES_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider (ollama, watsonx)
    #[arg(short, long, global = true, env = "RELNOTES_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "RELNOTES_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask one question about the release notes
    Ask(AskCommand),

    /// Interactive conversation about the release notes
    Chat(ChatCommand),

    /// Leave contact details for an unanswered question
    Contact(ContactCommand),

    /// Release-notes index management
    Index(IndexCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Ask(_) => "ask",
            Commands::Chat(_) => "chat",
            Commands::Contact(_) => "contact",
            Commands::Index(_) => "index",
        }
    }

    async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match self {
            Commands::Ask(cmd) => cmd.execute(config).await,
            Commands::Chat(cmd) => cmd.execute(config).await,
            Commands::Contact(cmd) => cmd.execute(config).await,
            Commands::Index(cmd) => cmd.execute(config).await,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Internal errors display only their correlation id
            eprintln!("Error: {}", e);
            if e.is_client_error() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    // The workspace and config file decide which YAML gets merged
    let config = AppConfig::load_from(cli.workspace.clone(), cli.config.clone())?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("relnotes CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    config.ensure_relnotes_dir()?;

    let span = tracing::info_span!("command", name = cli.command.name());
    let result = cli.command.execute(&config).instrument(span).await;

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
