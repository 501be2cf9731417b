//! Index command handler.
//!
//! Loads the release-notes export into the chunk index and reports on it.

use clap::{Args, Subcommand};
use relnotes_core::{config::AppConfig, AppResult};
use relnotes_knowledge::embeddings::EmbeddingConfig;
use relnotes_knowledge::IngestOptions;
use std::path::PathBuf;

/// Release-notes index management
#[derive(Args, Debug)]
pub struct IndexCommand {
    #[command(subcommand)]
    pub action: IndexAction,
}

#[derive(Subcommand, Debug)]
pub enum IndexAction {
    /// Load a release-notes JSON export
    Load(IndexLoadCommand),
    /// Show index statistics
    Stats(IndexStatsCommand),
}

impl IndexCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            IndexAction::Load(cmd) => cmd.execute(config).await,
            IndexAction::Stats(cmd) => cmd.execute(config).await,
        }
    }
}

/// Load a release-notes export
#[derive(Args, Debug)]
pub struct IndexLoadCommand {
    /// Path to the JSON export (`[{title, heading, url, content}]`)
    pub source: PathBuf,

    /// Clear the index before loading
    #[arg(long)]
    pub reset: bool,

    /// Embedding provider (trigram, ollama)
    #[arg(long)]
    pub embedding_provider: Option<String>,

    /// Embedding model
    #[arg(long)]
    pub embedding_model: Option<String>,

    /// Embedding dimensions
    #[arg(long)]
    pub dimensions: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IndexLoadCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing index load command");

        let options = IngestOptions {
            source: self.source.clone(),
            reset: self.reset,
            embedding: self.embedding_config(config)?,
        };

        let stats = relnotes_knowledge::ingest(&config.workspace, options).await?;

        if self.json {
            let output = serde_json::json!({
                "blocksRead": stats.blocks_read,
                "chunksIndexed": stats.chunks_indexed,
                "skipped": stats.skipped,
                "durationSecs": stats.duration_secs,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!(
                "Loaded {} blocks ({} new chunks, {} skipped) in {:.2}s",
                stats.blocks_read, stats.chunks_indexed, stats.skipped, stats.duration_secs
            );
        }

        Ok(())
    }

    /// Embedding settings requested by flags or the config file.
    ///
    /// `None` keeps whatever the index was built with.
    fn embedding_config(&self, config: &AppConfig) -> AppResult<Option<EmbeddingConfig>> {
        let provider = self
            .embedding_provider
            .as_deref()
            .or_else(|| config.embedding_provider())
            .or_else(|| {
                (self.embedding_model.is_some() || self.dimensions.is_some()).then_some("trigram")
            });

        provider
            .map(|provider| {
                EmbeddingConfig::for_provider(
                    provider,
                    config,
                    self.embedding_model.clone(),
                    self.dimensions,
                )
            })
            .transpose()
    }
}

/// Show index statistics
#[derive(Args, Debug)]
pub struct IndexStatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IndexStatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing index stats command");

        let stats = relnotes_knowledge::stats(&config.workspace)?;

        if self.json {
            let output = serde_json::json!({
                "chunksCount": stats.chunks_count,
                "sourcesCount": stats.sources_count,
                "dbSizeBytes": stats.db_size_bytes,
                "embeddingProvider": stats.embedding_provider,
                "embeddingModel": stats.embedding_model,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("Chunks:    {}", stats.chunks_count);
            println!("Sources:   {}", stats.sources_count);
            println!("Size:      {} bytes", stats.db_size_bytes);
            println!(
                "Embedding: {} ({})",
                stats.embedding_provider, stats.embedding_model
            );
        }

        Ok(())
    }
}
