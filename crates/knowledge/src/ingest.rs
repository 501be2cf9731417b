//! Loading the release-notes export into the chunk index.
//!
//! Each block of the JSON export becomes one chunk. Chunk ids are content
//! hashes, so loading the same export twice adds nothing.

use crate::config;
use crate::embeddings::{create_provider, EmbeddingConfig};
use crate::index::SqliteIndex;
use crate::types::{Chunk, IndexStats, IngestStats, ReleaseNoteBlock};
use relnotes_core::{AppError, AppResult};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Texts embedded per provider call.
const EMBED_BATCH_SIZE: usize = 32;

/// Options for an ingestion run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Path to the JSON export
    pub source: PathBuf,

    /// Clear the index before loading
    pub reset: bool,

    /// Embedding settings for a new index; `None` keeps the saved ones
    pub embedding: Option<EmbeddingConfig>,
}

/// Stable chunk id derived from a block's citation fields and content.
pub fn chunk_id(block: &ReleaseNoteBlock) -> String {
    let mut hasher = Sha256::new();
    hasher.update(block.url.as_bytes());
    hasher.update([0u8]);
    hasher.update(block.heading.as_bytes());
    hasher.update([0u8]);
    hasher.update(block.content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// The text indexed for a block: its non-empty parts, one per line.
fn block_text(block: &ReleaseNoteBlock) -> String {
    [&block.title, &block.heading, &block.content]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Turn export blocks into chunks, skipping blocks without content.
///
/// `position` counts blocks within each source URL.
pub fn blocks_to_chunks(blocks: &[ReleaseNoteBlock]) -> Vec<Chunk> {
    let mut positions: HashMap<&str, u32> = HashMap::new();

    blocks
        .iter()
        .filter(|block| !block.content.trim().is_empty())
        .map(|block| {
            let position = positions.entry(block.url.as_str()).or_insert(0);
            let chunk = Chunk {
                id: chunk_id(block),
                text: block_text(block),
                source_id: block.url.clone(),
                source_url: block.url.clone(),
                source_title: if block.title.trim().is_empty() {
                    block.heading.trim().to_string()
                } else {
                    block.title.trim().to_string()
                },
                position: *position,
                ordinal: 0,
            };
            *position += 1;
            chunk
        })
        .collect()
}

/// Read the JSON export.
pub fn read_export(path: &Path) -> AppResult<Vec<ReleaseNoteBlock>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        AppError::Knowledge(format!("Failed to read release notes export {:?}: {}", path, e))
    })?;

    serde_json::from_str(&content).map_err(|e| {
        AppError::Knowledge(format!(
            "Failed to parse release notes export {:?}: {}",
            path, e
        ))
    })
}

/// Load a release-notes export into the workspace index.
///
/// The embedding config saved with the index must match the requested one
/// unless `reset` is set, because vectors from different spaces cannot be
/// compared.
pub async fn ingest(workspace: &Path, options: IngestOptions) -> AppResult<IngestStats> {
    let start = Instant::now();
    tracing::info!("Loading release notes from {:?}", options.source);

    let config_path = config::get_config_path(workspace);
    let saved = if config_path.exists() {
        Some(EmbeddingConfig::load(workspace)?)
    } else {
        None
    };

    let embedding = match (options.embedding, &saved) {
        (Some(requested), Some(saved)) if !options.reset => {
            saved.validate_consistency(&requested)?;
            requested
        }
        (Some(requested), _) => requested,
        (None, Some(saved)) => saved.clone(),
        (None, None) => EmbeddingConfig::default(),
    };

    let blocks = read_export(&options.source)?;
    let chunks = blocks_to_chunks(&blocks);
    let provider = create_provider(&embedding)?;

    let index = SqliteIndex::open(&config::get_index_path(workspace))?;
    if options.reset {
        index.reset()?;
    }

    let mut chunks_indexed = 0u32;
    for batch in chunks.chunks(EMBED_BATCH_SIZE) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let embeddings = provider.embed_batch(&texts).await?;

        if embeddings.len() != batch.len() {
            return Err(AppError::Knowledge(format!(
                "Embedding provider returned {} vectors for {} texts",
                embeddings.len(),
                batch.len()
            )));
        }

        for (chunk, vector) in batch.iter().zip(embeddings.iter()) {
            if index.insert_chunk(chunk, vector)?.is_some() {
                chunks_indexed += 1;
            }
        }

        tracing::debug!("Indexed batch of {} chunks", batch.len());
    }

    embedding.save(workspace)?;

    let stats = IngestStats {
        blocks_read: blocks.len() as u32,
        chunks_indexed,
        skipped: (blocks.len() as u32).saturating_sub(chunks_indexed),
        duration_secs: start.elapsed().as_secs_f64(),
    };

    tracing::info!(
        blocks = stats.blocks_read,
        indexed = stats.chunks_indexed,
        skipped = stats.skipped,
        "Load completed in {:.2}s",
        stats.duration_secs
    );

    Ok(stats)
}

/// Statistics for the workspace index.
pub fn stats(workspace: &Path) -> AppResult<IndexStats> {
    let index_path = config::get_index_path(workspace);
    if !index_path.exists() {
        return Err(AppError::Knowledge(
            "No chunk index found. Run 'relnotes index load' first.".to_string(),
        ));
    }

    let index = SqliteIndex::open(&index_path)?;
    let (chunks_count, sources_count) = index.counts()?;
    let embedding = EmbeddingConfig::load(workspace)?;
    let db_size_bytes = std::fs::metadata(&index_path).map(|m| m.len()).unwrap_or(0);

    Ok(IndexStats {
        chunks_count,
        sources_count,
        db_size_bytes,
        embedding_provider: embedding.provider,
        embedding_model: embedding.model,
    })
}
