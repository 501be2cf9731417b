//! Knowledge system type definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// An indexed unit of release-note text with its citation fields.
///
/// Chunks are produced once by ingestion and are read-only afterwards.
/// The embedding vector is owned by the index and never travels with the
/// chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique chunk identifier
    pub id: String,

    /// Text content
    pub text: String,

    /// Source document identifier (the page URL for release notes)
    pub source_id: String,

    /// Citation URL
    pub source_url: String,

    /// Citation title
    pub source_title: String,

    /// Position within the source document
    pub position: u32,

    /// Global ingestion order, used to break score ties
    pub ordinal: u64,
}

/// A chunk paired with its similarity to the query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Per-query retrieval output.
///
/// Scores are non-increasing by position, ties are in ingestion order and
/// no chunk id appears twice. The constructor enforces all three.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalResult {
    items: Vec<ScoredChunk>,
}

impl RetrievalResult {
    /// Build a result from scored chunks in any order.
    pub fn new(mut items: Vec<ScoredChunk>) -> Self {
        items.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk.ordinal.cmp(&b.chunk.ordinal))
        });

        let mut seen = HashSet::new();
        items.retain(|item| seen.insert(item.chunk.id.clone()));

        Self { items }
    }

    /// An empty result, the normal "nothing relevant" signal.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoredChunk> {
        self.items.iter()
    }

    pub fn scores(&self) -> Vec<f32> {
        self.items.iter().map(|item| item.score).collect()
    }

    /// Highest score, if any chunk was retrieved.
    pub fn max_score(&self) -> Option<f32> {
        self.items.first().map(|item| item.score)
    }
}

/// One block of the release-notes JSON export consumed by ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseNoteBlock {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub heading: String,

    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub content: String,
}

/// Statistics from an ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestStats {
    /// Blocks read from the export
    pub blocks_read: u32,

    /// Chunks newly written to the index
    pub chunks_indexed: u32,

    /// Blocks skipped (empty or already indexed)
    pub skipped: u32,

    /// Duration in seconds
    pub duration_secs: f64,
}

/// Statistics for the chunk index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of chunks
    pub chunks_count: u64,

    /// Number of distinct source documents
    pub sources_count: u64,

    /// Database size in bytes
    pub db_size_bytes: u64,

    /// Embedding provider the index was built with
    pub embedding_provider: String,

    /// Embedding model the index was built with
    pub embedding_model: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(id: &str, ordinal: u64, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                id: id.to_string(),
                text: format!("text {}", id),
                source_id: "src".to_string(),
                source_url: "https://docs.example.com".to_string(),
                source_title: "Release".to_string(),
                position: 0,
                ordinal,
            },
            score,
        }
    }

    #[test]
    fn test_result_sorted_with_ordinal_tie_break() {
        let result = RetrievalResult::new(vec![
            scored("c", 2, 0.5),
            scored("a", 0, 0.9),
            scored("b", 1, 0.5),
        ]);

        let ids: Vec<_> = result.iter().map(|s| s.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(result.max_score(), Some(0.9));
    }

    #[test]
    fn test_result_drops_duplicate_ids() {
        let result = RetrievalResult::new(vec![scored("a", 0, 0.9), scored("a", 0, 0.4)]);
        assert_eq!(result.len(), 1);
        assert_eq!(result.scores(), vec![0.9]);
    }

    #[test]
    fn test_block_fields_default() {
        let block: ReleaseNoteBlock =
            serde_json::from_str(r#"{"url":"https://x","content":"body"}"#).unwrap();
        assert!(block.title.is_empty());
        assert_eq!(block.content, "body");
    }
}
