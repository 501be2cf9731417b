//! Passage retrieval over the chunk index.

use crate::embeddings::EmbeddingProvider;
use crate::index::ChunkIndex;
use crate::types::{RetrievalResult, ScoredChunk};
use relnotes_core::{AppError, AppResult};
use std::collections::HashSet;
use std::sync::Arc;

/// Embeds questions and returns the top-K relevant chunks.
///
/// Retrieval has no side effects; the index is only read.
pub struct Retriever {
    index: Arc<dyn ChunkIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    min_similarity: f32,
}

impl Retriever {
    pub fn new(
        index: Arc<dyn ChunkIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        min_similarity: f32,
    ) -> Self {
        Self {
            index,
            embedder,
            min_similarity,
        }
    }

    /// Retrieve up to `k` chunks for `question`.
    ///
    /// An empty index or no chunk reaching the similarity floor yields an
    /// empty result, not an error.
    ///
    /// # Errors
    /// - `InvalidQuery` when the question is blank or `k` is zero
    /// - embedding failures as reported by the provider
    /// - index faults as `Knowledge`
    pub async fn retrieve(&self, question: &str, k: usize) -> AppResult<RetrievalResult> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::InvalidQuery("Question cannot be empty".to_string()));
        }
        if k == 0 {
            return Err(AppError::InvalidQuery(
                "Number of passages to retrieve must be at least 1".to_string(),
            ));
        }

        if self.index.count().await? == 0 {
            tracing::info!("Chunk index is empty");
            return Ok(RetrievalResult::empty());
        }

        let query_embedding = self.embedder.embed(question).await?;
        let ranked = self.index.similarity_search(&query_embedding, k).await?;

        if !ranked.is_empty() {
            let all_scores: Vec<f32> = ranked.iter().map(|(_, s)| *s).collect();
            tracing::debug!(
                "Retrieved {} chunks before filtering - scores: {:?}",
                ranked.len(),
                all_scores
            );
        }

        let mut seen = HashSet::new();
        let mut items = Vec::new();
        for (id, score) in ranked {
            if score < self.min_similarity || !seen.insert(id.clone()) {
                continue;
            }
            let chunk = self.index.fetch_chunk(&id).await?;
            items.push(ScoredChunk { chunk, score });
        }

        let result = RetrievalResult::new(items);

        match result.max_score() {
            Some(top) => tracing::info!(
                chunks = result.len(),
                top_score = top,
                "Retrieved relevant chunks"
            ),
            None => tracing::info!(
                min_similarity = self.min_similarity,
                "No relevant chunks found"
            ),
        }

        Ok(result)
    }
}
