//! Grounding context assembly.

use crate::rag::types::GroundingContext;
use crate::types::RetrievalResult;
use std::collections::HashSet;

/// Select chunks for the prompt within a character budget.
///
/// Chunks are taken whole, in score order, until the next one would push the
/// total past `budget_chars`. Repeated ids and verbatim-duplicate texts are
/// skipped. The top chunk is always included, even when it alone exceeds the
/// budget, so a non-empty retrieval never yields an empty context.
pub fn assemble(result: &RetrievalResult, budget_chars: usize) -> GroundingContext {
    let mut seen_ids = HashSet::new();
    let mut seen_texts = HashSet::new();
    let mut used = 0usize;
    let mut selected = Vec::new();

    for item in result.iter() {
        if !seen_ids.insert(item.chunk.id.as_str()) || !seen_texts.insert(item.chunk.text.trim()) {
            tracing::debug!(chunk_id = %item.chunk.id, "Skipping duplicate chunk");
            continue;
        }

        let len = item.chunk.text.chars().count();
        if !selected.is_empty() && used + len > budget_chars {
            tracing::debug!(
                chunk_id = %item.chunk.id,
                used,
                budget_chars,
                "Context budget reached"
            );
            break;
        }

        used += len;
        selected.push((item.chunk.clone(), item.score));
    }

    let context = GroundingContext::from_chunks(selected);
    tracing::debug!(
        passages = context.len(),
        chars = used,
        "Assembled grounding context"
    );
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, ScoredChunk};

    fn scored(id: &str, text: &str, score: f32, ordinal: u64) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                id: id.to_string(),
                text: text.to_string(),
                source_id: "src".to_string(),
                source_url: format!("https://docs.example.com/{}", id),
                source_title: id.to_uppercase(),
                position: 0,
                ordinal,
            },
            score,
        }
    }

    #[test]
    fn test_empty_in_empty_out() {
        assert!(assemble(&RetrievalResult::empty(), 1000).is_empty());
    }

    #[test]
    fn test_markers_follow_score_order() {
        let result = RetrievalResult::new(vec![
            scored("low", "beta", 0.4, 0),
            scored("high", "alpha", 0.9, 1),
        ]);

        let context = assemble(&result, 1000);
        assert_eq!(context.get(1).unwrap().chunk.id, "high");
        assert_eq!(context.get(2).unwrap().chunk.id, "low");
    }

    #[test]
    fn test_budget_stops_at_first_overflow() {
        let result = RetrievalResult::new(vec![
            scored("a", &"a".repeat(40), 0.9, 0),
            scored("b", &"b".repeat(40), 0.8, 1),
            scored("c", &"c".repeat(10), 0.7, 2),
        ]);

        let context = assemble(&result, 60);
        let ids: Vec<_> = context.passages().iter().map(|p| p.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
        assert!(context.text_chars() <= 60);
    }

    #[test]
    fn test_oversized_top_chunk_still_included() {
        let result = RetrievalResult::new(vec![scored("big", &"x".repeat(500), 0.9, 0)]);
        let context = assemble(&result, 100);
        assert_eq!(context.len(), 1);
    }

    #[test]
    fn test_duplicate_texts_collapse() {
        let result = RetrievalResult::new(vec![
            scored("a", "Adds SSO.", 0.9, 0),
            scored("b", "Adds SSO.", 0.8, 1),
            scored("c", "Fixes export.", 0.7, 2),
        ]);

        let context = assemble(&result, 1000);
        assert_eq!(context.markers(), vec![1, 2]);
        assert_eq!(context.get(2).unwrap().chunk.id, "c");
    }
}
