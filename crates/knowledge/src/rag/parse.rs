//! Parsing raw model output into an [`Answer`].
//!
//! The model is asked to cite with `[n]` markers and to close with a
//! `CONFIDENCE: x` line. Nothing here trusts that it did: markers outside
//! the context are kept so the guard can see them, and a missing
//! confidence line falls back to citation coverage.

use crate::rag::types::{Answer, GroundingContext};
use regex_lite::Regex;
use relnotes_prompt::INSUFFICIENT_CONTEXT;
use std::sync::OnceLock;
use unicode_segmentation::UnicodeSegmentation;

/// English "cannot answer" reply.
pub const REFUSAL_EN: &str =
    "I don't have enough information to answer that question based on the available release notes.";

/// Spanish "cannot answer" reply.
pub const REFUSAL_ES: &str = "No tengo suficiente información para responder esa pregunta basándome en las notas de versión disponibles.";

const REFUSAL_PREFIXES: &[&str] = &[
    "i don't have enough information",
    "no tengo suficiente información",
];

const SPANISH_CUES: &[&str] = &[
    "qué", "cuáles", "cómo", "dónde", "cuándo", "por qué", "háblame", "dime", "explica",
    "describe",
];

fn marker_regex() -> Option<&'static Regex> {
    static MARKERS: OnceLock<Option<Regex>> = OnceLock::new();
    MARKERS
        .get_or_init(|| Regex::new(r"\[#?(\d+(?:\s*,\s*#?\d+)*)\]").ok())
        .as_ref()
}

/// Whether a question reads as Spanish.
pub fn is_spanish(question: &str) -> bool {
    let lower = question.to_lowercase();
    SPANISH_CUES.iter().any(|cue| lower.contains(cue))
}

/// The "cannot answer" reply in the question's language.
pub fn refusal_text(question: &str) -> &'static str {
    if is_spanish(question) {
        REFUSAL_ES
    } else {
        REFUSAL_EN
    }
}

/// Stands in for a cited number too large to represent. No context ever
/// holds this many passages, so the guard treats it as an absent marker.
pub const UNRESOLVABLE_MARKER: usize = usize::MAX;

/// Every citation marker in `text`, in order of appearance, repeats kept.
///
/// Numbers that overflow `usize` become [`UNRESOLVABLE_MARKER`].
pub fn extract_markers(text: &str) -> Vec<usize> {
    let Some(re) = marker_regex() else {
        return Vec::new();
    };

    re.captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .flat_map(|group| {
            group
                .as_str()
                .split(',')
                .map(|n| {
                    n.trim()
                        .trim_start_matches('#')
                        .parse::<usize>()
                        .unwrap_or(UNRESOLVABLE_MARKER)
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

fn strip_markers(text: &str) -> String {
    match marker_regex() {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_string(),
    }
}

/// Split off a trailing `CONFIDENCE:` line.
///
/// Returns the remaining text and the parsed value, clamped to [0, 1].
/// Percentages are accepted.
fn split_confidence(raw: &str) -> (String, Option<f32>) {
    let lines: Vec<&str> = raw.lines().collect();
    let position = lines
        .iter()
        .rposition(|line| line.trim().to_lowercase().starts_with("confidence:"));

    let Some(position) = position else {
        return (raw.trim().to_string(), None);
    };

    let value = lines[position]
        .trim()
        .split_once(':')
        .map(|(_, rest)| rest.trim().trim_end_matches('.'))
        .and_then(|rest| match rest.strip_suffix('%') {
            Some(pct) => pct.trim().parse::<f32>().ok().map(|v| v / 100.0),
            None => rest.parse::<f32>().ok(),
        })
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 1.0));

    let text = lines
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != position)
        .map(|(_, line)| *line)
        .collect::<Vec<_>>()
        .join("\n");

    (text.trim().to_string(), value)
}

/// Whether the model declared it cannot answer.
pub fn is_refusal(text: &str) -> bool {
    if text.contains(INSUFFICIENT_CONTEXT) {
        return true;
    }
    let lower = text.trim().to_lowercase();
    REFUSAL_PREFIXES.iter().any(|prefix| lower.starts_with(prefix))
}

/// Fraction of sentences carrying at least one marker present in `context`.
///
/// A segment made only of markers (`"Adds SSO. [1]"`) counts toward the
/// sentence before it.
fn grounding_coverage(text: &str, context: &GroundingContext) -> f32 {
    let mut sentences: Vec<Vec<usize>> = Vec::new();

    for segment in text.unicode_sentences() {
        if segment.trim().is_empty() {
            continue;
        }

        let markers = extract_markers(segment);
        let marker_only = strip_markers(segment)
            .chars()
            .all(|c| c.is_whitespace() || c.is_ascii_punctuation());

        match sentences.last_mut() {
            Some(previous) if marker_only && !markers.is_empty() => previous.extend(markers),
            _ if marker_only => {}
            _ => sentences.push(markers),
        }
    }

    if sentences.is_empty() {
        return 0.0;
    }

    let grounded = sentences
        .iter()
        .filter(|markers| markers.iter().any(|m| context.contains_marker(*m)))
        .count();

    grounded as f32 / sentences.len() as f32
}

/// Parse raw model output against the context it was generated from.
pub fn parse_answer(raw: &str, context: &GroundingContext) -> Answer {
    let (text, self_reported) = split_confidence(raw);
    let refusal = is_refusal(&text);

    let mut citations = Vec::new();
    for marker in extract_markers(&text) {
        if !citations.contains(&marker) {
            citations.push(marker);
        }
    }

    let coverage = if refusal {
        0.0
    } else {
        grounding_coverage(&text, context)
    };

    let confidence = match self_reported {
        Some(reported) => (reported + coverage) / 2.0,
        None => coverage,
    };

    Answer {
        text,
        citations,
        confidence,
        self_reported_confidence: self_reported,
        coverage,
        refusal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Chunk;

    fn context(n: usize) -> GroundingContext {
        GroundingContext::from_chunks((0..n).map(|i| {
            (
                Chunk {
                    id: format!("c{}", i),
                    text: format!("passage {}", i),
                    source_id: "s".to_string(),
                    source_url: "https://docs.example.com".to_string(),
                    source_title: "Notes".to_string(),
                    position: i as u32,
                    ordinal: i as u64,
                },
                0.9,
            )
        }))
    }

    #[test]
    fn test_marker_forms() {
        assert_eq!(extract_markers("a [1] b [#2] c [3, 4] d [1][5]"), vec![1, 2, 3, 4, 1, 5]);
        assert!(extract_markers("version [beta] and [ ]").is_empty());
    }

    #[test]
    fn test_oversized_marker_is_kept_as_unresolvable() {
        assert_eq!(
            extract_markers("SSO [1] [99999999999999999999999]"),
            vec![1, UNRESOLVABLE_MARKER]
        );

        let answer = parse_answer(
            "Version 2024.1 adds SSO login [1] [99999999999999999999999].\nCONFIDENCE: 0.9",
            &context(2),
        );
        assert_eq!(answer.citations, vec![1, UNRESOLVABLE_MARKER]);
        assert!(!context(2).contains_marker(UNRESOLVABLE_MARKER));
    }

    #[test]
    fn test_confidence_line_removed_and_parsed() {
        let (text, value) = split_confidence("Adds SSO [1].\nCONFIDENCE: 0.8");
        assert_eq!(text, "Adds SSO [1].");
        assert_eq!(value, Some(0.8));

        assert_eq!(split_confidence("x\nconfidence: 85%").1, Some(0.85));
        assert_eq!(split_confidence("x\nConfidence: 7").1, Some(1.0));
        assert_eq!(split_confidence("x\nConfidence: high").1, None);
        assert_eq!(split_confidence("no line").1, None);
    }

    #[test]
    fn test_fully_cited_answer() {
        let answer = parse_answer(
            "Version 2024.1 adds SSO [1]. It also fixes CSV export [2].\nCONFIDENCE: 0.9",
            &context(2),
        );

        assert_eq!(answer.citations, vec![1, 2]);
        assert_eq!(answer.coverage, 1.0);
        assert!((answer.confidence - 0.95).abs() < 1e-6);
        assert!(!answer.refusal);
        assert!(!answer.text.contains("CONFIDENCE"));
    }

    #[test]
    fn test_trailing_marker_segment_attaches_to_previous_sentence() {
        let answer = parse_answer("Adds SSO. [1]", &context(1));
        assert_eq!(answer.coverage, 1.0);
    }

    #[test]
    fn test_partial_coverage_without_self_report() {
        let answer = parse_answer("Adds SSO [1]. Also improves speed.", &context(1));
        assert_eq!(answer.coverage, 0.5);
        assert_eq!(answer.confidence, 0.5);
    }

    #[test]
    fn test_absent_markers_kept_but_not_counted() {
        let answer = parse_answer("Adds SSO [3].", &context(2));
        assert_eq!(answer.citations, vec![3]);
        assert_eq!(answer.coverage, 0.0);
    }

    #[test]
    fn test_refusals() {
        assert!(parse_answer("INSUFFICIENT_CONTEXT", &context(1)).refusal);
        assert!(parse_answer(REFUSAL_EN, &context(1)).refusal);
        assert!(parse_answer(REFUSAL_ES, &context(1)).refusal);
        assert!(!parse_answer("Adds SSO [1].", &context(1)).refusal);
    }

    #[test]
    fn test_language_detection() {
        assert!(is_spanish("¿Qué cambió en la versión 2024.1?"));
        assert!(!is_spanish("What changed in 2024.1?"));
        assert_eq!(refusal_text("Dime las novedades"), REFUSAL_ES);
    }
}
