//! Answer pipeline types.

use crate::types::Chunk;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A chunk selected for the prompt, tagged with its citation marker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CitedPassage {
    /// 1-based marker, unique within one grounding context
    pub marker: usize,
    pub chunk: Chunk,
    pub score: f32,
}

/// Ordered, distinct chunks selected for one answer-generation call.
///
/// Markers are assigned 1, 2, 3, ... in inclusion order, so the mapping
/// from marker to chunk is injective for the lifetime of the context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroundingContext {
    passages: Vec<CitedPassage>,
}

impl GroundingContext {
    /// Build a context from chunks in inclusion order, assigning markers.
    pub fn from_chunks(chunks: impl IntoIterator<Item = (Chunk, f32)>) -> Self {
        let passages = chunks
            .into_iter()
            .enumerate()
            .map(|(i, (chunk, score))| CitedPassage {
                marker: i + 1,
                chunk,
                score,
            })
            .collect();
        Self { passages }
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn passages(&self) -> &[CitedPassage] {
        &self.passages
    }

    pub fn markers(&self) -> Vec<usize> {
        self.passages.iter().map(|p| p.marker).collect()
    }

    pub fn contains_marker(&self, marker: usize) -> bool {
        self.get(marker).is_some()
    }

    pub fn get(&self, marker: usize) -> Option<&CitedPassage> {
        self.passages.iter().find(|p| p.marker == marker)
    }

    /// Total characters of passage text.
    pub fn text_chars(&self) -> usize {
        self.passages.iter().map(|p| p.chunk.text.chars().count()).sum()
    }
}

/// A synthesized answer, before the guard has judged it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    /// Answer text with the confidence line removed
    pub text: String,

    /// Every marker the text references, in first-seen order, including
    /// markers absent from the context
    pub citations: Vec<usize>,

    /// Derived confidence in [0, 1]
    pub confidence: f32,

    /// Confidence the model reported, if it did
    pub self_reported_confidence: Option<f32>,

    /// Fraction of sentences carrying a marker present in the context
    pub coverage: f32,

    /// The model declared it cannot answer from the context
    pub refusal: bool,
}

/// Outcome of the synthesis step handed to the guard.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisOutcome {
    Answered(Answer),

    /// The backend kept failing after the retry budget was spent.
    Failed { reason: String, attempts: u32 },
}

/// Why a question was escalated to human contact collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    NoRelevantChunks,
    LowConfidence,
    UngroundedClaims,
    ModelRefusal,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoRelevantChunks => "no_relevant_chunks",
            Self::LowConfidence => "low_confidence",
            Self::UngroundedClaims => "ungrounded_claims",
            Self::ModelRefusal => "model_refusal",
        }
    }

    /// Parse a snake_case reason code.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "no_relevant_chunks" => Some(Self::NoRelevantChunks),
            "low_confidence" => Some(Self::LowConfidence),
            "ungrounded_claims" => Some(Self::UngroundedClaims),
            "model_refusal" => Some(Self::ModelRefusal),
            _ => None,
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured escalation emitted by the guard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EscalationRecord {
    pub id: uuid::Uuid,
    pub question: String,
    pub reason: ReasonCode,
    pub timestamp: DateTime<Utc>,
    pub conversation_id: String,
}

impl EscalationRecord {
    /// Only the guard creates escalation records.
    pub(crate) fn new(question: &str, reason: ReasonCode, conversation_id: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            question: question.to_string(),
            reason,
            timestamp: Utc::now(),
            conversation_id: conversation_id.to_string(),
        }
    }
}

/// The guard's verdict.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardDecision {
    Accept(Answer),
    Escalate(EscalationRecord),
}

/// A citation resolved to its source, as shown to the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub marker: usize,
    pub source_title: String,
    pub source_url: String,
}

/// Response of one `answer_question` call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AnswerResponse {
    Answered {
        text: String,
        citations: Vec<Citation>,
    },
    Escalated {
        #[serde(rename = "reasonCode")]
        reason_code: ReasonCode,
        #[serde(rename = "promptForContact")]
        prompt_for_contact: bool,
        message: String,
    },
}

impl AnswerResponse {
    pub fn is_escalated(&self) -> bool {
        matches!(self, Self::Escalated { .. })
    }
}
