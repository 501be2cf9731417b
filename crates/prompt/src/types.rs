//! Prompt types for answer synthesis.
//!
//! This module defines the prompt definition loaded from YAML (or the
//! built-in default), the inputs rendered into it, and the built result.

use serde::{Deserialize, Serialize};

/// A prompt definition loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Creator identifier
    #[serde(rename = "createdBy", default)]
    pub created_by: String,

    /// Optional system instructions sent alongside the rendered template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Template string with Handlebars syntax
    pub template: String,
}

/// One grounding passage as it appears in the prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptPassage {
    /// Citation marker the model must use for this passage
    pub marker: usize,
    pub title: String,
    pub url: String,
    pub text: String,
}

/// One prior exchange replayed for multi-turn coherence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptTurn {
    pub question: String,
    pub answer: String,
}

/// A fully built prompt ready for LLM execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// System message (optional)
    pub system: Option<String>,

    /// User message (required)
    pub user: String,

    /// Metadata about the built prompt
    pub metadata: BuiltPromptMetadata,
}

/// Metadata about a built prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuiltPromptMetadata {
    /// Source prompt ID
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,

    /// Template version the prompt was rendered from
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Number of passages rendered
    #[serde(rename = "passageCount")]
    pub passage_count: usize,

    /// Number of history turns rendered
    #[serde(rename = "historyTurns")]
    pub history_turns: usize,
}

impl BuiltPrompt {
    /// Create a new built prompt.
    pub fn new(
        system: Option<String>,
        user: String,
        definition: &PromptDefinition,
        passage_count: usize,
        history_turns: usize,
    ) -> Self {
        Self {
            system,
            user,
            metadata: BuiltPromptMetadata {
                source_prompt_id: definition.id.clone(),
                api_version: definition.api_version.clone(),
                passage_count,
                history_turns,
            },
        }
    }
}
