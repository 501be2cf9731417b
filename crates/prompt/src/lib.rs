//! Prompt system for relnotes answer synthesis.
//!
//! This crate provides structured prompt management with:
//! - A versioned built-in grounded answer prompt
//! - YAML overrides under `.relnotes/prompts/`
//! - Handlebars template rendering of passages and history

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use loader::{
    builtin_prompt, load_prompt, resolve_prompt, validate_prompt, DEFAULT_PROMPT_ID,
    INSUFFICIENT_CONTEXT,
};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition, PromptPassage, PromptTurn};
