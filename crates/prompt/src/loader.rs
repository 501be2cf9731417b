//! Prompt loader for YAML prompt definitions and the built-in default.

use crate::types::PromptDefinition;
use relnotes_core::{AppError, AppResult};
use std::path::Path;

/// Identifier of the built-in grounded answer prompt.
pub const DEFAULT_PROMPT_ID: &str = "relnotes.answer.grounded";

/// Exact reply the model is told to give when the context cannot answer.
pub const INSUFFICIENT_CONTEXT: &str = "INSUFFICIENT_CONTEXT";

const DEFAULT_SYSTEM: &str = "You are a release notes assistant. You answer questions about \
product releases using only the documentation passages you are given.";

const DEFAULT_TEMPLATE: &str = r#"Answer the question using ONLY the numbered context passages below.

Rules:
- Cite every factual claim with the marker of the passage that supports it, for example [1] or [2][3].
- Never cite a marker that does not appear in the context.
- If the context is empty or does not contain the answer, reply with exactly: INSUFFICIENT_CONTEXT
- Answer in the same language as the question.
- End with a final line of the form "CONFIDENCE: <number between 0 and 1>".
{{#if history}}

Conversation so far:
{{#each history}}
User: {{this.question}}
Assistant: {{this.answer}}
{{/each}}
{{/if}}

Context:
{{#each passages}}
[{{this.marker}}] {{this.title}} ({{this.url}})
{{this.text}}

{{/each}}
Question: {{question}}
Answer:"#;

/// The versioned built-in answer prompt.
pub fn builtin_prompt() -> PromptDefinition {
    PromptDefinition {
        id: DEFAULT_PROMPT_ID.to_string(),
        title: "Grounded release notes answer".to_string(),
        api_version: "1.0".to_string(),
        created_by: "relnotes".to_string(),
        system: Some(DEFAULT_SYSTEM.to_string()),
        template: DEFAULT_TEMPLATE.to_string(),
    }
}

/// Load a prompt definition by ID from the workspace.
///
/// This function searches for a prompt file named `<id>.yml` in the
/// `.relnotes/prompts/` directory.
///
/// # Example
/// ```no_run
/// use relnotes_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), "relnotes.answer.grounded")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompt_path(workspace_path, prompt_id);

    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    if !prompt_file.exists() {
        return Err(AppError::Prompt(format!(
            "Prompt file not found: {:?}",
            prompt_file
        )));
    }

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_prompt(&definition)?;

    if definition.id != prompt_id {
        return Err(AppError::Prompt(format!(
            "Prompt file {:?} declares id '{}', expected '{}'",
            prompt_file, definition.id, prompt_id
        )));
    }

    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// Resolve the prompt used for synthesis.
///
/// A workspace override wins; otherwise the built-in default is used when
/// the requested id matches it.
pub fn resolve_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    if prompt_path(workspace_path, prompt_id).exists() {
        return load_prompt(workspace_path, prompt_id);
    }

    if prompt_id == DEFAULT_PROMPT_ID {
        tracing::debug!("Using built-in prompt {}", DEFAULT_PROMPT_ID);
        return Ok(builtin_prompt());
    }

    Err(AppError::Prompt(format!(
        "Unknown prompt '{}': no override in .relnotes/prompts and no built-in with that id",
        prompt_id
    )))
}

fn prompt_path(workspace_path: &Path, prompt_id: &str) -> std::path::PathBuf {
    workspace_path
        .join(".relnotes/prompts")
        .join(format!("{}.yml", prompt_id))
}

/// Validate a prompt definition.
pub fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.api_version.is_empty() {
        return Err(AppError::Prompt(
            "Prompt apiVersion cannot be empty".to_string(),
        ));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    let well_formed = def
        .api_version
        .split_once('.')
        .map(|(major, minor)| {
            !major.is_empty()
                && !minor.is_empty()
                && major.chars().all(|c| c.is_ascii_digit())
                && minor.chars().all(|c| c.is_ascii_digit())
        })
        .unwrap_or(false);

    if !well_formed {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}
