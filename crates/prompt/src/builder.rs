//! Prompt builder for rendering templates with grounding passages.

use crate::types::{BuiltPrompt, PromptDefinition, PromptPassage, PromptTurn};
use handlebars::Handlebars;
use relnotes_core::{AppError, AppResult};
use serde_json::json;

/// Build a prompt from a definition, the question, its passages and history.
///
/// This is a pure function: identical inputs render identical prompts, and
/// nothing outside the arguments is consulted.
///
/// # Example
/// ```no_run
/// use relnotes_prompt::{build_prompt, builtin_prompt, PromptPassage};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let passages = vec![PromptPassage {
///     marker: 1,
///     title: "2024.1 Release Notes".to_string(),
///     url: "https://docs.example.com/2024.1".to_string(),
///     text: "Adds SSO support.".to_string(),
/// }];
///
/// let built = build_prompt(&builtin_prompt(), "What changed in 2024.1?", &passages, &[])?;
/// println!("{}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    question: &str,
    passages: &[PromptPassage],
    history: &[PromptTurn],
) -> AppResult<BuiltPrompt> {
    tracing::debug!(
        prompt_id = %definition.id,
        passages = passages.len(),
        history = history.len(),
        "Building prompt"
    );

    let data = json!({
        "question": question,
        "passages": passages,
        "history": history,
    });

    let user = render_template(&definition.template, &data)?;

    Ok(BuiltPrompt::new(
        definition.system.clone(),
        user,
        definition,
        passages.len(),
        history.len(),
    ))
}

/// Render a Handlebars template with JSON data.
fn render_template(template: &str, data: &serde_json::Value) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Disable HTML escaping for plain text
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    let rendered = handlebars
        .render("prompt", data)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))?;

    Ok(rendered)
}
