//! Grounded answer synthesis.
//!
//! Renders the grounding prompt, calls the language-model backend under a
//! deadline, retries once on transient failure and parses the reply.

use crate::rag::parse::{parse_answer, refusal_text};
use crate::rag::types::{Answer, GroundingContext, SynthesisOutcome};
use crate::session::ConversationTurn;
use relnotes_core::{AppError, AppResult};
use relnotes_llm::{LlmClient, LlmRequest};
use relnotes_prompt::{build_prompt, PromptDefinition, PromptPassage, PromptTurn};
use std::sync::Arc;
use std::time::Duration;

/// Attempts per synthesis: the first call plus one retry.
const MAX_ATTEMPTS: u32 = 2;

/// Synthesis settings drawn from the pipeline config.
#[derive(Debug, Clone)]
pub struct SynthesisSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
    pub retry_backoff: Duration,
    pub history_window: usize,
}

/// Turns a question, its grounding context and history into an [`Answer`].
pub struct Synthesizer {
    client: Arc<dyn LlmClient>,
    prompt: PromptDefinition,
    settings: SynthesisSettings,
}

impl Synthesizer {
    pub fn new(
        client: Arc<dyn LlmClient>,
        prompt: PromptDefinition,
        settings: SynthesisSettings,
    ) -> Self {
        Self {
            client,
            prompt,
            settings,
        }
    }

    /// Build the request sent to the backend.
    ///
    /// Only the last `history_window` turns are replayed.
    pub fn build_request(
        &self,
        question: &str,
        context: &GroundingContext,
        history: &[ConversationTurn],
    ) -> AppResult<LlmRequest> {
        let passages: Vec<PromptPassage> = context
            .passages()
            .iter()
            .map(|p| PromptPassage {
                marker: p.marker,
                title: p.chunk.source_title.clone(),
                url: p.chunk.source_url.clone(),
                text: p.chunk.text.clone(),
            })
            .collect();

        let start = history.len().saturating_sub(self.settings.history_window);
        let turns: Vec<PromptTurn> = history[start..]
            .iter()
            .map(|turn| PromptTurn {
                question: turn.question.clone(),
                answer: turn.answer_text(),
            })
            .collect();

        let built = build_prompt(&self.prompt, question, &passages, &turns)?;

        let mut request = LlmRequest::new(built.user, self.settings.model.clone())
            .with_max_tokens(self.settings.max_tokens)
            .with_temperature(self.settings.temperature);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }
        Ok(request)
    }

    /// Synthesize an answer.
    ///
    /// An empty context yields a refusal without calling the backend.
    /// Backend failures never escape as errors: once the retry budget is
    /// spent the outcome is [`SynthesisOutcome::Failed`].
    ///
    /// # Errors
    /// Only prompt rendering failures, which are configuration faults.
    pub async fn synthesize(
        &self,
        question: &str,
        context: &GroundingContext,
        history: &[ConversationTurn],
    ) -> AppResult<SynthesisOutcome> {
        if context.is_empty() {
            tracing::info!("Empty grounding context, skipping backend call");
            return Ok(SynthesisOutcome::Answered(Answer {
                text: refusal_text(question).to_string(),
                citations: Vec::new(),
                confidence: 0.0,
                self_reported_confidence: None,
                coverage: 0.0,
                refusal: true,
            }));
        }

        let request = self.build_request(question, context, history)?;
        tracing::trace!(prompt = %request.prompt, "Synthesis prompt");

        let mut attempt = 0;
        loop {
            attempt += 1;

            match self.call_backend(&request).await {
                Ok(raw) => {
                    let answer = parse_answer(&raw, context);
                    tracing::info!(
                        provider = self.client.provider_name(),
                        attempt,
                        citations = ?answer.citations,
                        confidence = answer.confidence,
                        coverage = answer.coverage,
                        refusal = answer.refusal,
                        "Synthesized answer"
                    );
                    return Ok(SynthesisOutcome::Answered(answer));
                }
                Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        attempt,
                        max_attempts = MAX_ATTEMPTS,
                        backoff_ms = self.settings.retry_backoff.as_millis() as u64,
                        error = %e,
                        "Synthesis failed, retrying"
                    );
                    tokio::time::sleep(self.settings.retry_backoff).await;
                }
                Err(e) => {
                    tracing::error!(attempt, error = %e, "Synthesis failed");
                    return Ok(SynthesisOutcome::Failed {
                        reason: AppError::SynthesisFailed(e.to_string()).to_string(),
                        attempts: attempt,
                    });
                }
            }
        }
    }

    async fn call_backend(&self, request: &LlmRequest) -> AppResult<String> {
        let response = tokio::time::timeout(self.settings.timeout, self.client.complete(request))
            .await
            .map_err(|_| {
                AppError::BackendTimeout(format!(
                    "{} did not answer within {}s",
                    self.client.provider_name(),
                    self.settings.timeout.as_secs_f32()
                ))
            })??;

        tracing::debug!(
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            "Backend usage"
        );

        Ok(response.content)
    }
}
