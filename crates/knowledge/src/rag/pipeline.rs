//! The question answering pipeline.
//!
//! [`AnswerPipeline`] is built once at start-up and shared by every request
//! handler. One call runs validate, lock session, retrieve, assemble,
//! synthesize, evaluate and commit.

use crate::embeddings;
use crate::escalation::{EscalationSink, JsonlLedger};
use crate::index::SqliteIndex;
use crate::rag::context::assemble;
use crate::rag::guard::GuardPolicy;
use crate::rag::parse::is_spanish;
use crate::rag::synthesize::{SynthesisSettings, Synthesizer};
use crate::rag::types::{
    AnswerResponse, Citation, GroundingContext, GuardDecision, ReasonCode,
};
use crate::retriever::Retriever;
use crate::session::{ConversationTurn, SessionStore};
use chrono::Utc;
use relnotes_core::config::AppConfig;
use relnotes_core::{AppError, AppResult};
use relnotes_prompt::resolve_prompt;
use std::sync::Arc;
use std::time::Duration;

const ESCALATION_MESSAGE_EN: &str = "I don't have enough information to answer that question based on the available release notes. \
Please share your name, email and organization so our support team can follow up.";

const ESCALATION_MESSAGE_ES: &str = "No tengo suficiente información para responder esa pregunta basándome en las notas de versión disponibles. \
Por favor proporciona tu nombre, correo electrónico y organización para que nuestro equipo pueda ayudarte.";

/// The escalation notice in the question's language.
pub fn escalation_message(question: &str) -> &'static str {
    if is_spanish(question) {
        ESCALATION_MESSAGE_ES
    } else {
        ESCALATION_MESSAGE_EN
    }
}

/// Retrieval, assembly and commit settings.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub top_k: usize,
    pub context_budget_chars: usize,
    /// Longest the commit waits on the escalation sink before giving up
    pub sink_timeout: Duration,
}

pub struct AnswerPipeline {
    retriever: Retriever,
    synthesizer: Synthesizer,
    guard: GuardPolicy,
    sessions: Arc<SessionStore>,
    sink: Arc<dyn EscalationSink>,
    settings: PipelineSettings,
}

impl AnswerPipeline {
    pub fn new(
        retriever: Retriever,
        synthesizer: Synthesizer,
        guard: GuardPolicy,
        sessions: Arc<SessionStore>,
        sink: Arc<dyn EscalationSink>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            retriever,
            synthesizer,
            guard,
            sessions,
            sink,
            settings,
        }
    }

    /// Wire the pipeline from configuration.
    ///
    /// Opens the workspace index with the embedding provider it was built
    /// with, creates the configured completion client and resolves the
    /// answer prompt. Escalations go to the workspace JSONL ledger.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let pipeline = &config.pipeline;
        pipeline.validate()?;

        let workspace = config.workspace.as_path();
        let index_path = crate::config::get_index_path(workspace);
        if !index_path.exists() {
            tracing::warn!(
                "No chunk index at {:?}; every question will escalate until 'relnotes index load' runs",
                index_path
            );
        }
        let index = Arc::new(SqliteIndex::open(&index_path)?);
        let embedder = embeddings::load_provider(workspace)?;
        let retriever = Retriever::new(index, embedder, pipeline.min_similarity);

        let timeout = Duration::from_secs(pipeline.backend_timeout_secs);
        let provider_settings = config.get_provider_config(&config.provider);
        let api_key = config.resolve_api_key(&config.provider);
        let client = relnotes_llm::create_client(
            &config.provider,
            provider_settings.as_ref(),
            api_key.as_deref(),
            timeout,
        )
        .map_err(|e| AppError::Config(format!("Failed to create LLM client: {}", e)))?;

        let prompt = resolve_prompt(workspace, &pipeline.prompt_id)?;
        let synthesizer = Synthesizer::new(
            client,
            prompt,
            SynthesisSettings {
                model: config.model.clone(),
                max_tokens: pipeline.max_tokens,
                temperature: pipeline.temperature,
                timeout,
                retry_backoff: Duration::from_millis(pipeline.retry_backoff_ms),
                history_window: pipeline.history_window,
            },
        );

        tracing::info!(
            provider = %config.provider,
            model = %config.model,
            top_k = pipeline.top_k,
            min_similarity = pipeline.min_similarity,
            "Answer pipeline ready"
        );

        Ok(Self::new(
            retriever,
            synthesizer,
            GuardPolicy::new(pipeline.confidence_threshold),
            Arc::new(SessionStore::new()),
            Arc::new(JsonlLedger::for_workspace(workspace)),
            PipelineSettings {
                top_k: pipeline.top_k,
                context_budget_chars: pipeline.context_budget_chars,
                sink_timeout: Duration::from_millis(pipeline.sink_timeout_ms),
            },
        ))
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Answer one question within a conversation.
    ///
    /// # Errors
    /// - `InvalidQuery` for a blank question or session id
    /// - `Internal` with a correlation id for anything unexpected; the cause
    ///   is logged, not returned
    pub async fn answer_question(
        &self,
        session_id: &str,
        question: &str,
    ) -> AppResult<AnswerResponse> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::InvalidQuery("Question cannot be empty".to_string()));
        }
        if session_id.trim().is_empty() {
            return Err(AppError::InvalidQuery("Session id cannot be empty".to_string()));
        }

        match self.run(session_id, question).await {
            Ok(response) => Ok(response),
            Err(e) if e.is_client_error() => Err(e),
            Err(e) => {
                let correlation_id = uuid::Uuid::new_v4().to_string();
                tracing::error!(
                    correlation_id = %correlation_id,
                    session_id,
                    question,
                    timestamp = %Utc::now().to_rfc3339(),
                    error = %e,
                    "Unexpected failure answering question"
                );
                Err(AppError::Internal { correlation_id })
            }
        }
    }

    async fn run(&self, session_id: &str, question: &str) -> AppResult<AnswerResponse> {
        // Held until the turn is committed, so turns in one session never interleave
        let session = self.sessions.acquire(session_id).await?;

        let (decision, context) = match self
            .retriever
            .retrieve(question, self.settings.top_k)
            .await
        {
            Ok(result) => {
                let context = assemble(&result, self.settings.context_budget_chars);
                let outcome = self
                    .synthesizer
                    .synthesize(question, &context, session.turns())
                    .await?;
                let decision = self.guard.evaluate(&outcome, &context, question, session_id);
                (decision, context)
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(session_id, error = %e, "Query embedding backend exhausted");
                (
                    self.guard.backend_exhausted(question, session_id),
                    GroundingContext::default(),
                )
            }
            Err(e) => return Err(e),
        };

        let (response, turn, record) = match decision {
            GuardDecision::Accept(answer) => {
                let citations = resolve_citations(&answer.citations, &context);
                let turn = ConversationTurn::answered(question, &answer.text, citations.clone());
                let response = AnswerResponse::Answered {
                    text: answer.text,
                    citations,
                };
                (response, turn, None)
            }
            GuardDecision::Escalate(record) => {
                let response = escalated_response(question, record.reason);
                let turn = ConversationTurn::escalated(question, record.reason);
                (response, turn, Some(record))
            }
        };

        // Commit runs to completion even if the caller goes away mid-await
        let sink = Arc::clone(&self.sink);
        let sink_timeout = self.settings.sink_timeout;
        let commit = tokio::spawn(async move {
            let mut session = session;
            session.push_turn(turn);
            drop(session);
            if let Some(record) = record {
                match tokio::time::timeout(sink_timeout, sink.record(&record)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::error!(
                        escalation_id = %record.id,
                        session_id = %record.conversation_id,
                        error = %e,
                        "Failed to record escalation"
                    ),
                    Err(_) => tracing::error!(
                        escalation_id = %record.id,
                        session_id = %record.conversation_id,
                        timeout_ms = sink_timeout.as_millis() as u64,
                        "Escalation sink timed out"
                    ),
                }
            }
        });
        commit
            .await
            .map_err(|e| AppError::Other(format!("Commit task failed: {}", e)))?;

        Ok(response)
    }
}

fn escalated_response(question: &str, reason: ReasonCode) -> AnswerResponse {
    AnswerResponse::Escalated {
        reason_code: reason,
        prompt_for_contact: true,
        message: escalation_message(question).to_string(),
    }
}

/// Map markers to their sources, in the order the answer cites them.
fn resolve_citations(markers: &[usize], context: &GroundingContext) -> Vec<Citation> {
    markers
        .iter()
        .filter_map(|marker| context.get(*marker))
        .map(|passage| Citation {
            marker: passage.marker,
            source_title: passage.chunk.source_title.clone(),
            source_url: passage.chunk.source_url.clone(),
        })
        .collect()
}
