//! Ask command handler.
//!
//! Sends one question through the answering pipeline and prints either the
//! grounded answer with its sources or the escalation notice.

use clap::Args;
use relnotes_core::{config::AppConfig, AppResult};
use relnotes_knowledge::{AnswerPipeline, AnswerResponse, ReasonCode};

/// Ask a question about the release notes
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Conversation id (default: a new conversation)
    #[arg(short, long)]
    pub session: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");

        let session_id = self.session.clone().unwrap_or_else(super::new_session_id);
        let pipeline = AnswerPipeline::from_config(config)?;
        let response = pipeline.answer_question(&session_id, &self.question).await?;

        if self.json {
            let output = serde_json::json!({
                "sessionId": session_id,
                "response": response,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        println!("{}", render_response(&response));

        if let AnswerResponse::Escalated { reason_code, .. } = &response {
            println!();
            println!("{}", contact_hint(&self.question, &session_id, *reason_code));
        }

        Ok(())
    }
}

/// Human-readable form of a pipeline response.
pub(crate) fn render_response(response: &AnswerResponse) -> String {
    match response {
        AnswerResponse::Answered { text, citations } => {
            let mut out = text.clone();
            if !citations.is_empty() {
                out.push_str("\n\nSources:");
                for citation in citations {
                    out.push_str(&format!(
                        "\n[{}] {} ({})",
                        citation.marker, citation.source_title, citation.source_url
                    ));
                }
            }
            out
        }
        AnswerResponse::Escalated { message, .. } => message.clone(),
    }
}

/// How to leave contact details for an escalated question.
fn contact_hint(question: &str, session_id: &str, reason: ReasonCode) -> String {
    format!(
        "To be contacted by support, run:\n  relnotes contact --name <NAME> --email <EMAIL> --organization <ORG> \\\n    --question {:?} --session {} --reason {}",
        question, session_id, reason
    )
}
