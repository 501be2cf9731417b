//! Chat command handler.
//!
//! Interactive multi-turn conversation on stdin. Every question in one chat
//! shares a session, so follow-ups see earlier turns. When a question is
//! escalated the user is offered to leave contact details right away.

use super::ask::render_response;
use clap::Args;
use relnotes_core::{config::AppConfig, AppResult};
use relnotes_knowledge::contact::{ContactSubmission, CONTACT_LOGGED_MESSAGE};
use relnotes_knowledge::{parse_contact_line, AnswerPipeline, AnswerResponse, ContactLedger, ReasonCode};
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

/// Chat about the release notes interactively
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Conversation id (default: a new conversation)
    #[arg(short, long)]
    pub session: Option<String>,
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let session_id = self.session.clone().unwrap_or_else(super::new_session_id);
        tracing::info!(session_id = %session_id, "Starting chat");

        let pipeline = AnswerPipeline::from_config(config)?;
        let ledger = ContactLedger::for_workspace(&config.workspace);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut out = std::io::stdout();

        writeln!(out, "Ask about the release notes. Type 'exit' to quit.")?;

        loop {
            prompt(&mut out, "> ")?;
            let Some(line) = lines.next_line().await? else {
                break;
            };

            let question = line.trim();
            if question.is_empty() {
                continue;
            }
            if matches!(question, "exit" | "quit") {
                break;
            }

            match pipeline.answer_question(&session_id, question).await {
                Ok(response) => {
                    writeln!(out, "{}\n", render_response(&response))?;

                    if let AnswerResponse::Escalated { reason_code, .. } = response {
                        collect_contact(
                            &mut lines,
                            &mut out,
                            &ledger,
                            question,
                            reason_code,
                            &session_id,
                        )
                        .await?;
                    }
                }
                Err(e) => eprintln!("Error: {}", e),
            }
        }

        tracing::info!(session_id = %session_id, "Chat ended");
        Ok(())
    }
}

fn prompt(out: &mut impl Write, text: &str) -> AppResult<()> {
    write!(out, "{}", text)?;
    out.flush()?;
    Ok(())
}

/// Ask for `Name | Email | Organization` until a valid entry is logged or
/// the user skips with an empty line.
async fn collect_contact<R, W>(
    lines: &mut Lines<R>,
    out: &mut W,
    ledger: &ContactLedger,
    question: &str,
    reason: ReasonCode,
    session_id: &str,
) -> AppResult<Option<ContactSubmission>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    loop {
        writeln!(
            out,
            "Leave your details as: Name | Email | Organization (press Enter to skip)"
        )?;
        prompt(out, "contact> ")?;

        let Some(line) = lines.next_line().await? else {
            return Ok(None);
        };
        let line = line.trim();
        if line.is_empty() {
            writeln!(out, "Skipped.\n")?;
            return Ok(None);
        }

        let logged = parse_contact_line(line).and_then(|details| {
            ledger.log_contact(&details, question, Some(reason), Some(session_id))
        });

        match logged {
            Ok(submission) => {
                writeln!(out, "{}\n", CONTACT_LOGGED_MESSAGE)?;
                return Ok(Some(submission));
            }
            Err(e) if e.is_client_error() => writeln!(out, "{}", e)?,
            Err(e) => return Err(e),
        }
    }
}
