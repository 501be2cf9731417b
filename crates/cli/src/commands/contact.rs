//! Contact command handler.

use clap::Args;
use relnotes_core::{config::AppConfig, AppResult};
use relnotes_knowledge::contact::CONTACT_LOGGED_MESSAGE;
use relnotes_knowledge::{ContactDetails, ContactLedger, ReasonCode};

/// Leave contact details for a question that could not be answered
#[derive(Args, Debug)]
pub struct ContactCommand {
    /// Your name
    #[arg(long)]
    pub name: String,

    /// Your email address
    #[arg(long)]
    pub email: String,

    /// Your organization
    #[arg(long)]
    pub organization: String,

    /// The question that was escalated
    #[arg(long)]
    pub question: String,

    /// Conversation id the question was asked in
    #[arg(short, long)]
    pub session: Option<String>,

    /// Escalation reason code
    #[arg(long, value_parser = parse_reason)]
    pub reason: Option<ReasonCode>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ContactCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing contact command");

        let details = ContactDetails {
            name: self.name.clone(),
            email: self.email.clone(),
            organization: self.organization.clone(),
        };

        let ledger = ContactLedger::for_workspace(&config.workspace);
        let submission = ledger.log_contact(
            &details,
            &self.question,
            self.reason,
            self.session.as_deref(),
        )?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&submission)?);
        } else {
            println!("{}", CONTACT_LOGGED_MESSAGE);
        }

        Ok(())
    }
}

fn parse_reason(s: &str) -> Result<ReasonCode, String> {
    ReasonCode::parse(s).ok_or_else(|| {
        format!(
            "unknown reason '{}' (expected no_relevant_chunks, low_confidence, ungrounded_claims or model_refusal)",
            s
        )
    })
}
