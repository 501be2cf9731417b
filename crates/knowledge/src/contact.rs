//! Contact collection after an escalation.
//!
//! Users whose question could not be answered leave a name, email and
//! organization; the submission is validated and appended to the contact
//! ledger for the support team.

use crate::escalation::{append_line, read_jsonl};
use crate::rag::types::ReasonCode;
use chrono::{DateTime, Utc};
use regex_lite::Regex;
use relnotes_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Status given to every new submission.
pub const STATUS_NEW: &str = "New";

/// Shown to the user once the contact is logged.
pub const CONTACT_LOGGED_MESSAGE: &str = "Contact information logged successfully. Our support team will reach out to you within 24-48 hours.";

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

fn email_regex() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(EMAIL_PATTERN).ok()).as_ref()
}

/// Name, email and organization as entered by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactDetails {
    pub name: String,
    pub email: String,
    pub organization: String,
}

/// One contact ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContactSubmission {
    pub name: String,
    pub email: String,
    pub organization: String,
    pub original_question: String,
    pub reason: Option<ReasonCode>,
    pub conversation_id: Option<String>,
    pub status: String,
    pub submitted_at: DateTime<Utc>,
}

pub fn is_valid_email(email: &str) -> bool {
    !email.is_empty() && email_regex().is_some_and(|re| re.is_match(email))
}

/// Validate contact fields, returning every problem found.
pub fn validate_contact(name: &str, email: &str, organization: &str) -> Vec<String> {
    let mut errors = Vec::new();

    if name.trim().is_empty() {
        errors.push("Name is required".to_string());
    }

    if email.trim().is_empty() {
        errors.push("Email is required".to_string());
    } else if !is_valid_email(email.trim()) {
        errors.push("Invalid email format".to_string());
    }

    if organization.trim().is_empty() {
        errors.push("Organization is required".to_string());
    }

    errors
}

/// Parse `Name | Email | Organization`.
pub fn parse_contact_line(line: &str) -> AppResult<ContactDetails> {
    let parts: Vec<&str> = line.split('|').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(AppError::InvalidQuery(
            "Contact information must be in format: Name | Email | Organization".to_string(),
        ));
    }

    Ok(ContactDetails {
        name: parts[0].to_string(),
        email: parts[1].to_string(),
        organization: parts[2].to_string(),
    })
}

/// Append-only JSONL contact ledger.
pub struct ContactLedger {
    path: PathBuf,
}

impl ContactLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn for_workspace(workspace: &Path) -> Self {
        Self::new(crate::config::get_contacts_path(workspace))
    }

    /// Validate and log a contact submission.
    ///
    /// # Errors
    /// `InvalidQuery` listing every validation problem, or `Ledger` when the
    /// file cannot be written.
    pub fn log_contact(
        &self,
        details: &ContactDetails,
        original_question: &str,
        reason: Option<ReasonCode>,
        conversation_id: Option<&str>,
    ) -> AppResult<ContactSubmission> {
        let errors = validate_contact(&details.name, &details.email, &details.organization);
        if !errors.is_empty() {
            return Err(AppError::InvalidQuery(errors.join("; ")));
        }

        let submission = ContactSubmission {
            name: details.name.trim().to_string(),
            email: details.email.trim().to_string(),
            organization: details.organization.trim().to_string(),
            original_question: original_question.to_string(),
            reason,
            conversation_id: conversation_id.map(str::to_string),
            status: STATUS_NEW.to_string(),
            submitted_at: Utc::now(),
        };

        let line = serde_json::to_string(&submission)?;
        append_line(&self.path, &line)?;

        // Contact details are personal data; keep them out of the logs
        tracing::info!(
            reason = ?submission.reason,
            conversation_id = ?submission.conversation_id,
            "Logged contact submission"
        );
        Ok(submission)
    }

    pub fn list(&self) -> AppResult<Vec<ContactSubmission>> {
        read_jsonl(&self.path)
    }
}
