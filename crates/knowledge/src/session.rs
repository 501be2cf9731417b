//! Per-conversation turn history.
//!
//! Each session sits behind its own async mutex, so requests for the same
//! conversation serialize while different conversations proceed in
//! parallel. The registry map is only locked long enough to find or create
//! a session slot.

use crate::rag::types::{Citation, ReasonCode};
use chrono::{DateTime, Utc};
use relnotes_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// What a turn produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnOutcome {
    Answered { text: String },
    Escalated { reason: ReasonCode },
}

/// One question and what the pipeline produced for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationTurn {
    pub question: String,
    pub outcome: TurnOutcome,
    pub citations: Vec<Citation>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn answered(question: &str, text: &str, citations: Vec<Citation>) -> Self {
        Self {
            question: question.to_string(),
            outcome: TurnOutcome::Answered {
                text: text.to_string(),
            },
            citations,
            timestamp: Utc::now(),
        }
    }

    pub fn escalated(question: &str, reason: ReasonCode) -> Self {
        Self {
            question: question.to_string(),
            outcome: TurnOutcome::Escalated { reason },
            citations: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// The text replayed to the model as this turn's answer.
    pub fn answer_text(&self) -> String {
        match &self.outcome {
            TurnOutcome::Answered { text } => text.clone(),
            TurnOutcome::Escalated { reason } => {
                format!("(no answer given; escalated to support: {})", reason)
            }
        }
    }
}

/// Ordered turn history owned by one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    turns: Vec<ConversationTurn>,
    escalation_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    fn new(id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            turns: Vec::new(),
            escalation_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a turn. Turns are never edited once appended.
    pub fn push_turn(&mut self, turn: ConversationTurn) {
        if matches!(turn.outcome, TurnOutcome::Escalated { .. }) {
            self.escalation_count += 1;
        }
        self.updated_at = turn.timestamp;
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// The last `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> &[ConversationTurn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    pub fn escalation_count(&self) -> u32 {
        self.escalation_count
    }
}

/// Exclusive hold on one session for the duration of a request.
pub type SessionGuard = OwnedMutexGuard<Session>;

/// Registry of live sessions.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Arc<AsyncMutex<Session>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, session_id: &str, create: bool) -> AppResult<Option<Arc<AsyncMutex<Session>>>> {
        if session_id.trim().is_empty() {
            return Err(AppError::InvalidQuery("Session id cannot be empty".to_string()));
        }

        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| AppError::Other("Session registry lock poisoned".to_string()))?;

        if let Some(slot) = sessions.get(session_id) {
            return Ok(Some(Arc::clone(slot)));
        }

        if !create {
            return Ok(None);
        }

        tracing::debug!(session_id, "Creating session");
        let slot = Arc::new(AsyncMutex::new(Session::new(session_id)));
        sessions.insert(session_id.to_string(), Arc::clone(&slot));
        Ok(Some(slot))
    }

    /// Lock a session (creating it on first use) until the guard drops.
    pub async fn acquire(&self, session_id: &str) -> AppResult<SessionGuard> {
        let slot = self
            .slot(session_id, true)?
            .ok_or_else(|| AppError::Other("Session slot missing after creation".to_string()))?;
        Ok(slot.lock_owned().await)
    }

    /// Append a turn to a session.
    pub async fn append(&self, session_id: &str, turn: ConversationTurn) -> AppResult<()> {
        let mut session = self.acquire(session_id).await?;
        session.push_turn(turn);
        Ok(())
    }

    /// Full ordered history; empty for unknown sessions.
    pub async fn history(&self, session_id: &str) -> AppResult<Vec<ConversationTurn>> {
        self.recent(session_id, usize::MAX).await
    }

    /// The last `n` turns of a session, oldest first.
    pub async fn recent(&self, session_id: &str, n: usize) -> AppResult<Vec<ConversationTurn>> {
        match self.slot(session_id, false)? {
            Some(slot) => Ok(slot.lock().await.recent(n).to_vec()),
            None => Ok(Vec::new()),
        }
    }

    /// Ids of all live sessions, sorted.
    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = match self.sessions.lock() {
            Ok(sessions) => sessions.keys().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().keys().cloned().collect(),
        };
        ids.sort();
        ids
    }

    /// Drop an idle session, for an external expiry policy.
    ///
    /// Returns `false` and keeps the session while any request holds it or
    /// waits for it, so a committed turn never lands in a detached copy.
    pub fn remove(&self, session_id: &str) -> bool {
        let mut sessions = match self.sessions.lock() {
            Ok(sessions) => sessions,
            Err(poisoned) => poisoned.into_inner(),
        };

        // Requests clone the slot under this same lock, so the count is stable here
        let in_use = match sessions.get(session_id) {
            Some(slot) => Arc::strong_count(slot) > 1,
            None => return false,
        };
        if in_use {
            tracing::debug!(session_id, "Session in use; not removed");
            return false;
        }

        sessions.remove(session_id).is_some()
    }
}
