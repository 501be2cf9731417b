//! Error types for relnotes.
//!
//! This module defines a unified error enum that covers every error category
//! in the application: configuration, I/O, backend (LLM and embedding)
//! failures, retrieval, prompts, ledgers and the user-facing pipeline errors.

use thiserror::Error;

/// Unified error type for relnotes.
///
/// All functions in the application return `Result<T, AppError>`.
/// We never panic; errors are represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Non-transient LLM provider errors (bad request, malformed response)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Index, embedding and retrieval errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The caller supplied an empty or malformed question
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A backend call exceeded its deadline
    #[error("Backend timeout: {0}")]
    BackendTimeout(String),

    /// A backend could not be reached or refused service
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Answer synthesis failed after retries
    #[error("Synthesis failed: {0}")]
    SynthesisFailed(String),

    /// Escalation or contact ledger write failures
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// Unexpected failure surfaced at the pipeline boundary.
    ///
    /// Only the correlation id is displayed; the cause is logged.
    #[error("Internal error (correlation id {correlation_id})")]
    Internal { correlation_id: String },

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether the error belongs to the retryable backend class.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::BackendTimeout(_) | AppError::BackendUnavailable(_)
        )
    }

    /// Whether the error is the caller's fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, AppError::InvalidQuery(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
