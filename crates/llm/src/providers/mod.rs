//! LLM provider implementations.

pub mod ollama;
pub mod watsonx;

pub use ollama::OllamaClient;
pub use watsonx::WatsonxClient;

use relnotes_core::AppError;
use reqwest::StatusCode;

/// Map a reqwest transport error onto the backend error taxonomy.
pub fn transport_error(provider: &str, err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::BackendTimeout(format!("{} request timed out", provider))
    } else if err.is_connect() {
        AppError::BackendUnavailable(format!("{} is unreachable: {}", provider, err))
    } else {
        AppError::Llm(format!("{} request failed: {}", provider, err))
    }
}

/// Map a non-success HTTP status onto the backend error taxonomy.
pub fn status_error(provider: &str, status: StatusCode, body: &str) -> AppError {
    if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
        AppError::BackendTimeout(format!("{} API timed out ({})", provider, status))
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        AppError::BackendUnavailable(format!("{} API error ({}): {}", provider, status, body))
    } else {
        AppError::Llm(format!("{} API error ({}): {}", provider, status, body))
    }
}
