//! LLM provider factory.
//!
//! Builds the configured completion backend. Provider settings come from
//! the `llm.providers` section of `config.yaml`; secrets come from the
//! environment variables that section names.

use crate::client::LlmClient;
use crate::providers::watsonx::{DEFAULT_IAM_URL, DEFAULT_WATSONX_URL};
use crate::providers::{OllamaClient, WatsonxClient};
use crate::types::ProviderType;
use relnotes_core::config::ProviderConfig;
use std::sync::Arc;
use std::time::Duration;

/// Create an LLM client for the named provider.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama", "watsonx")
/// * `settings` - Provider section from config.yaml, if present
/// * `api_key` - API key override (watsonx only)
/// * `timeout` - HTTP timeout applied to every backend call
///
/// # Errors
/// Returns error if:
/// - Provider is unknown
/// - watsonx is selected without an API key or project id
pub fn create_client(
    provider: &str,
    settings: Option<&ProviderConfig>,
    api_key: Option<&str>,
    timeout: Duration,
) -> Result<Arc<dyn LlmClient>, String> {
    let provider_type =
        ProviderType::parse(provider).ok_or_else(|| format!("Unknown provider: {}", provider))?;

    match provider_type {
        ProviderType::Ollama => {
            let (base_url, timeout) = match settings {
                Some(ProviderConfig::Ollama {
                    endpoint,
                    timeout: Some(secs),
                    ..
                }) => (endpoint.as_str(), Duration::from_secs(*secs)),
                Some(ProviderConfig::Ollama { endpoint, .. }) => (endpoint.as_str(), timeout),
                _ => ("http://localhost:11434", timeout),
            };
            Ok(Arc::new(OllamaClient::with_timeout(base_url, timeout)))
        }
        ProviderType::Watsonx => {
            let Some(ProviderConfig::Watsonx {
                api_key_env,
                project_id_env,
                endpoint,
                iam_endpoint,
                ..
            }) = settings
            else {
                return Err("watsonx provider requires an llm.providers.watsonx section".to_string());
            };

            let api_key = match api_key {
                Some(key) => key.to_string(),
                None => std::env::var(api_key_env)
                    .map_err(|_| format!("watsonx provider requires API key in {}", api_key_env))?,
            };

            let project_id = std::env::var(project_id_env)
                .map_err(|_| format!("watsonx provider requires project id in {}", project_id_env))?;

            let client = WatsonxClient::with_endpoints(
                api_key,
                project_id,
                endpoint.as_deref().unwrap_or(DEFAULT_WATSONX_URL),
                iam_endpoint.as_deref().unwrap_or(DEFAULT_IAM_URL),
                timeout,
            );
            Ok(Arc::new(client))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_create_ollama_client() {
        let client = create_client("ollama", None, None, TIMEOUT).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_create_ollama_with_settings() {
        let settings = ProviderConfig::Ollama {
            endpoint: "http://localhost:8080".to_string(),
            model: "llama3.2".to_string(),
            embedding_model: None,
            timeout: Some(30),
        };
        assert!(create_client("ollama", Some(&settings), None, TIMEOUT).is_ok());
    }

    #[test]
    fn test_watsonx_requires_section() {
        match create_client("watsonx", None, None, TIMEOUT) {
            Err(err) => assert!(err.contains("llm.providers.watsonx")),
            Ok(_) => panic!("Expected error for watsonx without settings"),
        }
    }

    #[test]
    fn test_watsonx_requires_api_key() {
        let settings = ProviderConfig::Watsonx {
            api_key_env: "RELNOTES_TEST_UNSET_WATSONX_KEY".to_string(),
            project_id_env: "RELNOTES_TEST_UNSET_WATSONX_PROJECT".to_string(),
            model: "ibm/granite-13b-chat-v2".to_string(),
            endpoint: None,
            iam_endpoint: None,
        };
        match create_client("watsonx", Some(&settings), None, TIMEOUT) {
            Err(err) => assert!(err.contains("requires API key")),
            Ok(_) => panic!("Expected error for watsonx without API key"),
        }
    }

    #[test]
    fn test_watsonx_with_explicit_key_still_needs_project() {
        let settings = ProviderConfig::Watsonx {
            api_key_env: "RELNOTES_TEST_UNSET_WATSONX_KEY".to_string(),
            project_id_env: "RELNOTES_TEST_UNSET_WATSONX_PROJECT".to_string(),
            model: "ibm/granite-13b-chat-v2".to_string(),
            endpoint: None,
            iam_endpoint: None,
        };
        match create_client("watsonx", Some(&settings), Some("key"), TIMEOUT) {
            Err(err) => assert!(err.contains("project id")),
            Ok(_) => panic!("Expected error for watsonx without project id"),
        }
    }

    #[test]
    fn test_unknown_provider() {
        match create_client("unknown", None, None, TIMEOUT) {
            Err(err) => assert!(err.contains("Unknown provider")),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }
}
