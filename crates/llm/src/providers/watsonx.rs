//! IBM watsonx.ai LLM provider implementation.
//!
//! Text generation requires a short-lived IAM bearer token obtained by
//! exchanging the account API key. Tokens are cached until shortly before
//! they expire. Neither the API key nor the token is ever logged.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use crate::providers::{status_error, transport_error};
use relnotes_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const DEFAULT_WATSONX_URL: &str =
    "https://us-south.ml.cloud.ibm.com/ml/v1/text/generation?version=2024-05-29";

pub const DEFAULT_IAM_URL: &str = "https://iam.cloud.ibm.com/identity/token";

const IAM_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// Refresh tokens this long before the IAM-reported expiry.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    model_id: &'a str,
    input: &'a str,
    parameters: GenerationParameters,
    project_id: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationParameters {
    temperature: f32,
    max_new_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    model_id: Option<String>,
    #[serde(default)]
    results: Vec<GenerationResult>,
}

#[derive(Debug, Deserialize)]
struct GenerationResult {
    #[serde(default)]
    generated_text: String,
    #[serde(default)]
    generated_token_count: Option<u32>,
    #[serde(default)]
    input_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct IamTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// watsonx.ai text generation client.
pub struct WatsonxClient {
    api_key: String,
    project_id: String,
    generation_url: String,
    iam_url: String,
    client: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl WatsonxClient {
    /// Create a client against the default us-south endpoints.
    pub fn new(api_key: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self::with_endpoints(
            api_key,
            project_id,
            DEFAULT_WATSONX_URL,
            DEFAULT_IAM_URL,
            Duration::from_secs(60),
        )
    }

    /// Create a client with explicit endpoints and HTTP timeout.
    pub fn with_endpoints(
        api_key: impl Into<String>,
        project_id: impl Into<String>,
        generation_url: impl Into<String>,
        iam_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            api_key: api_key.into(),
            project_id: project_id.into(),
            generation_url: generation_url.into(),
            iam_url: iam_url.into(),
            client,
            token: Mutex::new(None),
        }
    }

    /// Return a valid bearer token, exchanging the API key if needed.
    async fn bearer_token(&self) -> AppResult<String> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        tracing::debug!("Requesting IAM token for watsonx");

        let response = self
            .client
            .post(&self.iam_url)
            .header("Accept", "application/json")
            .form(&[("grant_type", IAM_GRANT_TYPE), ("apikey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| transport_error("IBM IAM", e))?;

        if !response.status().is_success() {
            let status = response.status();
            // The body may echo request details, so it is not included.
            return Err(status_error("IBM IAM", status, "token exchange rejected"));
        }

        let token: IamTokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse IAM token response: {}", e)))?;

        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        let refresh_at = Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN);

        let value = token.access_token;
        *cached = Some(CachedToken {
            value: value.clone(),
            refresh_at,
        });

        Ok(value)
    }

    fn to_generation_request<'a>(&'a self, request: &'a LlmRequest) -> GenerationRequest<'a> {
        GenerationRequest {
            model_id: &request.model,
            input: &request.prompt,
            parameters: GenerationParameters {
                temperature: request.temperature.unwrap_or(0.0),
                max_new_tokens: request.max_tokens.unwrap_or(1000),
            },
            project_id: &self.project_id,
        }
    }

    fn convert_response(&self, request: &LlmRequest, response: GenerationResponse) -> AppResult<LlmResponse> {
        let result = response
            .results
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Llm("watsonx returned no results".to_string()))?;

        Ok(LlmResponse {
            content: result.generated_text,
            model: response.model_id.unwrap_or_else(|| request.model.clone()),
            usage: LlmUsage::new(
                result.input_token_count.unwrap_or(0),
                result.generated_token_count.unwrap_or(0),
            ),
        })
    }
}

#[async_trait::async_trait]
impl LlmClient for WatsonxClient {
    fn provider_name(&self) -> &str {
        "watsonx"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!(model = %request.model, "Sending generation request to watsonx");

        let token = self.bearer_token().await?;

        // watsonx has no separate system slot, so it is prepended to the input
        let prompt;
        let request_ref = match &request.system {
            Some(system) => {
                prompt = LlmRequest {
                    prompt: format!("{}\n\n{}", system, request.prompt),
                    system: None,
                    ..request.clone()
                };
                &prompt
            }
            None => request,
        };

        let body = self.to_generation_request(request_ref);

        let response = self
            .client
            .post(&self.generation_url)
            .bearer_auth(&token)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("watsonx", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            if status == reqwest::StatusCode::UNAUTHORIZED {
                // Force a fresh exchange on the next call
                *self.token.lock().await = None;
            }
            return Err(status_error("watsonx", status, &error_text));
        }

        let parsed: GenerationResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse watsonx response: {}", e)))?;

        self.convert_response(request, parsed)
    }
}
