//! Configuration management for relnotes.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Defaults
//! - Config file (.relnotes/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric, with all state stored in `.relnotes/`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Providers the answer pipeline can be configured with.
pub const KNOWN_PROVIDERS: [&str; 2] = ["ollama", "watsonx"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .relnotes/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Active LLM provider ("ollama", "watsonx")
    pub provider: String,

    /// Default model identifier
    pub model: String,

    /// API key override for the LLM provider
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,

    /// Answer pipeline tuning
    pub pipeline: PipelineConfig,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    #[serde(rename = "activeEmbeddingProvider", default)]
    pub active_embedding_provider: Option<String>,

    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
///
/// Variants are tried in order, so the one with the most required
/// fields comes first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    Watsonx {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        #[serde(rename = "projectIdEnv")]
        project_id_env: String,
        model: String,
        endpoint: Option<String>,
        #[serde(rename = "iamEndpoint")]
        iam_endpoint: Option<String>,
    },
    Ollama {
        endpoint: String,
        model: String,
        #[serde(rename = "embeddingModel")]
        embedding_model: Option<String>,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    /// Model configured for completions.
    pub fn model(&self) -> &str {
        match self {
            Self::Watsonx { model, .. } | Self::Ollama { model, .. } => model,
        }
    }

    /// Custom endpoint, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::Watsonx { endpoint, .. } => endpoint.as_deref(),
            Self::Ollama { endpoint, .. } => Some(endpoint.as_str()),
        }
    }
}

/// Tuning knobs for retrieval, context assembly, synthesis and the guard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    /// Number of chunks to retrieve per question
    pub top_k: usize,

    /// Chunks scoring below this cosine similarity are dropped
    pub min_similarity: f32,

    /// Maximum characters of passage text placed in the prompt
    pub context_budget_chars: usize,

    /// Number of most recent turns replayed to the model
    pub history_window: usize,

    /// Answers with a derived confidence below this escalate
    pub confidence_threshold: f32,

    /// Maximum tokens the model may generate
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Deadline for a single backend call
    pub backend_timeout_secs: u64,

    /// Pause before the single synthesis retry
    pub retry_backoff_ms: u64,

    /// Deadline for handing one escalation to the sink
    pub sink_timeout_ms: u64,

    /// Prompt definition used for synthesis
    pub prompt_id: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: 8,
            min_similarity: 0.35,
            context_budget_chars: 6000,
            history_window: 4,
            confidence_threshold: 0.5,
            max_tokens: 1000,
            temperature: 0.0,
            backend_timeout_secs: 60,
            retry_backoff_ms: 500,
            sink_timeout_ms: 5000,
            prompt_id: "relnotes.answer.grounded".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Reject values that would make the pipeline misbehave.
    pub fn validate(&self) -> AppResult<()> {
        if self.top_k == 0 {
            return Err(AppError::Config("pipeline.topK must be at least 1".to_string()));
        }
        if !(-1.0..=1.0).contains(&self.min_similarity) {
            return Err(AppError::Config(format!(
                "pipeline.minSimilarity must be within [-1, 1], got {}",
                self.min_similarity
            )));
        }
        if self.context_budget_chars == 0 {
            return Err(AppError::Config(
                "pipeline.contextBudgetChars must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(AppError::Config(format!(
                "pipeline.confidenceThreshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if self.backend_timeout_secs == 0 {
            return Err(AppError::Config(
                "pipeline.backendTimeoutSecs must be positive".to_string(),
            ));
        }
        if self.sink_timeout_ms == 0 {
            return Err(AppError::Config(
                "pipeline.sinkTimeoutMs must be positive".to_string(),
            ));
        }
        if self.prompt_id.trim().is_empty() {
            return Err(AppError::Config("pipeline.promptId cannot be empty".to_string()));
        }
        Ok(())
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    pipeline: Option<PipelineConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            llm: None,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the config file and environment variables.
    ///
    /// Environment variables:
    /// - `RELNOTES_WORKSPACE`: Override workspace path
    /// - `RELNOTES_CONFIG`: Path to config file
    /// - `RELNOTES_PROVIDER`: LLM provider
    /// - `RELNOTES_MODEL`: Model identifier
    /// - `RELNOTES_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Like [`AppConfig::load`], but an explicit workspace or config file
    /// (from CLI flags) replaces the environment's before the file is read.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        let workspace =
            workspace.or_else(|| std::env::var("RELNOTES_WORKSPACE").ok().map(PathBuf::from));
        if let Some(workspace) = workspace {
            config.workspace = workspace;
        }

        config.config_file =
            config_file.or_else(|| std::env::var("RELNOTES_CONFIG").ok().map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.relnotes_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("RELNOTES_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("RELNOTES_MODEL") {
            config.model = model;
        }

        config.api_key = std::env::var("RELNOTES_API_KEY").ok();

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into a copy of this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(pipeline) = config_file.pipeline {
            result.pipeline = pipeline;
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();
            }

            result.llm = Some(llm);
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables and the file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .relnotes directory.
    pub fn relnotes_dir(&self) -> PathBuf {
        self.workspace.join(".relnotes")
    }

    /// Ensure the .relnotes directory exists.
    pub fn ensure_relnotes_dir(&self) -> AppResult<()> {
        let dir = self.relnotes_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .relnotes directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Get a provider configuration by name.
    pub fn get_provider_config(&self, provider: &str) -> Option<ProviderConfig> {
        self.llm
            .as_ref()
            .and_then(|llm| llm.providers.get(provider).cloned())
    }

    /// Name of the provider used for query embeddings, if configured.
    pub fn embedding_provider(&self) -> Option<&str> {
        self.llm
            .as_ref()
            .and_then(|llm| llm.active_embedding_provider.as_deref())
    }

    /// Resolve the API key for a provider.
    ///
    /// `RELNOTES_API_KEY` wins over the provider's `apiKeyEnv`.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        match self.get_provider_config(provider) {
            Some(ProviderConfig::Watsonx { api_key_env, .. }) => std::env::var(api_key_env).ok(),
            _ => None,
        }
    }

    /// Validate configuration for the active provider and the pipeline.
    pub fn validate(&self) -> AppResult<()> {
        let provider = &self.provider;

        if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        match self.get_provider_config(provider) {
            Some(ProviderConfig::Watsonx {
                api_key_env,
                project_id_env,
                ..
            }) => {
                if self.api_key.is_none() && std::env::var(&api_key_env).is_err() {
                    return Err(AppError::Config(format!(
                        "API key not found in environment variable: {}",
                        api_key_env
                    )));
                }
                if std::env::var(&project_id_env).is_err() {
                    return Err(AppError::Config(format!(
                        "Project id not found in environment variable: {}",
                        project_id_env
                    )));
                }
            }
            Some(ProviderConfig::Ollama { .. }) => {
                // Ollama doesn't require credentials
            }
            None if provider == "watsonx" => {
                return Err(AppError::Config(
                    "Provider 'watsonx' requires an llm.providers.watsonx section".to_string(),
                ));
            }
            None => {}
        }

        self.pipeline.validate()
    }
}
