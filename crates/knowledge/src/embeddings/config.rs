//! Embedding configuration types and management.
//!
//! The index records which provider, model and dimension built its vectors
//! so that query embeddings are always produced in the same space.

use relnotes_core::config::{AppConfig, ProviderConfig};
use relnotes_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Embedding configuration for the chunk index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "trigram", "ollama"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Provider endpoint, for network providers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs", rename = "timeoutSecs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

const DEFAULT_OLLAMA_EMBEDDING_MODEL: &str = "nomic-embed-text";
const DEFAULT_OLLAMA_DIMENSIONS: usize = 768;

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            endpoint: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    /// Embedding config for a fresh index built with `provider`.
    ///
    /// Ollama settings (endpoint, embedding model, timeout) come from the
    /// app config's `ollama` provider section when present; `model` and
    /// `dimensions` override them.
    pub fn for_provider(
        provider: &str,
        app: &AppConfig,
        model: Option<String>,
        dimensions: Option<usize>,
    ) -> AppResult<Self> {
        let config = match provider {
            "trigram" => {
                let defaults = Self::default();
                Self {
                    model: model.unwrap_or(defaults.model.clone()),
                    dimensions: dimensions.unwrap_or(defaults.dimensions),
                    ..defaults
                }
            }
            "ollama" => {
                let (endpoint, configured_model, timeout) = match app.get_provider_config("ollama") {
                    Some(ProviderConfig::Ollama {
                        endpoint,
                        embedding_model,
                        timeout,
                        ..
                    }) => (Some(endpoint), embedding_model, timeout),
                    _ => (None, None, None),
                };

                Self {
                    provider: "ollama".to_string(),
                    model: model
                        .or(configured_model)
                        .unwrap_or_else(|| DEFAULT_OLLAMA_EMBEDDING_MODEL.to_string()),
                    dimensions: dimensions.unwrap_or(DEFAULT_OLLAMA_DIMENSIONS),
                    endpoint,
                    timeout_secs: timeout.unwrap_or_else(default_timeout_secs),
                }
            }
            other => {
                return Err(AppError::Knowledge(format!(
                    "Unknown embedding provider: '{}'. Supported providers: trigram, ollama",
                    other
                )))
            }
        };

        if config.dimensions == 0 {
            return Err(AppError::Knowledge(
                "Embedding dimensions must be positive".to_string(),
            ));
        }

        Ok(config)
    }

    /// Load the embedding config from `.relnotes/index/config.yaml`.
    ///
    /// Falls back to the default trigram config when no file exists.
    pub fn load(workspace: &Path) -> AppResult<Self> {
        let config_path = crate::config::get_config_path(workspace);

        if !config_path.exists() {
            tracing::debug!("No index config file, using default embedding config");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).map_err(|e| {
            AppError::Knowledge(format!("Failed to read config at {:?}: {}", config_path, e))
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| {
            AppError::Knowledge(format!(
                "Failed to parse config at {:?}: {}",
                config_path, e
            ))
        })?;

        if config.dimensions == 0 {
            return Err(AppError::Knowledge(format!(
                "Embedding dimensions must be positive in {:?}",
                config_path
            )));
        }

        Ok(config)
    }

    /// Save the embedding config next to the index.
    pub fn save(&self, workspace: &Path) -> AppResult<()> {
        let config_path = crate::config::get_config_path(workspace);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::Knowledge(format!("Failed to create config directory: {}", e))
            })?;
        }

        let yaml = serde_yaml::to_string(self)
            .map_err(|e| AppError::Knowledge(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_path, yaml).map_err(|e| {
            AppError::Knowledge(format!(
                "Failed to write config to {:?}: {}",
                config_path, e
            ))
        })?;

        tracing::debug!("Saved embedding config ({}/{})", self.provider, self.model);
        Ok(())
    }

    /// Validate that another config produces vectors in the same space.
    pub fn validate_consistency(&self, other: &Self) -> AppResult<()> {
        if self.provider != other.provider {
            return Err(AppError::Knowledge(format!(
                "Provider mismatch: expected '{}', got '{}'",
                self.provider, other.provider
            )));
        }

        if self.model != other.model {
            return Err(AppError::Knowledge(format!(
                "Model mismatch: expected '{}', got '{}'",
                self.model, other.model
            )));
        }

        if self.dimensions != other.dimensions {
            return Err(AppError::Knowledge(format!(
                "Dimension mismatch: expected {}, got {}",
                self.dimensions, other.dimensions
            )));
        }

        Ok(())
    }
}
