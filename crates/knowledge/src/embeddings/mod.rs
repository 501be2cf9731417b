//! Embedding capability for ingestion and query time.
//!
//! Both sides load the same [`EmbeddingConfig`] from the index directory, so
//! questions are embedded in the space the chunks were stored in.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};

use relnotes_core::AppResult;
use std::path::Path;
use std::sync::Arc;

/// Load the index's embedding config and build its provider.
pub fn load_provider(workspace: &Path) -> AppResult<Arc<dyn EmbeddingProvider>> {
    let config = EmbeddingConfig::load(workspace)?;

    tracing::debug!(
        provider = %config.provider,
        model = %config.model,
        dimensions = config.dimensions,
        "Creating embedding provider"
    );

    create_provider(&config)
}
