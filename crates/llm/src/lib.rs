//! LLM integration crate for relnotes.
//!
//! This crate provides a provider-agnostic abstraction for the language-model
//! capability used by answer synthesis. Each backend implements [`LlmClient`]
//! and is selected by explicit configuration through [`create_client`].
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **watsonx**: IBM watsonx.ai text generation
//!
//! # Example
//! ```no_run
//! use relnotes_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("What changed in 2024.1?", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::{OllamaClient, WatsonxClient};
pub use types::ProviderType;
