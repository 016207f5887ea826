//! Answer generation: prompt assembly, model clients, citations
//!
//! Implementations of [`Generator`]:
//! - `ChatCompletionsClient`: OpenAI-compatible remote endpoint (Hugging Face router)
//! - `OllamaClient`: local Ollama server

pub mod chat_completions;
pub mod citation;
pub mod ollama;
pub mod prompt;

pub use chat_completions::ChatCompletionsClient;
pub use citation::{build_citations, excerpt, truncate_snippet};
pub use ollama::OllamaClient;
pub use prompt::{PromptBuilder, PromptTemplate, NO_CONTEXT_PLACEHOLDER};

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{InferenceEndpoint, LlmConfig};
use crate::credential::Credential;
use crate::error::Result;
use crate::types::GenerationResult;

/// Model settings for one generation call: endpoint, model id, temperature
/// and output limit
pub type ModelConfig = LlmConfig;

/// Language model that completes an assembled prompt.
///
/// Blocks the caller until a completion, an error, or `config.timeout()`
/// elapses. A length cutoff is not an error: it comes back as
/// `FinishReason::Length`.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        config: &ModelConfig,
        credential: Option<&Credential>,
    ) -> Result<GenerationResult>;

    /// Check if the endpoint is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Build the generator for the configured endpoint
pub fn create_generator(config: &LlmConfig) -> Result<Arc<dyn Generator>> {
    let generator: Arc<dyn Generator> = match config.endpoint {
        InferenceEndpoint::Remote => Arc::new(ChatCompletionsClient::new(config)?),
        InferenceEndpoint::Local => Arc::new(OllamaClient::new(config)?),
    };
    tracing::info!(
        "Generation endpoint: {} at {} (model {})",
        generator.name(),
        config.effective_base_url(),
        config.model
    );
    Ok(generator)
}
