//! Ollama client for the local inference endpoint

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Generator, ModelConfig};
use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::remote::{build_client, map_http_error, map_transport_error, retry_request};
use crate::types::{FinishReason, GenerationResult};

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    /// The prompt already carries its chat markup
    raw: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    done_reason: Option<String>,
}

/// Ollama API client with automatic retry
pub struct OllamaClient {
    client: Client,
    /// Server probed by health checks
    base_url: String,
}

impl OllamaClient {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout())?,
            base_url: config.effective_base_url(),
        })
    }

    async fn complete(&self, prompt: &str, config: &ModelConfig) -> Result<GenerationResult> {
        let url = format!("{}/api/generate", config.effective_base_url());
        let timeout = config.timeout();

        let request = GenerateRequest {
            model: &config.model,
            prompt,
            stream: false,
            raw: true,
            options: GenerateOptions {
                temperature: config.temperature,
                num_predict: config.max_output_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_transport_error(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body, None, &config.model, timeout));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::generation(format!("Failed to parse generation response: {}", e)))?;

        Ok(GenerationResult {
            text: parsed.response.trim().to_string(),
            finish_reason: FinishReason::from_provider(parsed.done_reason.as_deref()),
        })
    }
}

#[async_trait]
impl Generator for OllamaClient {
    async fn generate(
        &self,
        prompt: &str,
        config: &ModelConfig,
        _credential: Option<&Credential>,
    ) -> Result<GenerationResult> {
        tracing::info!("Generating answer with local model: {}", config.model);

        let timeout = config.timeout();
        let attempt = retry_request(config.max_retries, || self.complete(prompt, config));
        tokio::time::timeout(timeout, attempt)
            .await
            .map_err(|_| Error::Timeout(timeout))?
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
