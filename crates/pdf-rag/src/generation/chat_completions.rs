//! OpenAI-compatible chat completions client for remote inference

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Generator, ModelConfig};
use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::remote::{
    build_client, map_http_error, map_transport_error, parse_retry_after, retry_request,
};
use crate::types::{FinishReason, GenerationResult};

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Client for `/chat/completions` with bearer authentication
pub struct ChatCompletionsClient {
    client: Client,
}

impl ChatCompletionsClient {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout())?,
        })
    }

    async fn complete(
        &self,
        prompt: &str,
        config: &ModelConfig,
        credential: &Credential,
    ) -> Result<GenerationResult> {
        let url = format!("{}/chat/completions", config.effective_base_url());
        let timeout = config.timeout();

        let request = ChatCompletionRequest {
            model: &config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: config.temperature,
            max_tokens: config.max_output_tokens,
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(credential.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| map_transport_error(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers().get("retry-after"));
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body, retry_after, &config.model, timeout));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::generation(format!("Failed to parse completion: {}", e)))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::generation("Completion contained no choices"))?;

        Ok(GenerationResult {
            text: choice.message.content.unwrap_or_default().trim().to_string(),
            finish_reason: FinishReason::from_provider(choice.finish_reason.as_deref()),
        })
    }
}

#[async_trait]
impl Generator for ChatCompletionsClient {
    async fn generate(
        &self,
        prompt: &str,
        config: &ModelConfig,
        credential: Option<&Credential>,
    ) -> Result<GenerationResult> {
        let credential = credential.ok_or(Error::CredentialRequired)?;

        tracing::info!("Generating answer with model: {}", config.model);

        let timeout = config.timeout();
        let attempt = retry_request(config.max_retries, || self.complete(prompt, config, credential));
        let result = tokio::time::timeout(timeout, attempt)
            .await
            .map_err(|_| Error::Timeout(timeout))??;

        if result.finish_reason.is_truncated() {
            tracing::warn!(
                "Answer from {} hit the {} token limit",
                config.model,
                config.max_output_tokens
            );
        }
        Ok(result)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "chat-completions"
    }
}
