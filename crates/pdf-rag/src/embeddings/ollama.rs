//! Ollama embeddings for the local inference endpoint

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Embedder;
use crate::config::EmbeddingConfig;
use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::remote::{build_client, map_http_error, map_transport_error, retry_request};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_RETRIES: u32 = 2;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Embedder backed by Ollama's `/api/embeddings`
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
    dimensions: usize,
    parallel_requests: usize,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(REQUEST_TIMEOUT)?,
            base_url: config.effective_base_url(),
            model: config.model.clone(),
            dimensions: config.dimensions,
            parallel_requests: config.parallel_requests.max(1),
        })
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>> {
        retry_request(MAX_RETRIES, || self.request_once(text)).await
    }

    async fn request_once(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&EmbedRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| map_transport_error(e, REQUEST_TIMEOUT))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body, None, &self.model, REQUEST_TIMEOUT));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::embedding(format!("Failed to parse embedding response: {}", e)))?;

        if parsed.embedding.is_empty() {
            return Err(Error::embedding("Ollama returned an empty embedding"));
        }
        Ok(parsed.embedding)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str, _credential: Option<&Credential>) -> Result<Vec<f32>> {
        self.request(text).await
    }

    /// Ollama has no batch endpoint; requests run concurrently, results keep input order
    async fn embed_batch(
        &self,
        texts: &[String],
        _credential: Option<&Credential>,
    ) -> Result<Vec<Vec<f32>>> {
        let requests: Vec<_> = texts.iter().map(|text| self.request(text)).collect();
        stream::iter(requests)
            .buffered(self.parallel_requests)
            .try_collect()
            .await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model
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
