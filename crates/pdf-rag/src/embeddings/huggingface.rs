//! Remote embeddings through the Hugging Face inference router

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::Embedder;
use crate::config::EmbeddingConfig;
use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::remote::{
    build_client, map_embedding_error, map_transport_error, parse_retry_after, retry_request,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_RETRIES: u32 = 2;

#[derive(Serialize)]
struct FeatureExtractionRequest<'a> {
    inputs: &'a [String],
}

/// Embedder calling the `feature-extraction` pipeline with the session's token
pub struct HuggingFaceEmbedder {
    client: Client,
    base_url: String,
    model: String,
    dimensions: usize,
    max_tokens: usize,
    batch_size: usize,
}

impl HuggingFaceEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(REQUEST_TIMEOUT)?,
            base_url: config.effective_base_url(),
            model: config.model.clone(),
            dimensions: config.dimensions,
            max_tokens: config.max_tokens,
            batch_size: config.batch_size.max(1),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}/pipeline/feature-extraction", self.base_url, self.model)
    }

    async fn request(&self, texts: &[String], credential: &Credential) -> Result<Vec<Vec<f32>>> {
        let vectors = retry_request(MAX_RETRIES, || self.request_once(texts, credential)).await?;

        if vectors.len() != texts.len() {
            return Err(Error::embedding(format!(
                "Requested {} embeddings, received {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }

    async fn request_once(&self, texts: &[String], credential: &Credential) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(credential.expose())
            .json(&FeatureExtractionRequest { inputs: texts })
            .send()
            .await
            .map_err(|e| map_transport_error(e, REQUEST_TIMEOUT))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers().get("retry-after"));
            let body = response.text().await.unwrap_or_default();
            return Err(map_embedding_error(
                status,
                &body,
                retry_after,
                &self.model,
                REQUEST_TIMEOUT,
                self.max_tokens,
            ));
        }

        response
            .json()
            .await
            .map_err(|e| Error::embedding(format!("Failed to parse embedding response: {}", e)))
    }
}

fn require(credential: Option<&Credential>) -> Result<&Credential> {
    credential.ok_or(Error::CredentialRequired)
}

#[async_trait]
impl Embedder for HuggingFaceEmbedder {
    async fn embed(&self, text: &str, credential: Option<&Credential>) -> Result<Vec<f32>> {
        let credential = require(credential)?;
        self.request(&[text.to_string()], credential)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding("Empty embedding result"))
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        credential: Option<&Credential>,
    ) -> Result<Vec<Vec<f32>>> {
        let credential = require(credential)?;
        let mut all = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            tracing::debug!("Embedding batch of {} via {}", batch.len(), self.model);
            all.extend(self.request(batch, credential).await?);
        }
        Ok(all)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool> {
        // The router only answers authenticated requests; reachability is the best signal
        Ok(self.client.head(&self.base_url).send().await.is_ok())
    }

    fn name(&self) -> &str {
        "huggingface"
    }
}
