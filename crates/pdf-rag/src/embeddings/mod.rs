//! Text embedding backends
//!
//! Implementations:
//! - `OnnxEmbedder`: in-process all-MiniLM-L6-v2 via ONNX Runtime
//! - `OllamaEmbedder`: local Ollama server
//! - `HuggingFaceEmbedder`: Hugging Face inference router (bearer token)

mod huggingface;
mod ollama;
mod onnx_embedder;

pub use huggingface::HuggingFaceEmbedder;
pub use ollama::OllamaEmbedder;
pub use onnx_embedder::OnnxEmbedder;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{EmbeddingBackend, EmbeddingConfig};
use crate::credential::Credential;
use crate::error::Result;

/// Maps text to fixed-length vectors.
///
/// The same implementation (and model) must embed both the corpus and the
/// queries searched against it. `credential` is only consulted by remote
/// backends.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str, credential: Option<&Credential>) -> Result<Vec<f32>>;

    /// Embed many texts. Output order matches input order.
    ///
    /// Default implementation calls `embed` sequentially.
    async fn embed_batch(
        &self,
        texts: &[String],
        credential: Option<&Credential>,
    ) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text, credential).await?);
        }
        Ok(embeddings)
    }

    /// Vector length produced by the model
    fn dimensions(&self) -> usize;

    /// Identity of the embedding model; indexes record it
    fn model_id(&self) -> &str;

    /// Check if the backend is reachable / loadable
    async fn health_check(&self) -> Result<bool>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Build the embedder selected by configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = match config.backend {
        EmbeddingBackend::Onnx => Arc::new(OnnxEmbedder::new(config)),
        EmbeddingBackend::Ollama => Arc::new(OllamaEmbedder::new(config)?),
        EmbeddingBackend::HuggingFace => Arc::new(HuggingFaceEmbedder::new(config)?),
    };
    tracing::info!(
        "Embedding backend: {} (model {}, {} dims)",
        embedder.name(),
        embedder.model_id(),
        embedder.dimensions()
    );
    Ok(embedder)
}

/// Scale a vector to unit length in place
pub(crate) fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
