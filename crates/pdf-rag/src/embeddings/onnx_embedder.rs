//! ONNX-based embedding generation
//!
//! Runs all-MiniLM-L6-v2 (384 dimensions) in process. Model and tokenizer
//! files are downloaded to the cache directory on first use, and the session
//! is created once and kept for the life of the embedder.

use async_trait::async_trait;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokenizers::Tokenizer;
use tokio::sync::OnceCell;

use super::{l2_normalize, Embedder};
use crate::config::EmbeddingConfig;
use crate::credential::Credential;
use crate::error::{Error, Result};

const MODEL_FILE: &str = "model.onnx";
const TOKENIZER_FILE: &str = "tokenizer.json";

/// ONNX-based text embedder with lazy model loading
pub struct OnnxEmbedder {
    config: EmbeddingConfig,
    model: OnceCell<Arc<LoadedModel>>,
}

/// Session and tokenizer, created once
struct LoadedModel {
    /// ONNX Runtime session (inference needs exclusive access)
    session: Mutex<Session>,
    /// HuggingFace tokenizer, truncation disabled
    tokenizer: Tokenizer,
    /// Expected output dimensions
    dimensions: usize,
    /// Token limit of the model
    max_tokens: usize,
    /// Texts per inference call
    batch_size: usize,
}

impl OnnxEmbedder {
    /// Create an embedder. Nothing is downloaded or loaded until first use.
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            config: config.clone(),
            model: OnceCell::new(),
        }
    }

    /// Whether the model has been loaded
    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    /// Directory holding this model's files
    fn model_dir(&self) -> PathBuf {
        self.config.cache_dir.join(self.config.model.replace('/', "--"))
    }

    async fn model(&self) -> Result<Arc<LoadedModel>> {
        let model = self
            .model
            .get_or_try_init(|| LoadedModel::load(&self.config, self.model_dir()))
            .await?;
        Ok(Arc::clone(model))
    }

    async fn run(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let model = self.model().await?;
        tokio::task::spawn_blocking(move || model.embed_texts(&texts))
            .await
            .map_err(|e| Error::embedding(format!("Embedding task failed: {}", e)))?
    }
}

impl LoadedModel {
    async fn load(config: &EmbeddingConfig, dir: PathBuf) -> Result<Arc<Self>> {
        tracing::info!("Initializing ONNX embedder with model: {}", config.model);

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::Config(format!("Failed to create cache directory: {}", e)))?;

        let model_path = dir.join(MODEL_FILE);
        let tokenizer_path = dir.join(TOKENIZER_FILE);
        let base_url = config.effective_base_url();

        if !model_path.exists() {
            let url = format!("{}/{}/resolve/main/onnx/{}", base_url, config.model, MODEL_FILE);
            download(&url, &model_path).await?;
        }
        if !tokenizer_path.exists() {
            let url = format!("{}/{}/resolve/main/{}", base_url, config.model, TOKENIZER_FILE);
            download(&url, &tokenizer_path).await?;
        }

        let dimensions = config.dimensions;
        let max_tokens = config.max_tokens;
        let batch_size = config.batch_size.max(1);

        let model = tokio::task::spawn_blocking(move || -> Result<Self> {
            let session = Session::builder()
                .map_err(|e| Error::embedding(format!("Failed to create session builder: {}", e)))?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(|e| Error::embedding(format!("Failed to set optimization level: {}", e)))?
                .with_intra_threads(4)
                .map_err(|e| Error::embedding(format!("Failed to set threads: {}", e)))?
                .commit_from_file(&model_path)
                .map_err(|e| Error::embedding(format!("Failed to load model: {}", e)))?;

            let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| Error::embedding(format!("Failed to load tokenizer: {}", e)))?;
            tokenizer.with_padding(None);
            tokenizer
                .with_truncation(None)
                .map_err(|e| Error::embedding(format!("Failed to configure tokenizer: {}", e)))?;

            Ok(Self {
                session: Mutex::new(session),
                tokenizer,
                dimensions,
                max_tokens,
                batch_size,
            })
        })
        .await
        .map_err(|e| Error::embedding(format!("Model loading task failed: {}", e)))??;

        tracing::info!("ONNX embedder initialized successfully");
        Ok(Arc::new(model))
    }

    /// Embed texts in batches, rejecting any that exceed the token limit
    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut all_embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let batch: Vec<&str> = batch.iter().map(String::as_str).collect();
            all_embeddings.extend(self.embed_batch_internal(&batch)?);
        }
        Ok(all_embeddings)
    }

    fn embed_batch_internal(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let batch_size = texts.len();

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| Error::embedding(format!("Tokenization failed: {}", e)))?;

        if let Some(tokens) = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .find(|&len| len > self.max_tokens)
        {
            return Err(Error::InputTooLong {
                tokens,
                limit: self.max_tokens,
            });
        }

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];
        let mut token_type_ids = vec![0i64; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let types = encoding.get_type_ids();

            for j in 0..ids.len() {
                input_ids[i * max_len + j] = ids[j] as i64;
                attention_mask[i * max_len + j] = mask[j] as i64;
                token_type_ids[i * max_len + j] = types[j] as i64;
            }
        }

        let input_ids_tensor =
            Tensor::from_array((vec![batch_size, max_len], input_ids.into_boxed_slice()))
                .map_err(|e| Error::embedding(format!("Input tensor creation failed: {}", e)))?;

        let attention_mask_tensor = Tensor::from_array((
            vec![batch_size, max_len],
            attention_mask.clone().into_boxed_slice(),
        ))
        .map_err(|e| Error::embedding(format!("Attention mask tensor creation failed: {}", e)))?;

        let token_type_ids_tensor =
            Tensor::from_array((vec![batch_size, max_len], token_type_ids.into_boxed_slice()))
                .map_err(|e| {
                    Error::embedding(format!("Token type tensor creation failed: {}", e))
                })?;

        let inputs = vec![
            ("input_ids", input_ids_tensor.into_dyn()),
            ("attention_mask", attention_mask_tensor.into_dyn()),
            ("token_type_ids", token_type_ids_tensor.into_dyn()),
        ];

        let mut session = self.session.lock();
        let outputs = session
            .run(inputs)
            .map_err(|e| Error::embedding(format!("Inference failed: {}", e)))?;

        let output_iter: Vec<_> = outputs.iter().collect();
        let output = output_iter
            .iter()
            .find(|(name, _)| *name == "last_hidden_state")
            .or_else(|| output_iter.first())
            .map(|(_, v)| v)
            .ok_or_else(|| Error::embedding("No output tensor"))?;

        let (tensor_shape, tensor_data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::embedding(format!("Failed to extract tensor: {}", e)))?;

        let dims: Vec<usize> = tensor_shape.iter().map(|&d| d as usize).collect();
        let hidden_size = dims.get(2).copied().unwrap_or(self.dimensions);
        if hidden_size != self.dimensions {
            return Err(Error::embedding(format!(
                "Model produces {}-dimensional vectors, configured for {}",
                hidden_size, self.dimensions
            )));
        }

        // Mean pooling over attended tokens
        let mut embeddings = Vec::with_capacity(batch_size);
        for i in 0..batch_size {
            let mut sum = vec![0.0f32; hidden_size];
            let mut count = 0.0f32;

            for j in 0..max_len {
                let mask_val = attention_mask[i * max_len + j] as f32;
                if mask_val > 0.0 {
                    let row = i * max_len * hidden_size + j * hidden_size;
                    if let Some(values) = tensor_data.get(row..row + hidden_size) {
                        for (acc, value) in sum.iter_mut().zip(values) {
                            *acc += value * mask_val;
                        }
                    }
                    count += mask_val;
                }
            }

            if count > 0.0 {
                for val in &mut sum {
                    *val /= count;
                }
            }
            l2_normalize(&mut sum);
            embeddings.push(sum);
        }

        Ok(embeddings)
    }
}

#[async_trait]
impl Embedder for OnnxEmbedder {
    async fn embed(&self, text: &str, _credential: Option<&Credential>) -> Result<Vec<f32>> {
        self.run(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding("Empty embedding result"))
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        _credential: Option<&Credential>,
    ) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.run(texts.to_vec()).await
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }

    async fn health_check(&self) -> Result<bool> {
        let dir = self.model_dir();
        Ok(self.is_loaded() || (dir.join(MODEL_FILE).exists() && dir.join(TOKENIZER_FILE).exists()))
    }

    fn name(&self) -> &str {
        "onnx"
    }
}

/// Download a model file, writing through a temporary name
async fn download(url: &str, path: &Path) -> Result<()> {
    tracing::info!("Downloading {}", url);

    let response = reqwest::get(url)
        .await
        .map_err(|e| Error::embedding(format!("Failed to download {}: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(Error::embedding(format!(
            "Download of {} failed: HTTP {}",
            url,
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::embedding(format!("Failed to read {}: {}", url, e)))?;

    let partial = path.with_extension("part");
    tokio::fs::write(&partial, &bytes).await?;
    tokio::fs::rename(&partial, path).await?;

    tracing::info!("Saved {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lazy_construction() {
        let config = EmbeddingConfig {
            cache_dir: std::env::temp_dir().join("pdf-rag-test-cache"),
            ..EmbeddingConfig::default()
        };
        let embedder = OnnxEmbedder::new(&config);
        assert!(!embedder.is_loaded());
        assert_eq!(embedder.dimensions(), 384);
        assert_eq!(embedder.model_id(), "sentence-transformers/all-MiniLM-L6-v2");
        assert!(embedder
            .model_dir()
            .ends_with("sentence-transformers--all-MiniLM-L6-v2"));
    }
}
