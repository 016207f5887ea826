//! In-crate doubles for the embedder and generator

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::credential::Credential;
use crate::embeddings::{l2_normalize, Embedder};
use crate::error::{Error, Result};
use crate::generation::{Generator, ModelConfig};
use crate::types::{FinishReason, GenerationResult};

/// Deterministic bag-of-words embedder: each lowercase word is hashed into
/// a bucket, so texts sharing words score higher.
pub struct HashEmbedder {
    dimensions: usize,
    model_id: String,
    token_limit: Option<usize>,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            model_id: "hash-embedder".to_string(),
            token_limit: None,
        }
    }

    pub fn with_model_id(mut self, model_id: &str) -> Self {
        self.model_id = model_id.to_string();
        self
    }

    /// Reject texts with more words than `limit`
    pub fn with_token_limit(mut self, limit: usize) -> Self {
        self.token_limit = Some(limit);
        self
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimensions];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0xcbf29ce484222325u64, |h, b| (h ^ b as u64).wrapping_mul(0x100000001b3));
            v[(hash % self.dimensions as u64) as usize] += 1.0;
        }
        l2_normalize(&mut v);
        v
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str, _credential: Option<&Credential>) -> Result<Vec<f32>> {
        if let Some(limit) = self.token_limit {
            let tokens = text.split_whitespace().count();
            if tokens > limit {
                return Err(Error::InputTooLong { tokens, limit });
            }
        }
        Ok(self.vector(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "hash"
    }
}

type ErrorFactory = Box<dyn Fn() -> Error + Send + Sync>;

enum Script {
    Reply { text: String, finish: FinishReason },
    Fail(ErrorFactory),
}

/// Generator returning a fixed outcome and recording every prompt
pub struct ScriptedGenerator {
    script: Script,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedGenerator {
    pub fn reply(text: &str) -> Self {
        Self::with_finish(text, FinishReason::Stop)
    }

    pub fn with_finish(text: &str, finish: FinishReason) -> Self {
        Self {
            script: Script::Reply {
                text: text.to_string(),
                finish,
            },
            prompts: Arc::default(),
        }
    }

    pub fn failing<F>(error: F) -> Self
    where
        F: Fn() -> Error + Send + Sync + 'static,
    {
        Self {
            script: Script::Fail(Box::new(error)),
            prompts: Arc::default(),
        }
    }

    /// Shared handle to the prompts received so far
    pub fn prompts(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.prompts)
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(
        &self,
        prompt: &str,
        _config: &ModelConfig,
        _credential: Option<&Credential>,
    ) -> Result<GenerationResult> {
        self.prompts.lock().push(prompt.to_string());
        match &self.script {
            Script::Reply { text, finish } => Ok(GenerationResult {
                text: text.clone(),
                finish_reason: finish.clone(),
            }),
            Script::Fail(make) => Err(make()),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
