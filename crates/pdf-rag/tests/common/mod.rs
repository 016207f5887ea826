//! Deterministic doubles shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pdf_rag::credential::Credential;
use pdf_rag::embeddings::Embedder;
use pdf_rag::error::Result;
use pdf_rag::generation::{Generator, ModelConfig};
use pdf_rag::types::{FinishReason, GenerationResult};

/// Bag-of-words embedder: each lowercase word lands in a hashed bucket
pub struct KeywordEmbedder {
    dimensions: usize,
    calls: Arc<AtomicUsize>,
}

impl KeywordEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counter of `embed` calls, shared with the embedder
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimensions];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0xcbf29ce484222325u64, |h, b| {
                    (h ^ b as u64).wrapping_mul(0x100000001b3)
                });
            v[(hash % self.dimensions as u64) as usize] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str, _credential: Option<&Credential>) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        "keyword-test-embedder"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// Generator that always answers with the same text
pub struct CannedGenerator {
    text: String,
    finish: FinishReason,
}

impl CannedGenerator {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            finish: FinishReason::Stop,
        }
    }
}

#[async_trait]
impl Generator for CannedGenerator {
    async fn generate(
        &self,
        _prompt: &str,
        _config: &ModelConfig,
        _credential: Option<&Credential>,
    ) -> Result<GenerationResult> {
        Ok(GenerationResult {
            text: self.text.clone(),
            finish_reason: self.finish.clone(),
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "canned"
    }
}

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn spawn_stub(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Readable text of roughly `target_len` characters, in paragraphs
pub fn report_text(target_len: usize) -> String {
    let sentences = [
        "The audit covered all regional offices.",
        "Revenue rose steadily through the autumn months.",
        "Shipping costs were renegotiated with two carriers.",
        "Headcount stayed flat across engineering and sales.",
        "The board approved a new travel policy.",
    ];
    let mut text = String::new();
    let mut i = 0;
    while text.chars().count() < target_len {
        text.push_str(sentences[i % sentences.len()]);
        text.push(if i % 4 == 3 { '\n' } else { ' ' });
        if i % 8 == 7 {
            text.push('\n');
        }
        i += 1;
    }
    text.chars().take(target_len).collect()
}
