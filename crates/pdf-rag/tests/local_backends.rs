//! Ollama embedder and generator against a stub server.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{routing::post, Json, Router};
use pdf_rag::config::{EmbeddingBackend, EmbeddingConfig, InferenceEndpoint, LlmConfig};
use pdf_rag::embeddings::{Embedder, OllamaEmbedder};
use pdf_rag::generation::{Generator, OllamaClient};
use pdf_rag::types::FinishReason;
use serde_json::{json, Value};

use common::spawn_stub;

/// Answers `segment-N` with `[N, 1.0]`, earlier segments answering last
fn slow_first_embeddings() -> Router {
    Router::new().route(
        "/api/embeddings",
        post(|Json(body): Json<Value>| async move {
            let prompt = body["prompt"].as_str().unwrap_or_default();
            let n: u64 = prompt.trim_start_matches("segment-").parse().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis((6 - n.min(6)) * 25)).await;
            Json(json!({"embedding": [n as f32, 1.0]}))
        }),
    )
}

async fn ollama_embedder(parallel_requests: usize) -> OllamaEmbedder {
    let config = EmbeddingConfig {
        backend: EmbeddingBackend::Ollama,
        model: "nomic-embed-text".to_string(),
        dimensions: 2,
        parallel_requests,
        base_url: Some(spawn_stub(slow_first_embeddings()).await),
        ..EmbeddingConfig::default()
    };
    OllamaEmbedder::new(&config).unwrap()
}

#[tokio::test]
async fn test_concurrent_embeddings_keep_input_order() {
    let embedder = ollama_embedder(4).await;
    let texts: Vec<String> = (0..6).map(|i| format!("segment-{}", i)).collect();

    let vectors = embedder.embed_batch(&texts, None).await.unwrap();

    assert_eq!(vectors.len(), texts.len());
    for (i, vector) in vectors.iter().enumerate() {
        assert_eq!(vector[0], i as f32);
    }
}

#[tokio::test]
async fn test_single_embedding_needs_no_credential() {
    let embedder = ollama_embedder(1).await;
    let vector = embedder.embed("segment-3", None).await.unwrap();
    assert_eq!(vector, vec![3.0, 1.0]);
    assert_eq!(embedder.model_id(), "nomic-embed-text");
}

#[tokio::test]
async fn test_length_cutoff_from_local_model() {
    let seen = Arc::new(Mutex::new(None));
    let captured = Arc::clone(&seen);
    let stub = Router::new().route(
        "/api/generate",
        post(move |Json(body): Json<Value>| {
            let captured = Arc::clone(&captured);
            async move {
                *captured.lock().unwrap() = Some(body);
                Json(json!({
                    "model": "llama3.2:3b",
                    "response": " The audit covered",
                    "done": true,
                    "done_reason": "length"
                }))
            }
        }),
    );
    let config = LlmConfig {
        endpoint: InferenceEndpoint::Local,
        base_url: Some(spawn_stub(stub).await),
        model: "llama3.2:3b".to_string(),
        max_output_tokens: 16,
        max_retries: 0,
        timeout_secs: 5,
        ..LlmConfig::default()
    };

    let result = OllamaClient::new(&config)
        .unwrap()
        .generate("Context:\nnothing\n\nQuestion:\nanything", &config, None)
        .await
        .unwrap();

    assert_eq!(result.text, "The audit covered");
    assert_eq!(result.finish_reason, FinishReason::Length);

    let body = seen.lock().unwrap().take().unwrap();
    assert_eq!(body["model"], "llama3.2:3b");
    assert_eq!(body["stream"], false);
    assert_eq!(body["options"]["num_predict"], 16);
}
