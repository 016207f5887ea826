//! Configuration for the RAG pipeline

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Main RAG configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Answer generation configuration
    pub llm: LlmConfig,
}

impl RagConfig {
    /// Load configuration from a TOML file; `PDF_RAG_*` variables win over the file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with(path.as_ref(), |key| std::env::var(key).ok())
    }

    fn load_with<F>(path: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let mut config: RagConfig = toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("Invalid config {}: {}", path.display(), e)))?;
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with `PDF_RAG_*` environment overrides applied
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `PDF_RAG_*` environment overrides in place
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PDF_RAG_CHUNK_SIZE") {
            self.chunking.chunk_size = parse_var("PDF_RAG_CHUNK_SIZE", &v)?;
        }
        if let Some(v) = lookup("PDF_RAG_CHUNK_OVERLAP") {
            self.chunking.chunk_overlap = parse_var("PDF_RAG_CHUNK_OVERLAP", &v)?;
        }
        if let Some(v) = lookup("PDF_RAG_TOP_K") {
            self.retrieval.top_k = parse_var("PDF_RAG_TOP_K", &v)?;
        }
        if let Some(v) = lookup("PDF_RAG_EMBEDDING_MODEL") {
            self.embeddings.model = v;
        }
        if let Some(v) = lookup("PDF_RAG_EMBEDDING_BACKEND") {
            self.embeddings.backend = match v.to_lowercase().as_str() {
                "onnx" => EmbeddingBackend::Onnx,
                "ollama" => EmbeddingBackend::Ollama,
                "huggingface" | "hf" => EmbeddingBackend::HuggingFace,
                other => {
                    return Err(Error::Config(format!(
                        "PDF_RAG_EMBEDDING_BACKEND must be onnx, ollama or huggingface, got '{}'",
                        other
                    )))
                }
            };
        }
        if let Some(v) = lookup("PDF_RAG_GENERATION_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = lookup("PDF_RAG_TEMPERATURE") {
            self.llm.temperature = parse_var("PDF_RAG_TEMPERATURE", &v)?;
        }
        if let Some(v) = lookup("PDF_RAG_MAX_OUTPUT_TOKENS") {
            self.llm.max_output_tokens = parse_var("PDF_RAG_MAX_OUTPUT_TOKENS", &v)?;
        }
        if let Some(v) = lookup("PDF_RAG_INFERENCE_ENDPOINT") {
            self.llm.endpoint = match v.to_lowercase().as_str() {
                "local" => InferenceEndpoint::Local,
                "remote" => InferenceEndpoint::Remote,
                other => {
                    return Err(Error::Config(format!(
                        "PDF_RAG_INFERENCE_ENDPOINT must be 'local' or 'remote', got '{}'",
                        other
                    )))
                }
            };
        }
        if let Some(v) = lookup("PDF_RAG_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Some(v) = lookup("PDF_RAG_HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("PDF_RAG_PORT") {
            self.server.port = parse_var("PDF_RAG_PORT", &v)?;
        }
        if let Some(v) = lookup("PDF_RAG_SESSION_TTL_SECS") {
            self.server.session_ttl_secs = parse_var("PDF_RAG_SESSION_TTL_SECS", &v)?;
        }
        Ok(())
    }

    /// Reject combinations the pipeline cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be greater than 0".to_string()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("top_k must be at least 1".to_string()));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(Error::Config(format!(
                "temperature must be within 0.0..=2.0, got {}",
                self.llm.temperature
            )));
        }
        if self.llm.max_output_tokens == 0 {
            return Err(Error::Config("max_output_tokens must be at least 1".to_string()));
        }
        if self.embeddings.batch_size == 0 {
            return Err(Error::Config("embedding batch_size must be at least 1".to_string()));
        }
        if self.server.session_ttl_secs == 0 {
            return Err(Error::Config("session_ttl_secs must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} has an invalid value: '{}'", key, value)))
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 50MB)
    pub max_upload_size: usize,
    /// Idle time after which a session and its index are dropped
    pub session_ttl_secs: u64,
}

impl ServerConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            enable_cors: true,
            max_upload_size: 50 * 1024 * 1024,
            session_ttl_secs: 3600,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum segment length in characters
    pub chunk_size: usize,
    /// Characters shared between consecutive segments
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of segments handed to the prompt
    pub top_k: usize,
    /// Characters of each segment shown as a citation excerpt
    pub excerpt_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            excerpt_chars: 200,
        }
    }
}

/// Where embeddings are computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// In-process ONNX Runtime
    Onnx,
    /// Local Ollama server
    Ollama,
    /// Hugging Face inference router (requires the session token)
    #[serde(alias = "hf")]
    HuggingFace,
}

impl EmbeddingBackend {
    /// Default base URL for HTTP backends
    pub fn default_base_url(&self) -> &'static str {
        match self {
            EmbeddingBackend::Onnx => "https://huggingface.co",
            EmbeddingBackend::Ollama => "http://localhost:11434",
            EmbeddingBackend::HuggingFace => "https://router.huggingface.co/hf-inference",
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Backend that computes embeddings
    pub backend: EmbeddingBackend,
    /// Model identifier (default: sentence-transformers/all-MiniLM-L6-v2)
    pub model: String,
    /// Embedding dimensions (384 for MiniLM)
    pub dimensions: usize,
    /// Token limit of the model's context window
    pub max_tokens: usize,
    /// Batch size for embedding generation
    pub batch_size: usize,
    /// Concurrent requests for HTTP backends without native batching
    pub parallel_requests: usize,
    /// Override for the backend's base URL
    pub base_url: Option<String>,
    /// Cache directory for downloaded model files
    pub cache_dir: PathBuf,
}

impl EmbeddingConfig {
    /// Base URL actually used by the backend
    pub fn effective_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.backend.default_base_url().to_string())
            .trim_end_matches('/')
            .to_string()
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Onnx,
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            dimensions: 384,
            max_tokens: 256,
            batch_size: 32,
            parallel_requests: 4,
            base_url: None,
            cache_dir: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("pdf-rag")
                .join("models"),
        }
    }
}

/// Local vs remote inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceEndpoint {
    /// Ollama on this machine or network
    Local,
    /// OpenAI-compatible chat completions API
    Remote,
}

impl InferenceEndpoint {
    /// Default base URL for this endpoint kind
    pub fn default_base_url(&self) -> &'static str {
        match self {
            InferenceEndpoint::Local => "http://localhost:11434",
            InferenceEndpoint::Remote => "https://router.huggingface.co/v1",
        }
    }
}

/// Answer generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Local or remote inference
    pub endpoint: InferenceEndpoint,
    /// Override for the endpoint's base URL
    pub base_url: Option<String>,
    /// Generation model name
    pub model: String,
    /// Sampling temperature (low for factual grounding)
    pub temperature: f32,
    /// Maximum tokens in the completion
    pub max_output_tokens: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for transient failures
    pub max_retries: u32,
}

impl LlmConfig {
    /// Base URL actually used by the generator
    pub fn effective_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.endpoint.default_base_url().to_string())
            .trim_end_matches('/')
            .to_string()
    }

    /// Request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: InferenceEndpoint::Remote,
            base_url: None,
            model: "HuggingFaceH4/zephyr-7b-beta:featherless-ai".to_string(),
            temperature: 0.1,
            max_output_tokens: 512,
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}
