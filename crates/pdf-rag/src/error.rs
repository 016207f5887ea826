//! Error types for the RAG pipeline

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for RAG operations
pub type Result<T> = std::result::Result<T, Error>;

/// RAG pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Document could not be turned into segments (unreadable, empty, no text)
    #[error("Ingestion failed for '{document}': {message}")]
    Ingestion { document: String, message: String },

    /// Embedding generation or model loading failed
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Input exceeds the embedding model's token limit
    #[error("Input of {tokens} tokens exceeds the embedding model limit of {limit}")]
    InputTooLong { tokens: usize, limit: usize },

    /// Index could not be built
    #[error("Index build failed: {0}")]
    IndexBuild(String),

    /// Remote inference is configured but the session has no token
    #[error("An API token is required")]
    CredentialRequired,

    /// Missing or rejected credential
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Provider rate limit hit
    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Provider quota or credits exhausted
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Remote call did not complete in time
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Model identifier is invalid or not served by the endpoint
    #[error("Model '{model}' is unavailable: {message}")]
    ModelUnavailable { model: String, message: String },

    /// Any other generation failure
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Provider answered with an unexpected HTTP status
    #[error("Provider returned HTTP {status}: {message}")]
    Upstream { status: u16, message: String },

    /// A question arrived before any document was ingested
    #[error("No document has been ingested for this session")]
    NoDocument,

    /// Session not found
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Malformed client request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an ingestion error
    pub fn ingestion(document: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Ingestion {
            document: document.into(),
            message: message.into(),
        }
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create an index build error
    pub fn index_build(message: impl Into<String>) -> Self {
        Self::IndexBuild(message.into())
    }

    /// Create a generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    /// Create a model-unavailable error
    pub fn model_unavailable(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModelUnavailable {
            model: model.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether a retry with backoff may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::RateLimit { .. } | Error::Timeout(_) => true,
            Error::Upstream { status, .. } => *status >= 500,
            Error::Http(err) => err.is_connect() || err.is_timeout(),
            _ => false,
        }
    }

    /// Readable message for the end user. Never includes credentials.
    pub fn user_message(&self) -> String {
        match self {
            Error::Config(msg) => format!("The service is misconfigured: {}", msg),
            Error::Ingestion { message, .. } => {
                format!("The document could not be processed: {}", message)
            }
            Error::Embedding(_) | Error::InputTooLong { .. } => {
                "The document could not be indexed because text embedding failed. Please try again.".to_string()
            }
            Error::IndexBuild(_) => {
                "The document produced no searchable text, so no index could be built.".to_string()
            }
            Error::CredentialRequired => crate::session::CREDENTIAL_REQUIRED_MESSAGE.to_string(),
            Error::Authentication(_) => {
                "Your API token was rejected. Please check the token and try again.".to_string()
            }
            Error::RateLimit { .. } => {
                "The model provider is rate limiting requests. Please wait a moment and try again.".to_string()
            }
            Error::QuotaExceeded(_) => {
                "Your quota with the model provider is exhausted.".to_string()
            }
            Error::Timeout(elapsed) => format!(
                "The model did not answer within {} seconds. Please try again.",
                elapsed.as_secs()
            ),
            Error::ModelUnavailable { model, .. } => {
                format!("The model '{}' is not available from the configured provider.", model)
            }
            Error::Generation(_) | Error::Upstream { .. } | Error::Http(_) => {
                "The model provider returned an error. Please try again.".to_string()
            }
            Error::NoDocument => crate::session::UPLOAD_REQUIRED_MESSAGE.to_string(),
            Error::SessionNotFound(_) => {
                "Your session has expired. Please start a new one.".to_string()
            }
            Error::InvalidRequest(msg) => msg.clone(),
            Error::Io(_) | Error::Json(_) | Error::Internal(_) => {
                "An internal error occurred.".to_string()
            }
        }
    }

    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            Error::Ingestion { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "ingestion_error"),
            Error::Embedding(_) | Error::InputTooLong { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "embedding_error")
            }
            Error::IndexBuild(_) => (StatusCode::UNPROCESSABLE_ENTITY, "index_build_error"),
            Error::CredentialRequired => (StatusCode::UNAUTHORIZED, "credential_required"),
            Error::Authentication(_) => (StatusCode::UNAUTHORIZED, "authentication_error"),
            Error::RateLimit { .. } => (StatusCode::TOO_MANY_REQUESTS, "rate_limit_error"),
            Error::QuotaExceeded(_) => (StatusCode::PAYMENT_REQUIRED, "quota_exceeded"),
            Error::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            Error::ModelUnavailable { .. } => (StatusCode::BAD_GATEWAY, "model_unavailable"),
            Error::Generation(_) => (StatusCode::BAD_GATEWAY, "generation_error"),
            Error::Upstream { .. } => (StatusCode::BAD_GATEWAY, "upstream_error"),
            Error::NoDocument => (StatusCode::CONFLICT, "no_document"),
            Error::SessionNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            Error::Json(_) => (StatusCode::BAD_REQUEST, "json_error"),
            Error::Http(_) => (StatusCode::BAD_GATEWAY, "http_error"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_type();

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.user_message(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let rate = Error::RateLimit {
            message: "slow down".to_string(),
            retry_after: None,
        };
        assert!(rate.is_retryable());
        assert!(Error::Timeout(Duration::from_secs(5)).is_retryable());
        assert!(!Error::Authentication("bad token".to_string()).is_retryable());
        assert!(!Error::model_unavailable("m", "unknown").is_retryable());
        assert!(Error::Upstream { status: 503, message: String::new() }.is_retryable());
        assert!(!Error::Upstream { status: 400, message: String::new() }.is_retryable());
    }

    #[test]
    fn test_user_message_hides_details() {
        let err = Error::Authentication("hf_secret_token rejected".to_string());
        let msg = err.user_message();
        assert!(!msg.contains("hf_secret_token"));
        assert!(msg.contains("token"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            Error::Authentication(String::new()).status_and_type().0,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(Error::NoDocument.status_and_type().0, StatusCode::CONFLICT);
        assert_eq!(
            Error::Timeout(Duration::from_secs(1)).status_and_type().0,
            StatusCode::GATEWAY_TIMEOUT
        );
    }
}
