//! pdf-rag: question answering over a single uploaded PDF
//!
//! A document is split into overlapping segments, embedded and indexed in
//! memory. Each question is embedded, the closest segments are retrieved and
//! placed into a prompt, and the model's answer comes back with short
//! excerpts of those segments as citations.
//!
//! [`RagContext`] owns the models and configuration and is shared across
//! sessions. [`Session`] owns everything per user: the bearer token, the
//! current document index and the transcript.

pub mod config;
pub mod credential;
pub mod embeddings;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod pipeline;
mod remote;
pub mod retrieval;
pub mod server;
pub mod session;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::RagConfig;
pub use credential::Credential;
pub use error::{Error, Result};
pub use pipeline::{DocumentIndex, RagContext};
pub use session::{Session, SessionStatus};
pub use types::{
    Answer, Citation, Conversation, FinishReason, GenerationResult, RetrievalResult, Segment,
};
