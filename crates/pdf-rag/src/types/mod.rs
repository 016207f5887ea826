//! Core types for the RAG pipeline

pub mod conversation;
pub mod document;
pub mod response;

pub use conversation::{Conversation, Message, Role};
pub use document::{Document, FileType, Segment};
pub use response::{
    Answer, Citation, DocumentSummary, FinishReason, GenerationResult, IngestResponse,
    RetrievalResult, ScoredSegment,
};
