//! Retrieval, generation and answer types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::{Document, FileType, Segment};

/// A retrieved segment with its cosine similarity to the query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredSegment {
    /// The retrieved segment
    pub segment: Segment,
    /// Cosine similarity (-1.0..=1.0, higher is more relevant)
    pub score: f32,
}

/// Segments ordered by descending relevance, at most `k` long
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub hits: Vec<ScoredSegment>,
}

impl RetrievalResult {
    pub fn new(hits: Vec<ScoredSegment>) -> Self {
        Self { hits }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoredSegment> {
        self.hits.iter()
    }

    /// Segment texts in relevance order
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.hits.iter().map(|h| h.segment.text())
    }
}

/// Why the model stopped producing tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of the completion
    Stop,
    /// Cut off at `max_output_tokens`
    Length,
    /// Provider-specific reason
    Other(String),
}

impl FinishReason {
    /// Map a provider's finish/done reason string
    pub fn from_provider(reason: Option<&str>) -> Self {
        match reason {
            None | Some("stop") | Some("eos") | Some("end_turn") | Some("stop_sequence") => {
                Self::Stop
            }
            Some("length") | Some("max_tokens") => Self::Length,
            Some(other) => Self::Other(other.to_string()),
        }
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Length)
    }
}

/// Raw output of the answer generator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub text: String,
    pub finish_reason: FinishReason,
}

/// Short excerpt of a retrieved segment for citation display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    /// Position of the segment in the document
    pub sequence_index: u32,
    /// Page number (if known)
    pub page_number: Option<u32>,
    /// Similarity score of the segment
    pub similarity_score: f32,
    /// Leading characters of the segment
    pub excerpt: String,
}

impl Citation {
    /// Create a citation from a retrieved segment
    pub fn from_hit(hit: &ScoredSegment, excerpt_chars: usize) -> Self {
        Self {
            sequence_index: hit.segment.sequence_index(),
            page_number: hit.segment.page_number(),
            similarity_score: hit.score,
            excerpt: crate::generation::citation::excerpt(hit.segment.text(), excerpt_chars),
        }
    }
}

/// Generated answer plus the retrieval it was grounded on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// Generated answer text
    pub text: String,
    /// Citations in retrieval order
    pub citations: Vec<Citation>,
    /// The retrieval the prompt was assembled from
    #[serde(skip_serializing)]
    pub sources: RetrievalResult,
    /// The model stopped at the output limit
    pub truncated: bool,
    /// Generation model
    pub model: String,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

impl Answer {
    /// Excerpt strings in retrieval order
    pub fn excerpts(&self) -> Vec<&str> {
        self.citations.iter().map(|c| c.excerpt.as_str()).collect()
    }
}

/// Summary of an ingested document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    /// Document ID
    pub id: Uuid,
    /// Filename
    pub filename: String,
    /// File type
    pub file_type: FileType,
    /// Number of pages (if applicable)
    pub total_pages: Option<u32>,
    /// Number of segments created
    pub total_segments: u32,
    /// File size in bytes
    pub file_size: u64,
    /// Embedding model the index was built with
    pub embedding_model: String,
    /// Ingestion timestamp
    pub ingested_at: chrono::DateTime<chrono::Utc>,
}

impl DocumentSummary {
    pub fn new(doc: &Document, embedding_model: &str) -> Self {
        Self {
            id: doc.id,
            filename: doc.filename.clone(),
            file_type: doc.file_type,
            total_pages: doc.total_pages,
            total_segments: doc.total_segments,
            file_size: doc.file_size,
            embedding_model: embedding_model.to_string(),
            ingested_at: doc.ingested_at,
        }
    }
}

/// Response from document ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    /// Guidance for the user
    pub message: String,
    /// The ingested document
    pub document: DocumentSummary,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_reason_mapping() {
        assert_eq!(FinishReason::from_provider(Some("stop")), FinishReason::Stop);
        assert_eq!(FinishReason::from_provider(None), FinishReason::Stop);
        assert!(FinishReason::from_provider(Some("length")).is_truncated());
        assert_eq!(
            FinishReason::from_provider(Some("content_filter")),
            FinishReason::Other("content_filter".to_string())
        );
    }

    #[test]
    fn test_citation_from_hit() {
        let segment = Segment::new(Uuid::new_v4(), 1, "x".repeat(500), 0, 500).with_page(2);
        let hit = ScoredSegment { segment, score: 0.8 };
        let citation = Citation::from_hit(&hit, 200);
        assert_eq!(citation.sequence_index, 1);
        assert_eq!(citation.page_number, Some(2));
        assert_eq!(citation.excerpt, format!("{}...", "x".repeat(200)));
    }
}
