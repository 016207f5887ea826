//! Document and segment types with source tracking for citations

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Supported upload types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// Plain text file
    Txt,
    /// Markdown file
    Markdown,
    /// Unknown file type
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "txt" | "text" => Self::Txt,
            "md" | "markdown" => Self::Markdown,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from a filename, falling back to the PDF magic bytes
    pub fn detect(filename: &str, data: &[u8]) -> Self {
        let by_name = filename
            .rsplit_once('.')
            .map(|(_, ext)| Self::from_extension(ext))
            .unwrap_or(Self::Unknown);

        if by_name == Self::Unknown && data.starts_with(b"%PDF") {
            Self::Pdf
        } else {
            by_name
        }
    }

    /// Check if this is a supported file type
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Get display name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Pdf => "PDF",
            Self::Txt => "Text File",
            Self::Markdown => "Markdown",
            Self::Unknown => "Unknown",
        }
    }
}

/// An uploaded document. Lives only for the duration of one ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document ID
    pub id: Uuid,
    /// Filename as uploaded by the user
    pub filename: String,
    /// File type
    pub file_type: FileType,
    /// SHA-256 of the uploaded bytes
    pub content_hash: String,
    /// Total number of pages (if applicable)
    pub total_pages: Option<u32>,
    /// Total number of segments created
    pub total_segments: u32,
    /// File size in bytes
    pub file_size: u64,
    /// Ingestion timestamp
    pub ingested_at: chrono::DateTime<chrono::Utc>,
}

impl Document {
    /// Create a new document record
    pub fn new(filename: String, file_type: FileType, content_hash: String, file_size: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename,
            file_type,
            content_hash,
            total_pages: None,
            total_segments: 0,
            file_size,
            ingested_at: chrono::Utc::now(),
        }
    }
}

/// An ordered, immutable span of extracted document text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    document_id: Uuid,
    sequence_index: u32,
    text: String,
    char_start: usize,
    char_end: usize,
    page_number: Option<u32>,
}

impl Segment {
    /// Create a segment. Offsets are character (not byte) positions in the
    /// extracted document text, `char_start..char_end`.
    pub fn new(
        document_id: Uuid,
        sequence_index: u32,
        text: String,
        char_start: usize,
        char_end: usize,
    ) -> Self {
        Self {
            document_id,
            sequence_index,
            text,
            char_start,
            char_end,
            page_number: None,
        }
    }

    /// Attach the 1-indexed page the segment starts on
    pub fn with_page(mut self, page_number: u32) -> Self {
        self.page_number = Some(page_number);
        self
    }

    pub fn document_id(&self) -> Uuid {
        self.document_id
    }

    pub fn sequence_index(&self) -> u32 {
        self.sequence_index
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn char_start(&self) -> usize {
        self.char_start
    }

    pub fn char_end(&self) -> usize {
        self.char_end
    }

    pub fn page_number(&self) -> Option<u32> {
        self.page_number
    }

    /// Length in characters
    pub fn char_len(&self) -> usize {
        self.char_end - self.char_start
    }

    /// Format source for display
    pub fn format_source(&self) -> String {
        match self.page_number {
            Some(page) => format!("Segment {}, Page {}", self.sequence_index + 1, page),
            None => format!("Segment {}", self.sequence_index + 1),
        }
    }
}
