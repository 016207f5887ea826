//! Upload processing: spool, parse, chunk

use std::time::Instant;

use super::chunker::TextChunker;
use super::parser::{FileParser, ParsedDocument};
use super::temp::TempUpload;
use crate::error::{Error, Result};
use crate::types::{Document, FileType, Segment};

/// Turns uploaded bytes into a document record and its ordered segments
#[derive(Debug, Clone)]
pub struct IngestPipeline {
    chunker: TextChunker,
}

impl IngestPipeline {
    /// Create a pipeline with the given chunking parameters
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunker: TextChunker::new(chunk_size, chunk_overlap),
        }
    }

    pub fn chunker(&self) -> &TextChunker {
        &self.chunker
    }

    /// Spool the upload to a temporary file and parse it from disk.
    /// The temporary file is gone when this returns, on success or error.
    pub fn parse_upload(&self, filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        if data.is_empty() {
            return Err(Error::ingestion(filename, "The uploaded file is empty"));
        }

        let suffix = match FileType::detect(filename, data) {
            FileType::Pdf => ".pdf",
            FileType::Markdown => ".md",
            _ => ".txt",
        };
        let upload = TempUpload::create(data, suffix)?;
        FileParser::parse_path(upload.path(), filename)
    }

    /// Split parsed text into segments, updating the document's counts
    pub fn create_segments(&self, doc: &mut Document, parsed: &ParsedDocument) -> Result<Vec<Segment>> {
        let segments = self
            .chunker
            .split_with_pages(doc.id, &parsed.content, &parsed.page_starts());

        if segments.is_empty() {
            return Err(Error::ingestion(&doc.filename, "Document produced zero segments"));
        }

        doc.total_segments = segments.len() as u32;
        Ok(segments)
    }

    /// Parse and chunk an upload
    pub fn process(&self, filename: &str, data: &[u8]) -> Result<(Document, Vec<Segment>)> {
        let start = Instant::now();
        let parsed = self.parse_upload(filename, data)?;

        let mut doc = Document::new(
            filename.to_string(),
            parsed.file_type,
            parsed.content_hash.clone(),
            data.len() as u64,
        );
        doc.total_pages = parsed.total_pages;

        let segments = self.create_segments(&mut doc, &parsed)?;

        tracing::info!(
            "Chunked '{}' into {} segments (size {}, overlap {}) in {}ms",
            filename,
            segments.len(),
            self.chunker.chunk_size(),
            self.chunker.overlap(),
            start.elapsed().as_millis()
        );

        Ok((doc, segments))
    }
}
