//! PDF and plain-text parsing with page tracking

use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::FileType;

/// Upper bound for a single PDF text extraction
const PDF_EXTRACT_TIMEOUT: Duration = Duration::from_secs(60);

/// Parsed document with extracted text and page layout
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// File type
    pub file_type: FileType,
    /// Extracted text, pages joined by blank lines
    pub content: String,
    /// SHA-256 of the uploaded bytes
    pub content_hash: String,
    /// Total pages (if applicable)
    pub total_pages: Option<u32>,
    /// Page-level content
    pub pages: Vec<PageContent>,
}

impl ParsedDocument {
    /// `(char_offset, page_number)` for each non-empty page, in order
    pub fn page_starts(&self) -> Vec<(usize, u32)> {
        self.pages.iter().map(|p| (p.char_offset, p.page_number)).collect()
    }
}

/// Content from a single page
#[derive(Debug, Clone)]
pub struct PageContent {
    /// Page number (1-indexed)
    pub page_number: u32,
    /// Text content of the page
    pub content: String,
    /// Character offset in the full document text
    pub char_offset: usize,
}

/// File parser for the supported upload types
pub struct FileParser;

impl FileParser {
    /// Parse a file spooled to disk
    pub fn parse_path(path: &Path, filename: &str) -> Result<ParsedDocument> {
        let data = std::fs::read(path).map_err(|e| {
            Error::ingestion(filename, format!("Failed to read uploaded file: {}", e))
        })?;
        Self::parse(filename, &data)
    }

    /// Parse a file based on its name and magic bytes
    pub fn parse(filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        if data.is_empty() {
            return Err(Error::ingestion(filename, "The uploaded file is empty"));
        }

        let file_type = FileType::detect(filename, data);
        let content_hash = hash_bytes(data);

        let (pages, total_pages) = match file_type {
            FileType::Pdf => {
                let page_texts = Self::extract_pdf_pages(filename, data)?;
                let total = page_count(data).unwrap_or(page_texts.len() as u32);
                (page_texts, Some(total))
            }
            FileType::Txt | FileType::Markdown => {
                let text = std::str::from_utf8(data)
                    .map_err(|_| Error::ingestion(filename, "Text file is not valid UTF-8"))?;
                (vec![normalize_text(text)], None)
            }
            FileType::Unknown => {
                return Err(Error::ingestion(
                    filename,
                    "Unsupported file type. Please upload a PDF document.",
                ))
            }
        };

        let (content, pages) = join_pages(pages);
        if content.trim().is_empty() {
            return Err(Error::ingestion(
                filename,
                "No text content could be extracted. The file may be scanned images or encrypted.",
            ));
        }

        tracing::debug!(
            "Parsed '{}' ({}): {} chars across {} pages",
            filename,
            file_type.display_name(),
            content.chars().count(),
            pages.len()
        );

        Ok(ParsedDocument {
            file_type,
            content,
            content_hash,
            total_pages,
            pages,
        })
    }

    /// Extract per-page PDF text on a worker thread bounded by a timeout
    fn extract_pdf_pages(filename: &str, data: &[u8]) -> Result<Vec<String>> {
        let data_vec = data.to_vec();
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            let result = pdf_extract::extract_text_from_mem_by_pages(&data_vec);
            let _ = tx.send(result);
        });

        let pages = match rx.recv_timeout(PDF_EXTRACT_TIMEOUT) {
            Ok(Ok(pages)) => {
                let _ = handle.join();
                pages
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                tracing::warn!("pdf-extract failed on '{}': {}, trying lopdf", filename, e);
                Self::extract_pdf_pages_fallback(filename, data)?
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::error!(
                    "PDF extraction of '{}' exceeded {:?}, trying lopdf",
                    filename,
                    PDF_EXTRACT_TIMEOUT
                );
                Self::extract_pdf_pages_fallback(filename, data)?
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                tracing::error!("PDF extraction thread for '{}' crashed", filename);
                Self::extract_pdf_pages_fallback(filename, data)?
            }
        };

        Ok(pages.iter().map(|p| normalize_text(p)).collect())
    }

    /// Page text through lopdf's own text extraction
    fn extract_pdf_pages_fallback(filename: &str, data: &[u8]) -> Result<Vec<String>> {
        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::ingestion(filename, format!("Not a readable PDF: {}", e)))?;

        let pages: Vec<String> = doc
            .get_pages()
            .keys()
            .map(|&number| match doc.extract_text(&[number]) {
                Ok(text) => text,
                Err(e) => {
                    tracing::debug!("No text on page {} of '{}': {}", number, filename, e);
                    String::new()
                }
            })
            .collect();

        if pages.iter().all(|p| p.trim().is_empty()) {
            return Err(Error::ingestion(
                filename,
                "PDF appears to be image-based or has no extractable text",
            ));
        }
        Ok(pages)
    }
}

/// Join page texts with blank lines, recording each page's char offset.
/// Empty pages keep their number but contribute no text.
fn join_pages(page_texts: Vec<String>) -> (String, Vec<PageContent>) {
    let mut content = String::new();
    let mut offset = 0usize;
    let mut pages = Vec::with_capacity(page_texts.len());

    for (i, text) in page_texts.into_iter().enumerate() {
        let text = text.trim().to_string();
        if text.is_empty() {
            continue;
        }
        if !content.is_empty() {
            content.push_str("\n\n");
            offset += 2;
        }
        let len = text.chars().count();
        content.push_str(&text);
        pages.push(PageContent {
            page_number: i as u32 + 1,
            content: text,
            char_offset: offset,
        });
        offset += len;
    }

    (content, pages)
}

/// Strip control noise and font ligatures left by PDF extraction
fn normalize_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\0', "")
        .replace('\u{00A0}', " ")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
        .lines()
        .map(|l| l.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

fn page_count(data: &[u8]) -> Option<u32> {
    lopdf::Document::load_mem(data)
        .ok()
        .map(|doc| doc.get_pages().len() as u32)
}

/// Hash raw bytes for document identity
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
