//! Scratch storage for uploaded bytes
//!
//! Uploads are spooled to a named temporary file for parsing. The file is
//! removed when the guard drops, whether ingestion succeeds or fails.

use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::error::Result;

/// Temporary copy of an upload, deleted on drop
#[derive(Debug)]
pub struct TempUpload {
    file: NamedTempFile,
}

impl TempUpload {
    /// Write `data` to a fresh temporary file with the given suffix (e.g. ".pdf")
    pub fn create(data: &[u8], suffix: &str) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("pdf-rag-upload-")
            .suffix(suffix)
            .tempfile()?;
        file.write_all(data)?;
        file.flush()?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}
