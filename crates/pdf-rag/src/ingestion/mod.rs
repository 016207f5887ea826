//! Document ingestion: parsing, temporary spooling and chunking

mod chunker;
mod parser;
mod processor;
mod temp;

pub use chunker::{Span, TextChunker};
pub use parser::{hash_bytes, FileParser, PageContent, ParsedDocument};
pub use processor::IngestPipeline;
pub use temp::TempUpload;
