//! Document ingestion: text extraction, chunking and the processing pipeline

pub mod chunker;
pub mod parser;
pub mod pipeline;

pub use chunker::{ChunkDraft, TextChunker};
pub use parser::{ExtractedText, FileParser, PageSpan};
pub use pipeline::{IngestPipeline, ProcessReport, UploadedFile};
