//! doc-rag: document ingestion and semantic retrieval
//!
//! Uploaded PDF, DOCX and plain-text files are extracted, split into
//! overlapping page-aware chunks, embedded through an Ollama-compatible
//! service when one is reachable, and persisted to SQLite. Search ranks
//! chunks by cosine similarity and falls back to case-insensitive substring
//! matching when no embeddings are available.

pub mod config;
pub mod error;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod storage;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use ingestion::{IngestPipeline, TextChunker, UploadedFile};
pub use retrieval::RetrievalEngine;
pub use storage::DocumentDb;
pub use types::{
    document::{Chunk, Document, FileType},
    query::{SearchFilters, SearchRequest},
    response::{RetrievalMode, SearchResult},
};
