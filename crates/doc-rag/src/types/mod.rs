//! Core types for the ingestion and retrieval engine

pub mod document;
pub mod query;
pub mod response;

pub use document::{Chunk, Document, FileType, NewDocument, UploadMetadata};
pub use query::{SearchFilters, SearchRequest};
pub use response::{
    ActionResponse, ChunkSummary, DocumentDetailResponse, DocumentListResponse, DocumentSummary,
    RetrievalMode, SearchResponse, SearchResult, UploadResponse,
};
