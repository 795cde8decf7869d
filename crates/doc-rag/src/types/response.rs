//! Response types for search and document management

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::{Chunk, Document};

/// How a search call ranked its candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    /// Cosine similarity against stored embeddings
    Semantic,
    /// Case-insensitive substring match with a fixed score
    Lexical,
}

/// A single ranked passage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub document_id: Uuid,
    pub title: String,
    pub chunk_id: Uuid,
    pub chunk_index: u32,
    pub chunk_content: String,
    pub page_number: u32,
    /// Cosine similarity in [-1, 1], or the lexical fallback constant
    pub score: f32,
    pub mode: RetrievalMode,
}

/// Response for `GET /api/search`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    /// Echo of the query text
    pub query: String,
    pub total: usize,
}

impl SearchResponse {
    pub fn new(query: String, results: Vec<SearchResult>) -> Self {
        Self {
            total: results.len(),
            results,
            query,
        }
    }
}

/// Response for an accepted upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub document_id: Uuid,
    /// Always "accepted"; indexing continues in the background
    pub status: String,
    pub document: DocumentSummary,
}

/// Document fields exposed over the API (no storage path)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: Uuid,
    pub filename: String,
    pub original_filename: String,
    pub file_size: u64,
    pub mime_type: Option<String>,
    pub category: String,
    pub title: String,
    pub description: String,
    pub uploaded_by: String,
    pub upload_date: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub is_indexed: bool,
    pub is_active: bool,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id,
            filename: doc.filename.clone(),
            original_filename: doc.original_filename.clone(),
            file_size: doc.file_size,
            mime_type: doc.mime_type.clone(),
            category: doc.category.clone(),
            title: doc.title.clone(),
            description: doc.description.clone(),
            uploaded_by: doc.uploaded_by.clone(),
            upload_date: doc.upload_date,
            last_updated: doc.last_updated,
            is_indexed: doc.is_indexed,
            is_active: doc.is_active,
        }
    }
}

/// Response for document listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentSummary>,
    pub total_count: usize,
}

/// Chunk fields exposed over the API (embedding reduced to a flag)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSummary {
    pub id: Uuid,
    pub chunk_index: u32,
    pub content: String,
    pub page_number: u32,
    pub start_char: usize,
    pub end_char: usize,
    pub has_embedding: bool,
}

impl From<&Chunk> for ChunkSummary {
    fn from(chunk: &Chunk) -> Self {
        Self {
            id: chunk.id,
            chunk_index: chunk.chunk_index,
            content: chunk.content.clone(),
            page_number: chunk.page_number,
            start_char: chunk.start_char,
            end_char: chunk.end_char,
            has_embedding: chunk.has_embedding(),
        }
    }
}

/// Document with its chunks in index order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentDetailResponse {
    pub document: DocumentSummary,
    pub chunks: Vec<ChunkSummary>,
}

/// Response for reprocess, deactivate and delete
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub document_id: Uuid,
}
