//! Document and chunk records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Source formats the extractor understands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document, extracted page by page
    Pdf,
    /// Plain text file
    Txt,
    /// Legacy Word document, read as plain text
    Doc,
    /// Word document (.docx)
    Docx,
}

impl FileType {
    /// Detect file type from extension; `None` is the unsupported case
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" => Some(Self::Txt),
            "doc" => Some(Self::Doc),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }

    /// Detect file type from the extension of a filename
    pub fn from_filename(filename: &str) -> Option<Self> {
        extension_of(filename).and_then(|ext| Self::from_extension(&ext))
    }

    /// Canonical extension, lowercase without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Txt => "txt",
            Self::Doc => "doc",
            Self::Docx => "docx",
        }
    }

    /// Mime type used when the client does not declare one
    pub fn default_mime_type(&self) -> String {
        mime_guess::from_ext(self.extension())
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }
}

/// Lowercase extension of a filename, if it has one
pub fn extension_of(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Strip directory components and unsafe characters from a user-supplied filename
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();

    cleaned.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Caller-supplied metadata for an upload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadMetadata {
    pub category: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub uploaded_by: Option<String>,
}

/// Fully resolved fields for a document about to be registered
#[derive(Debug, Clone)]
pub struct NewDocument {
    /// User-supplied filename, sanitized
    pub original_filename: String,
    pub file_type: FileType,
    pub mime_type: String,
    pub category: String,
    pub title: String,
    pub description: String,
    pub uploaded_by: String,
}

/// An uploaded document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique document ID
    pub id: Uuid,
    /// System-assigned storage name (`<id>.<ext>`)
    pub filename: String,
    /// Filename as uploaded by the user (sanitized)
    pub original_filename: String,
    /// Location of the stored bytes
    pub file_path: String,
    /// File size in bytes
    pub file_size: u64,
    pub mime_type: Option<String>,
    pub category: String,
    pub title: String,
    pub description: String,
    pub uploaded_by: String,
    pub upload_date: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    /// Set only after a processing run completes
    pub is_indexed: bool,
    /// Cleared by soft delete; inactive documents are excluded from search
    pub is_active: bool,
}

impl Document {
    /// Create an unindexed, active document record
    pub fn new(id: Uuid, new: NewDocument, file_path: String, file_size: u64) -> Self {
        let now = Utc::now();
        Self {
            id,
            filename: format!("{}.{}", id, new.file_type.extension()),
            original_filename: new.original_filename,
            file_path,
            file_size,
            mime_type: Some(new.mime_type),
            category: new.category,
            title: new.title,
            description: new.description,
            uploaded_by: new.uploaded_by,
            upload_date: now,
            last_updated: now,
            is_indexed: false,
            is_active: true,
        }
    }

    /// Format derived from the system-assigned filename
    pub fn file_type(&self) -> Option<FileType> {
        FileType::from_filename(&self.filename)
    }
}

/// A retrieval unit cut from a document's extracted text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: Uuid,
    /// Owning document
    pub document_id: Uuid,
    /// 0-based, contiguous within a document
    pub chunk_index: u32,
    pub content: String,
    /// 1-indexed page the chunk starts on
    pub page_number: u32,
    /// Char offsets into the extracted text
    pub start_char: usize,
    pub end_char: usize,
    /// Absent when no embedder was available or embedding failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}

impl Chunk {
    /// Whether the chunk can take part in semantic ranking
    pub fn has_embedding(&self) -> bool {
        self.embedding.as_ref().is_some_and(|e| !e.is_empty())
    }
}
