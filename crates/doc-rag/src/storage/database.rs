//! SQLite persistence for documents and their chunks

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{Chunk, Document, SearchFilters};

const DOCUMENT_COLUMNS: &str = "id, filename, original_filename, file_path, file_size, mime_type, \
     category, title, description, uploaded_by, upload_date, last_updated, is_indexed, is_active";

const CHUNK_COLUMNS: &str =
    "id, document_id, chunk_index, content, page_number, start_char, end_char, embedding, created_at";

/// Embedding column as read back from storage
#[derive(Debug, Clone, PartialEq)]
pub enum StoredEmbedding {
    /// NULL or an empty array
    Absent,
    Vector(Vec<f32>),
    /// Unparseable JSON or non-finite values
    Malformed,
}

impl StoredEmbedding {
    fn parse(raw: Option<String>) -> Self {
        let Some(raw) = raw else {
            return Self::Absent;
        };
        match serde_json::from_str::<Vec<f32>>(&raw) {
            Ok(v) if v.is_empty() => Self::Absent,
            Ok(v) if v.iter().all(|x| x.is_finite()) => Self::Vector(v),
            _ => Self::Malformed,
        }
    }

    fn into_option(self) -> Option<Vec<f32>> {
        match self {
            Self::Vector(v) => Some(v),
            _ => None,
        }
    }
}

/// A chunk joined with its document, as scanned by retrieval
#[derive(Debug, Clone)]
pub struct CandidateChunk {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub title: String,
    pub chunk_index: u32,
    pub content: String,
    pub page_number: u32,
    pub embedding: StoredEmbedding,
}

/// SQLite-backed document store
#[derive(Clone)]
pub struct DocumentDb {
    conn: Arc<Mutex<Connection>>,
}

impl DocumentDb {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::database(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Create an in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::database(format!("Failed to open in-memory database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        // journal_mode reports the resulting mode ("memory" for in-memory databases)
        let journal_mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(|e| Error::database(format!("Failed to set journal mode: {}", e)))?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .and_then(|_| conn.pragma_update(None, "foreign_keys", "ON"))
            .map_err(|e| Error::database(format!("Failed to set pragmas: {}", e)))?;
        tracing::debug!("SQLite journal mode: {}", journal_mode);

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL UNIQUE,
                original_filename TEXT NOT NULL,
                file_path TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                mime_type TEXT,
                category TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                uploaded_by TEXT NOT NULL,
                upload_date TEXT NOT NULL,
                last_updated TEXT NOT NULL,
                is_indexed INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1
            );

            CREATE INDEX IF NOT EXISTS idx_documents_category ON documents(category);

            CREATE TABLE IF NOT EXISTS document_chunks (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                page_number INTEGER NOT NULL DEFAULT 1,
                start_char INTEGER NOT NULL,
                end_char INTEGER NOT NULL,
                embedding TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE,
                UNIQUE(document_id, chunk_index)
            );

            CREATE INDEX IF NOT EXISTS idx_document_chunks_document_id ON document_chunks(document_id);
            "#,
        )
        .map_err(|e| Error::database(format!("Failed to run migrations: {}", e)))?;

        tracing::debug!("Database migrations complete");
        Ok(())
    }

    /// Run store operations on the blocking thread pool
    pub async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&DocumentDb) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db)).await?
    }

    // ==================== Document Operations ====================

    /// Insert a new document record
    pub fn insert_document(&self, doc: &Document) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            &format!(
                "INSERT INTO documents ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                DOCUMENT_COLUMNS
            ),
            params![
                doc.id.to_string(),
                doc.filename,
                doc.original_filename,
                doc.file_path,
                doc.file_size as i64,
                doc.mime_type,
                doc.category,
                doc.title,
                doc.description,
                doc.uploaded_by,
                doc.upload_date.to_rfc3339(),
                doc.last_updated.to_rfc3339(),
                doc.is_indexed,
                doc.is_active,
            ],
        )
        .map_err(|e| Error::database(format!("Failed to insert document: {}", e)))?;

        Ok(())
    }

    /// Get a document by ID
    pub fn get_document(&self, id: Uuid) -> Result<Option<Document>> {
        let conn = self.conn.lock();

        let doc = conn
            .query_row(
                &format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS),
                params![id.to_string()],
                row_to_document,
            )
            .optional()
            .map_err(|e| Error::database(format!("Failed to get document: {}", e)))?;

        Ok(doc)
    }

    /// List documents, newest first
    pub fn list_documents(&self, include_inactive: bool) -> Result<Vec<Document>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM documents WHERE (?1 OR is_active = 1) \
             ORDER BY upload_date DESC, rowid DESC",
            DOCUMENT_COLUMNS
        ))?;

        let docs = stmt
            .query_map(params![include_inactive], row_to_document)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::database(format!("Failed to list documents: {}", e)))?;

        Ok(docs)
    }

    pub fn count_documents(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Hard delete a document; its chunks cascade. Returns false if it did not exist.
    pub fn delete_document(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock();
        let deleted = conn
            .execute("DELETE FROM documents WHERE id = ?1", params![id.to_string()])
            .map_err(|e| Error::database(format!("Failed to delete document: {}", e)))?;
        Ok(deleted > 0)
    }

    /// Set the active flag. Returns false if the document does not exist.
    pub fn set_active(&self, id: Uuid, active: bool) -> Result<bool> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE documents SET is_active = ?1, last_updated = ?2 WHERE id = ?3",
            params![active, Utc::now().to_rfc3339(), id.to_string()],
        )?;
        Ok(updated > 0)
    }

    /// Mark a document indexed. No-op returning false if it was deleted meanwhile.
    pub fn mark_indexed(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE documents SET is_indexed = 1, last_updated = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), id.to_string()],
        )?;
        Ok(updated > 0)
    }

    // ==================== Chunk Operations ====================

    /// Delete all chunks of a document; zero rows is not an error
    pub fn delete_chunks_for_document(&self, document_id: Uuid) -> Result<usize> {
        let conn = self.conn.lock();
        let deleted = conn
            .execute(
                "DELETE FROM document_chunks WHERE document_id = ?1",
                params![document_id.to_string()],
            )
            .map_err(|e| Error::database(format!("Failed to delete chunks: {}", e)))?;
        Ok(deleted)
    }

    /// Atomically replace a document's chunk set
    ///
    /// Returns false without writing anything if the document no longer exists.
    pub fn replace_chunks(&self, document_id: Uuid, chunks: &[Chunk]) -> Result<bool> {
        let mut conn = self.conn.lock();
        let doc_id = document_id.to_string();

        let tx = conn
            .transaction()
            .map_err(|e| Error::database(format!("Failed to begin transaction: {}", e)))?;

        let exists = tx
            .query_row("SELECT 1 FROM documents WHERE id = ?1", params![doc_id], |_| Ok(()))
            .optional()?
            .is_some();
        if !exists {
            return Ok(false);
        }

        tx.execute("DELETE FROM document_chunks WHERE document_id = ?1", params![doc_id])?;

        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO document_chunks ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                CHUNK_COLUMNS
            ))?;

            for chunk in chunks {
                if chunk.document_id != document_id {
                    return Err(Error::ChunkConsistency(format!(
                        "chunk {} belongs to {}, not {}",
                        chunk.id, chunk.document_id, document_id
                    )));
                }

                let embedding = match &chunk.embedding {
                    Some(v) if !v.is_empty() => Some(serde_json::to_string(v)?),
                    _ => None,
                };

                stmt.execute(params![
                    chunk.id.to_string(),
                    doc_id,
                    chunk.chunk_index as i64,
                    chunk.content,
                    chunk.page_number as i64,
                    chunk.start_char as i64,
                    chunk.end_char as i64,
                    embedding,
                    chunk.created_at.to_rfc3339(),
                ])
                .map_err(|e| Error::database(format!("Failed to insert chunk: {}", e)))?;
            }
        }

        tx.commit()
            .map_err(|e| Error::database(format!("Failed to commit transaction: {}", e)))?;

        Ok(true)
    }

    /// Chunks of a document in chunk_index order
    pub fn list_chunks(&self, document_id: Uuid) -> Result<Vec<Chunk>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM document_chunks WHERE document_id = ?1 ORDER BY chunk_index",
            CHUNK_COLUMNS
        ))?;

        let chunks = stmt
            .query_map(params![document_id.to_string()], row_to_chunk)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::database(format!("Failed to list chunks: {}", e)))?;

        Ok(chunks)
    }

    pub fn count_chunks(&self, document_id: Uuid) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM document_chunks WHERE document_id = ?1",
            params![document_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Filtered chunks with their document titles, in insertion order
    pub fn candidate_chunks(&self, filters: &SearchFilters) -> Result<Vec<CandidateChunk>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            r#"
            SELECT c.id, c.document_id, d.title, c.chunk_index, c.content, c.page_number, c.embedding
            FROM document_chunks c
            JOIN documents d ON d.id = c.document_id
            WHERE (?1 = 0 OR d.is_active = 1)
              AND (?2 IS NULL OR d.category = ?2)
            ORDER BY c.rowid
            "#,
        )?;

        let candidates = stmt
            .query_map(params![filters.active_only, filters.category], |row| {
                Ok(CandidateChunk {
                    chunk_id: parse_uuid(row, 0)?,
                    document_id: parse_uuid(row, 1)?,
                    title: row.get(2)?,
                    chunk_index: row.get::<_, i64>(3)? as u32,
                    content: row.get(4)?,
                    page_number: row.get::<_, i64>(5)? as u32,
                    embedding: StoredEmbedding::parse(row.get(6)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::database(format!("Failed to load candidate chunks: {}", e)))?;

        Ok(candidates)
    }
}

fn parse_uuid(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_timestamp(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<Document> {
    Ok(Document {
        id: parse_uuid(row, 0)?,
        filename: row.get(1)?,
        original_filename: row.get(2)?,
        file_path: row.get(3)?,
        file_size: row.get::<_, i64>(4)? as u64,
        mime_type: row.get(5)?,
        category: row.get(6)?,
        title: row.get(7)?,
        description: row.get(8)?,
        uploaded_by: row.get(9)?,
        upload_date: parse_timestamp(row, 10)?,
        last_updated: parse_timestamp(row, 11)?,
        is_indexed: row.get(12)?,
        is_active: row.get(13)?,
    })
}

fn row_to_chunk(row: &rusqlite::Row) -> rusqlite::Result<Chunk> {
    Ok(Chunk {
        id: parse_uuid(row, 0)?,
        document_id: parse_uuid(row, 1)?,
        chunk_index: row.get::<_, i64>(2)? as u32,
        content: row.get(3)?,
        page_number: row.get::<_, i64>(4)? as u32,
        start_char: row.get::<_, i64>(5)? as usize,
        end_char: row.get::<_, i64>(6)? as usize,
        embedding: StoredEmbedding::parse(row.get(7)?).into_option(),
        created_at: parse_timestamp(row, 8)?,
    })
}
