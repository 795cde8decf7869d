//! Ingestion orchestration: upload → extract → chunk → embed → persist

use bytes::Bytes;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{ChunkingConfig, IngestionConfig};
use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, FileStore};
use crate::storage::DocumentDb;
use crate::types::document::{extension_of, sanitize_filename};
use crate::types::{Chunk, Document, FileType, NewDocument, UploadMetadata};

use super::chunker::TextChunker;
use super::parser::FileParser;

/// A file received from a client
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Filename as supplied by the client
    pub filename: String,
    /// Declared content type, if any
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Summary of a completed processing run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessReport {
    pub chunks: usize,
    /// Chunks that received an embedding
    pub embedded: usize,
}

/// Marks a document as having a processing run in flight; released on drop
struct RunGuard<'a> {
    runs: &'a DashMap<Uuid, ()>,
    document_id: Uuid,
}

impl<'a> RunGuard<'a> {
    fn acquire(runs: &'a DashMap<Uuid, ()>, document_id: Uuid) -> Option<Self> {
        match runs.entry(document_id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(Self { runs, document_id })
            }
        }
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.runs.remove(&self.document_id);
    }
}

/// Coordinates document registration and (re)processing
pub struct IngestPipeline {
    db: DocumentDb,
    files: Arc<dyn FileStore>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    chunker: TextChunker,
    ingestion: IngestionConfig,
    /// Documents with a processing run in flight
    runs: DashMap<Uuid, ()>,
}

impl IngestPipeline {
    pub fn new(
        db: DocumentDb,
        files: Arc<dyn FileStore>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        chunking: &ChunkingConfig,
        ingestion: IngestionConfig,
    ) -> Self {
        Self {
            db,
            files,
            embedder,
            chunker: TextChunker::new(chunking.chunk_size, chunking.chunk_overlap),
            ingestion,
            runs: DashMap::new(),
        }
    }

    pub fn db(&self) -> &DocumentDb {
        &self.db
    }

    /// Whether a processing run for `document_id` is in flight
    pub fn is_processing(&self, document_id: Uuid) -> bool {
        self.runs.contains_key(&document_id)
    }

    /// Resolve the format of an upload against the allow-list
    fn validate_extension(&self, filename: &str) -> Result<FileType> {
        let ext = extension_of(filename)
            .ok_or_else(|| Error::UnsupportedFormat("(no extension)".to_string()))?;

        if !self.ingestion.allowed_extensions.iter().any(|a| a.eq_ignore_ascii_case(&ext)) {
            return Err(Error::UnsupportedFormat(ext));
        }

        FileType::from_extension(&ext).ok_or(Error::UnsupportedFormat(ext))
    }

    /// Validate, store and record an upload without processing it
    pub async fn register(&self, file: UploadedFile, metadata: UploadMetadata) -> Result<Document> {
        let file_type = self.validate_extension(&file.filename)?;

        let id = Uuid::new_v4();
        let storage_name = format!("{}.{}", id, file_type.extension());
        let original_filename = match sanitize_filename(&file.filename) {
            name if name.is_empty() => storage_name.clone(),
            name => name,
        };

        let non_blank = |value: Option<String>| value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let new = NewDocument {
            title: non_blank(metadata.title).unwrap_or_else(|| original_filename.clone()),
            category: non_blank(metadata.category)
                .unwrap_or_else(|| self.ingestion.default_category.clone()),
            description: non_blank(metadata.description).unwrap_or_default(),
            uploaded_by: non_blank(metadata.uploaded_by)
                .unwrap_or_else(|| self.ingestion.default_uploaded_by.clone()),
            mime_type: non_blank(file.content_type).unwrap_or_else(|| file_type.default_mime_type()),
            original_filename,
            file_type,
        };

        let location = self.files.store(&storage_name, &file.data).await?;
        let doc = Document::new(id, new, location, file.data.len() as u64);

        let record = doc.clone();
        if let Err(e) = self.db.blocking(move |db| db.insert_document(&record)).await {
            if let Err(cleanup) = self.files.delete(&doc.file_path).await {
                tracing::warn!("Failed to remove orphaned file {}: {}", doc.file_path, cleanup);
            }
            return Err(e);
        }

        tracing::info!(
            "Registered document {} ({}, {} bytes, category {})",
            doc.id,
            doc.original_filename,
            doc.file_size,
            doc.category
        );
        Ok(doc)
    }

    /// Register an upload and process it immediately
    ///
    /// Processing failure does not fail the upload; the returned document
    /// then has `is_indexed == false`.
    pub async fn upload(&self, file: UploadedFile, metadata: UploadMetadata) -> Result<Document> {
        let doc = self.register(file, metadata).await?;
        self.process(doc.id).await;

        let id = doc.id;
        let latest = self.db.blocking(move |db| db.get_document(id)).await?;
        Ok(latest.unwrap_or(doc))
    }

    /// Run the processing pipeline for one document
    ///
    /// Failures are logged and reported as `false`; the document's indexed
    /// flag keeps its prior value.
    pub async fn process(&self, document_id: Uuid) -> bool {
        match self.try_process(document_id).await {
            Ok(report) => {
                tracing::info!(
                    "Processed document {}: {} chunks, {} embedded",
                    document_id,
                    report.chunks,
                    report.embedded
                );
                true
            }
            Err(e) => {
                tracing::error!("Processing document {} failed: {}", document_id, e);
                false
            }
        }
    }

    /// Run the processing pipeline, returning the failure cause
    pub async fn try_process(&self, document_id: Uuid) -> Result<ProcessReport> {
        let _guard = RunGuard::acquire(&self.runs, document_id).ok_or_else(|| {
            Error::ChunkConsistency(format!(
                "a processing run is already active for document {}",
                document_id
            ))
        })?;

        let doc = self
            .db
            .blocking(move |db| db.get_document(document_id))
            .await?
            .ok_or_else(|| Error::DocumentNotFound(document_id.to_string()))?;

        let removed = self
            .db
            .blocking(move |db| db.delete_chunks_for_document(document_id))
            .await?;
        tracing::debug!("Cleared {} previous chunks of {}", removed, document_id);

        let file_type = doc
            .file_type()
            .ok_or_else(|| Error::UnsupportedFormat(doc.filename.clone()))?;
        let data = self.files.read(&doc.file_path).await?;

        let source_name = doc.original_filename.clone();
        let extracted =
            tokio::task::spawn_blocking(move || FileParser::extract(file_type, &source_name, &data))
                .await??;

        let drafts = self.chunker.chunk(&extracted);
        tracing::debug!("Document {} split into {} chunks", document_id, drafts.len());

        let mut embeddings = match &self.embedder {
            Some(embedder) => {
                let texts: Vec<String> = drafts.iter().map(|d| d.content.clone()).collect();
                embedder.embed_batch(&texts).await
            }
            None => Vec::new(),
        }
        .into_iter();

        let now = Utc::now();
        let chunks: Vec<Chunk> = drafts
            .into_iter()
            .map(|draft| Chunk {
                id: Uuid::new_v4(),
                document_id,
                chunk_index: draft.index,
                content: draft.content,
                page_number: draft.page_number,
                start_char: draft.start_char,
                end_char: draft.end_char,
                embedding: embeddings.next().filter(|v| !v.is_empty()),
                created_at: now,
            })
            .collect();

        let report = ProcessReport {
            chunks: chunks.len(),
            embedded: chunks.iter().filter(|c| c.has_embedding()).count(),
        };
        if self.embedder.is_some() && report.embedded < report.chunks {
            tracing::warn!(
                "Document {}: {} of {} chunks stored without embeddings",
                document_id,
                report.chunks - report.embedded,
                report.chunks
            );
        }

        // both writes re-check existence so a concurrent delete is never undone
        let persisted = self
            .db
            .blocking(move |db| db.replace_chunks(document_id, &chunks))
            .await?;
        let indexed = persisted && self.db.blocking(move |db| db.mark_indexed(document_id)).await?;
        if !indexed {
            tracing::info!("Document {} was deleted during processing, discarding run", document_id);
            return Err(Error::DocumentNotFound(document_id.to_string()));
        }

        Ok(report)
    }

    /// Reprocess an existing document
    pub async fn reprocess(&self, document_id: Uuid) -> Result<bool> {
        self.require_document(document_id).await?;
        Ok(self.process(document_id).await)
    }

    /// Hard delete: remove the record (chunks cascade) and the stored file
    pub async fn delete(&self, document_id: Uuid) -> Result<()> {
        let doc = self.require_document(document_id).await?;

        let deleted = self
            .db
            .blocking(move |db| db.delete_document(document_id))
            .await?;
        if !deleted {
            return Err(Error::DocumentNotFound(document_id.to_string()));
        }

        if let Err(e) = self.files.delete(&doc.file_path).await {
            tracing::warn!("Failed to remove stored file {}: {}", doc.file_path, e);
        }

        tracing::info!("Deleted document {} ({})", document_id, doc.original_filename);
        Ok(())
    }

    /// Soft delete: exclude the document from search
    pub async fn deactivate(&self, document_id: Uuid) -> Result<()> {
        let updated = self
            .db
            .blocking(move |db| db.set_active(document_id, false))
            .await?;
        if !updated {
            return Err(Error::DocumentNotFound(document_id.to_string()));
        }

        tracing::info!("Deactivated document {}", document_id);
        Ok(())
    }

    async fn require_document(&self, document_id: Uuid) -> Result<Document> {
        self.db
            .blocking(move |db| db.get_document(document_id))
            .await?
            .ok_or_else(|| Error::DocumentNotFound(document_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::embedding::test_support::BagOfWordsEmbedder;
    use crate::providers::LocalFileStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Notify;

    /// Holds the first embed call until released
    struct GatedEmbedder {
        inner: BagOfWordsEmbedder,
        started: Arc<Notify>,
        release: Arc<Notify>,
        gated: AtomicBool,
    }

    #[async_trait]
    impl EmbeddingProvider for GatedEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if self.gated.swap(false, Ordering::SeqCst) {
                self.started.notify_one();
                self.release.notified().await;
            }
            self.inner.embed(text).await
        }

        fn dimensions(&self) -> usize {
            self.inner.dimensions
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "gated"
        }
    }

    struct Fixture {
        pipeline: Arc<IngestPipeline>,
        _dir: tempfile::TempDir,
    }

    fn fixture(embedder: Option<Arc<dyn EmbeddingProvider>>, ingestion: IngestionConfig) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let files = Arc::new(LocalFileStore::new(dir.path().join("uploads")).unwrap());
        let chunking = ChunkingConfig {
            chunk_size: 40,
            chunk_overlap: 20,
        };
        let pipeline = IngestPipeline::new(
            DocumentDb::in_memory().unwrap(),
            files,
            embedder,
            &chunking,
            ingestion,
        );
        Fixture {
            pipeline: Arc::new(pipeline),
            _dir: dir,
        }
    }

    fn txt(name: &str, body: &str) -> UploadedFile {
        UploadedFile {
            filename: name.to_string(),
            content_type: None,
            data: Bytes::from(body.to_string()),
        }
    }

    const GUIDE: &str = "The pool opens at nine. Towels are at the front desk. \
        Checkout is at noon and late checkout costs extra. Breakfast is served daily.";

    fn chunk_spans(db: &DocumentDb, id: Uuid) -> Vec<(u32, usize, usize, String)> {
        db.list_chunks(id)
            .unwrap()
            .into_iter()
            .map(|c| (c.chunk_index, c.start_char, c.end_char, c.content))
            .collect()
    }

    #[tokio::test]
    async fn test_upload_indexes_with_embeddings() {
        let fx = fixture(Some(Arc::new(BagOfWordsEmbedder::new())), IngestionConfig::default());
        let doc = fx.pipeline.upload(txt("guide.txt", GUIDE), UploadMetadata::default()).await.unwrap();

        assert!(doc.is_indexed);
        assert_eq!(doc.category, "policy");
        assert_eq!(doc.uploaded_by, "admin");
        assert_eq!(doc.title, "guide.txt");
        assert_eq!(doc.mime_type.as_deref(), Some("text/plain"));
        assert_eq!(doc.filename, format!("{}.txt", doc.id));

        let chunks = fx.pipeline.db().list_chunks(doc.id).unwrap();
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.has_embedding()));
        let indices: Vec<u32> = chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indices, (0..chunks.len() as u32).collect::<Vec<_>>());
        let len = GUIDE.chars().count();
        assert!(chunks.iter().all(|c| c.start_char <= c.end_char && c.end_char <= len));
    }

    #[tokio::test]
    async fn test_upload_without_embedder_is_indexed() {
        let fx = fixture(None, IngestionConfig::default());
        let doc = fx.pipeline.upload(txt("guide.txt", GUIDE), UploadMetadata::default()).await.unwrap();

        assert!(doc.is_indexed);
        let chunks = fx.pipeline.db().list_chunks(doc.id).unwrap();
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.embedding.is_none()));
    }

    #[tokio::test]
    async fn test_reprocess_is_deterministic() {
        let fx = fixture(Some(Arc::new(BagOfWordsEmbedder::new())), IngestionConfig::default());
        let doc = fx.pipeline.upload(txt("guide.txt", GUIDE), UploadMetadata::default()).await.unwrap();
        let first = chunk_spans(fx.pipeline.db(), doc.id);

        assert!(fx.pipeline.reprocess(doc.id).await.unwrap());
        assert!(fx.pipeline.reprocess(doc.id).await.unwrap());
        assert_eq!(chunk_spans(fx.pipeline.db(), doc.id), first);
    }

    #[tokio::test]
    async fn test_unsupported_extension_rejected_before_write() {
        let fx = fixture(None, IngestionConfig::default());

        for name in ["malware.exe", "README", "notes."] {
            let err = fx.pipeline.register(txt(name, "x"), UploadMetadata::default()).await.unwrap_err();
            assert!(matches!(err, Error::UnsupportedFormat(_)), "{}", name);
        }
        assert_eq!(fx.pipeline.db().count_documents().unwrap(), 0);
        let stored = std::fs::read_dir(fx._dir.path().join("uploads")).unwrap().count();
        assert_eq!(stored, 0);
    }

    #[tokio::test]
    async fn test_allow_list_is_configurable() {
        let ingestion = IngestionConfig {
            allowed_extensions: vec!["txt".to_string()],
            ..Default::default()
        };
        let fx = fixture(None, ingestion);

        let err = fx.pipeline.register(txt("a.pdf", "x"), UploadMetadata::default()).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(ext) if ext == "pdf"));
        assert!(fx.pipeline.register(txt("A.TXT", "x"), UploadMetadata::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_metadata_and_sanitized_filename() {
        let fx = fixture(None, IngestionConfig::default());
        let metadata = UploadMetadata {
            category: Some("menu".to_string()),
            title: Some("  ".to_string()),
            description: Some("Dinner".to_string()),
            uploaded_by: Some("chef".to_string()),
        };
        let doc = fx
            .pipeline
            .register(txt("../../Room Service.txt", "soup"), metadata)
            .await
            .unwrap();

        assert_eq!(doc.original_filename, "Room_Service.txt");
        assert_eq!(doc.title, "Room_Service.txt");
        assert_eq!(doc.category, "menu");
        assert_eq!(doc.description, "Dinner");
        assert_eq!(doc.uploaded_by, "chef");
        assert!(!doc.is_indexed);
    }

    #[tokio::test]
    async fn test_zero_byte_upload_exists_unindexed() {
        let fx = fixture(None, IngestionConfig::default());
        let doc = fx.pipeline.upload(txt("empty.txt", ""), UploadMetadata::default()).await.unwrap();

        assert!(!doc.is_indexed);
        assert_eq!(doc.file_size, 0);
        assert_eq!(fx.pipeline.db().count_chunks(doc.id).unwrap(), 0);

        let err = fx.pipeline.try_process(doc.id).await.unwrap_err();
        assert!(matches!(err, Error::Extraction { .. }));
        assert!(fx.pipeline.db().get_document(doc.id).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_reprocess_keeps_indexed_flag() {
        let fx = fixture(None, IngestionConfig::default());
        let doc = fx.pipeline.upload(txt("guide.txt", GUIDE), UploadMetadata::default()).await.unwrap();
        assert!(doc.is_indexed);

        std::fs::remove_file(&doc.file_path).unwrap();
        assert!(!fx.pipeline.reprocess(doc.id).await.unwrap());
        assert!(fx.pipeline.db().get_document(doc.id).unwrap().unwrap().is_indexed);
        assert!(!fx.pipeline.is_processing(doc.id));
    }

    #[tokio::test]
    async fn test_partial_embedding_failure_still_indexes() {
        let fx = fixture(Some(Arc::new(BagOfWordsEmbedder::new())), IngestionConfig::default());
        let body = "alpha beta gamma delta epsilon zeta eta theta EMBED_FAIL iota kappa lambda";
        let doc = fx.pipeline.upload(txt("greek.txt", body), UploadMetadata::default()).await.unwrap();

        assert!(doc.is_indexed);
        let chunks = fx.pipeline.db().list_chunks(doc.id).unwrap();
        let failed: Vec<bool> = chunks.iter().map(|c| c.content.contains("EMBED_FAIL")).collect();
        for (chunk, poisoned) in chunks.iter().zip(failed) {
            assert_eq!(chunk.embedding.is_none(), poisoned);
        }
    }

    #[tokio::test]
    async fn test_missing_document_process_fails() {
        let fx = fixture(None, IngestionConfig::default());
        assert!(!fx.pipeline.process(Uuid::new_v4()).await);
        assert!(matches!(
            fx.pipeline.reprocess(Uuid::new_v4()).await,
            Err(Error::DocumentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_run_rejected() {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let embedder = GatedEmbedder {
            inner: BagOfWordsEmbedder::new(),
            started: started.clone(),
            release: release.clone(),
            gated: AtomicBool::new(false),
        };
        let gate = Arc::new(embedder);
        let fx = fixture(Some(gate.clone() as Arc<dyn EmbeddingProvider>), IngestionConfig::default());

        let doc = fx.pipeline.register(txt("guide.txt", GUIDE), UploadMetadata::default()).await.unwrap();
        gate.gated.store(true, Ordering::SeqCst);

        let pipeline = fx.pipeline.clone();
        let first = tokio::spawn(async move { pipeline.process(doc.id).await });
        started.notified().await;

        assert!(fx.pipeline.is_processing(doc.id));
        let err = fx.pipeline.try_process(doc.id).await.unwrap_err();
        assert!(matches!(err, Error::ChunkConsistency(_)));

        release.notify_one();
        assert!(first.await.unwrap());
        assert!(!fx.pipeline.is_processing(doc.id));
        assert!(fx.pipeline.db().count_chunks(doc.id).unwrap() > 0);
    }

    #[tokio::test]
    async fn test_delete_during_run_leaves_no_chunks() {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let gate = Arc::new(GatedEmbedder {
            inner: BagOfWordsEmbedder::new(),
            started: started.clone(),
            release: release.clone(),
            gated: AtomicBool::new(false),
        });
        let fx = fixture(Some(gate.clone() as Arc<dyn EmbeddingProvider>), IngestionConfig::default());

        let doc = fx.pipeline.register(txt("guide.txt", GUIDE), UploadMetadata::default()).await.unwrap();
        gate.gated.store(true, Ordering::SeqCst);

        let pipeline = fx.pipeline.clone();
        let run = tokio::spawn(async move { pipeline.process(doc.id).await });
        started.notified().await;

        fx.pipeline.delete(doc.id).await.unwrap();
        release.notify_one();

        assert!(!run.await.unwrap());
        assert_eq!(fx.pipeline.db().count_chunks(doc.id).unwrap(), 0);
        assert!(fx.pipeline.db().get_document(doc.id).unwrap().is_none());
        assert!(!std::path::Path::new(&doc.file_path).exists());
    }

    #[tokio::test]
    async fn test_deactivate_and_delete() {
        let fx = fixture(None, IngestionConfig::default());
        let doc = fx.pipeline.upload(txt("guide.txt", GUIDE), UploadMetadata::default()).await.unwrap();

        fx.pipeline.deactivate(doc.id).await.unwrap();
        assert!(!fx.pipeline.db().get_document(doc.id).unwrap().unwrap().is_active);

        fx.pipeline.delete(doc.id).await.unwrap();
        assert!(matches!(
            fx.pipeline.delete(doc.id).await,
            Err(Error::DocumentNotFound(_))
        ));
        assert!(matches!(
            fx.pipeline.deactivate(doc.id).await,
            Err(Error::DocumentNotFound(_))
        ));
    }
}
