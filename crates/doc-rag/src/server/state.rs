//! Application state for the HTTP server

use parking_lot::RwLock;
use std::fs;
use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::ingestion::IngestPipeline;
use crate::providers::{detect_embedder, EmbeddingProvider, FileStore, LocalFileStore};
use crate::retrieval::RetrievalEngine;
use crate::storage::DocumentDb;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RagConfig,
    db: DocumentDb,
    pipeline: Arc<IngestPipeline>,
    engine: RetrievalEngine,
    /// Ready state
    ready: RwLock<bool>,
}

impl AppState {
    /// Open storage, probe the embedding service and wire the components
    pub async fn new(config: RagConfig) -> Result<Self> {
        fs::create_dir_all(&config.storage.data_dir).map_err(|e| {
            Error::Config(format!(
                "Failed to create data directory {}: {}",
                config.storage.data_dir.display(),
                e
            ))
        })?;

        let db = DocumentDb::new(config.storage.database_path())?;
        let files: Arc<dyn FileStore> =
            Arc::new(LocalFileStore::new(config.storage.uploads_path())?);
        let embedder = detect_embedder(&config.embeddings).await;

        tracing::info!(
            "Storage ready at {} ({} documents)",
            config.storage.data_dir.display(),
            db.count_documents()?
        );

        let state = Self::from_parts(config, db, files, embedder);
        state.set_ready(true);
        Ok(state)
    }

    /// Assemble state from already constructed components
    pub fn from_parts(
        config: RagConfig,
        db: DocumentDb,
        files: Arc<dyn FileStore>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Self {
        let pipeline = Arc::new(IngestPipeline::new(
            db.clone(),
            files,
            embedder.clone(),
            &config.chunking,
            config.ingestion.clone(),
        ));
        let engine = RetrievalEngine::new(db.clone(), embedder);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                pipeline,
                engine,
                ready: RwLock::new(false),
            }),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    pub fn db(&self) -> &DocumentDb {
        &self.inner.db
    }

    /// Ingestion pipeline, shared with background processing tasks
    pub fn pipeline(&self) -> &Arc<IngestPipeline> {
        &self.inner.pipeline
    }

    pub fn engine(&self) -> &RetrievalEngine {
        &self.inner.engine
    }

    /// Check if the server is ready
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    /// Set ready state
    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }
}
