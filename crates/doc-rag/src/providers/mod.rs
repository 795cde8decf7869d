//! Provider abstractions for embeddings and raw file storage
//!
//! Trait-based seams so the pipeline and retrieval engine can be built with
//! the Ollama/filesystem backends or with test doubles.

pub mod embedding;
pub mod file_store;
pub mod local;
pub mod ollama;

use std::sync::Arc;

use crate::config::EmbeddingConfig;

pub use embedding::EmbeddingProvider;
pub use file_store::FileStore;
pub use local::LocalFileStore;
pub use ollama::OllamaEmbedder;

/// Probe for an embedding backend once at startup
///
/// Returns `None` when embeddings are disabled or the backend is unreachable;
/// retrieval then runs in lexical mode. This is the only place the absence is logged.
pub async fn detect_embedder(config: &EmbeddingConfig) -> Option<Arc<dyn EmbeddingProvider>> {
    if !config.enabled {
        tracing::warn!("Embeddings disabled by configuration, search will use lexical fallback");
        return None;
    }

    let embedder = match OllamaEmbedder::new(config) {
        Ok(embedder) => embedder,
        Err(e) => {
            tracing::warn!("Embedder unavailable ({}), search will use lexical fallback", e);
            return None;
        }
    };

    match embedder.health_check().await {
        Ok(true) => {
            tracing::info!(
                "Embedder available: {} model {} at {} ({} dimensions)",
                embedder.name(),
                embedder.model(),
                config.base_url,
                embedder.dimensions()
            );
            Some(Arc::new(embedder))
        }
        _ => {
            tracing::warn!(
                "Embedder unavailable at {}, search will use lexical fallback",
                config.base_url
            );
            None
        }
    }
}
