//! Document RAG server binary
//!
//! Run with: cargo run -p doc-rag --bin doc-rag-server

use doc_rag::{config::RagConfig, server::RagServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "doc_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RagConfig::load()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Data directory: {}", config.storage.data_dir.display());
    tracing::info!(
        "  - Chunk size: {} (overlap {})",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );
    if config.embeddings.enabled {
        tracing::info!(
            "  - Embedding model: {} at {}",
            config.embeddings.model,
            config.embeddings.base_url
        );
    } else {
        tracing::info!("  - Embeddings disabled, search is lexical only");
    }

    let server = RagServer::new(config).await?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/documents - Upload a document");
    println!("  GET  /api/documents - List documents");
    println!("  GET  /api/search    - Search documents");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
