//! API routes

pub mod documents;
pub mod search;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};

use crate::error::Result;
use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Upload gets the larger body limit
        .route(
            "/documents",
            get(documents::list_documents)
                .post(documents::upload_document)
                .layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route(
            "/documents/:id",
            get(documents::get_document).delete(documents::delete_document),
        )
        .route("/documents/:id/deactivate", post(documents::deactivate_document))
        .route("/documents/:id/reprocess", post(documents::reprocess_document))
        .route("/search", get(search::search))
        .route("/info", get(info))
}

/// API info endpoint
async fn info(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let documents = state.db().blocking(|db| db.count_documents()).await?;
    let mode = if state.engine().has_embedder() {
        "semantic"
    } else {
        "lexical"
    };

    Ok(Json(serde_json::json!({
        "name": "doc-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Document ingestion and semantic retrieval with lexical fallback",
        "retrieval_mode": mode,
        "documents": documents,
        "endpoints": {
            "POST /api/documents": "Upload a document (multipart field 'file')",
            "GET /api/documents": "List documents (?include_inactive=true for all)",
            "GET /api/documents/:id": "Document details with chunks",
            "DELETE /api/documents/:id": "Delete a document",
            "POST /api/documents/:id/deactivate": "Exclude a document from search",
            "POST /api/documents/:id/reprocess": "Rebuild chunks and embeddings",
            "GET /api/search": "Search (?q=&category=&limit=)"
        }
    })))
}
