//! Document management endpoints

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::ingestion::UploadedFile;
use crate::server::state::AppState;
use crate::types::{
    ActionResponse, ChunkSummary, DocumentDetailResponse, DocumentListResponse, DocumentSummary,
    UploadMetadata, UploadResponse,
};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub include_inactive: bool,
}

/// POST /api/documents - Upload a file; indexing continues in the background
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let mut file: Option<UploadedFile> = None;
    let mut metadata = UploadMetadata::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidRequest(format!("Failed to read multipart field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        if name == "file" {
            let filename = field.file_name().unwrap_or("").to_string();
            let content_type = field.content_type().map(|s| s.to_string());
            let data: Bytes = field
                .bytes()
                .await
                .map_err(|e| Error::InvalidRequest(format!("Failed to read file: {}", e)))?;
            file = Some(UploadedFile {
                filename,
                content_type,
                data,
            });
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| Error::InvalidRequest(format!("Failed to read field '{}': {}", name, e)))?;

        match name.as_str() {
            "category" => metadata.category = Some(value),
            "title" => metadata.title = Some(value),
            "description" => metadata.description = Some(value),
            "uploaded_by" => metadata.uploaded_by = Some(value),
            other => tracing::debug!("Ignoring multipart field '{}'", other),
        }
    }

    let file = file.ok_or_else(|| Error::InvalidRequest("No file provided".to_string()))?;
    if file.filename.is_empty() {
        return Err(Error::InvalidRequest("No file selected".to_string()));
    }

    tracing::info!("Upload: {} ({} bytes)", file.filename, file.data.len());

    let doc = state.pipeline().register(file, metadata).await?;

    let pipeline = state.pipeline().clone();
    let document_id = doc.id;
    tokio::spawn(async move {
        pipeline.process(document_id).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            document_id: doc.id,
            status: "accepted".to_string(),
            document: DocumentSummary::from(&doc),
        }),
    ))
}

/// GET /api/documents - List documents
pub async fn list_documents(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<DocumentListResponse>> {
    let include_inactive = params.include_inactive;
    let documents = state
        .db()
        .blocking(move |db| db.list_documents(include_inactive))
        .await?;

    let documents: Vec<DocumentSummary> = documents.iter().map(DocumentSummary::from).collect();
    let total_count = documents.len();

    Ok(Json(DocumentListResponse {
        documents,
        total_count,
    }))
}

/// GET /api/documents/:id - Get document details with its chunks
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentDetailResponse>> {
    let (doc, chunks) = state
        .db()
        .blocking(move |db| {
            let doc = db.get_document(id)?;
            let chunks = match doc {
                Some(_) => db.list_chunks(id)?,
                None => Vec::new(),
            };
            Ok((doc, chunks))
        })
        .await?;

    let doc = doc.ok_or_else(|| Error::DocumentNotFound(id.to_string()))?;

    Ok(Json(DocumentDetailResponse {
        document: DocumentSummary::from(&doc),
        chunks: chunks.iter().map(ChunkSummary::from).collect(),
    }))
}

/// DELETE /api/documents/:id - Remove a document, its chunks and stored file
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResponse>> {
    state.pipeline().delete(id).await?;
    Ok(Json(ActionResponse {
        success: true,
        document_id: id,
    }))
}

/// POST /api/documents/:id/deactivate - Exclude a document from search
pub async fn deactivate_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResponse>> {
    state.pipeline().deactivate(id).await?;
    Ok(Json(ActionResponse {
        success: true,
        document_id: id,
    }))
}

/// POST /api/documents/:id/reprocess - Rebuild chunks and embeddings
pub async fn reprocess_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>> {
    let success = state.pipeline().reprocess(id).await?;
    Ok(Json(serde_json::json!({ "success": success })))
}
