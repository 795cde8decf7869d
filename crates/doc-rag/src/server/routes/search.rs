//! Search endpoint

use axum::{
    extract::{Query, State},
    Json,
};

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{SearchRequest, SearchResponse};

/// GET /api/search - Rank chunks against a query
pub async fn search(
    State(state): State<AppState>,
    Query(request): Query<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let search = &state.config().search;
    let limit = request.effective_limit(search.default_limit, search.max_limit);

    tracing::info!("Search: \"{}\" (limit {})", request.q, limit);

    let results = state
        .engine()
        .search(&request.q, &request.filters(), limit)
        .await?;

    Ok(Json(SearchResponse::new(request.q, results)))
}
