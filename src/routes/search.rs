use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::errors::AppError;
use crate::search::SearchHit;
use crate::services::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    q: String,
    limit: Option<usize>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    results: Vec<SearchHit>,
}

#[instrument(skip(state))]
pub async fn search_papers(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
    if params.q.trim().is_empty() {
        return Err(AppError::Validation("Query string cannot be empty".to_string()));
    }

    let limit = params.limit.unwrap_or(10).min(50); // Cap limit at 50

    let results = state.index.query(&params.q, limit).await?;

    Ok(Json(SearchResponse { results }))
}
