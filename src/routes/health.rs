use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::instrument;

use crate::services::AppState;

pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub total_papers: u64,
    pub papers_with_embeddings: usize,
    pub indexed_papers: usize,
}

#[instrument(skip(state))]
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        total_papers: state.ledger.total(),
        papers_with_embeddings: state.ledger.list_with_embeddings().len(),
        indexed_papers: state.index.len(),
    })
}
