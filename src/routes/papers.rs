use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::errors::AppError;
use crate::ledger::{Identity, PaperId, PaperRecord};
use crate::ledger::models::NewPaper;
use crate::services::AppState;

#[derive(Deserialize)]
pub struct SubmitRequest {
    pub acting_identity: Identity,
    #[serde(flatten)]
    pub paper: NewPaper,
}

#[derive(Serialize)]
pub struct SubmitResponse {
    pub id: PaperId,
    pub status: String,
}

#[instrument(skip(state, payload))]
pub async fn submit_paper(
    State(state): State<AppState>,
    Json(payload): Json<SubmitRequest>,
) -> Result<impl IntoResponse, AppError> {
    let id = state.ledger.submit(payload.paper, payload.acting_identity)?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            id,
            status: "submitted".to_string(),
        }),
    ))
}

#[instrument(skip(state))]
pub async fn get_paper(
    State(state): State<AppState>,
    Path(id): Path<PaperId>,
) -> Result<Json<PaperRecord>, AppError> {
    Ok(Json(state.ledger.get(id)?))
}

#[derive(Deserialize)]
pub struct UpdateRequest {
    pub acting_identity: Identity,
    pub new_content_hash: String,
    pub new_version: String,
}

#[instrument(skip(state, payload))]
pub async fn update_paper(
    State(state): State<AppState>,
    Path(id): Path<PaperId>,
    Json(payload): Json<UpdateRequest>,
) -> Result<StatusCode, AppError> {
    state.ledger.update(
        id,
        payload.new_content_hash,
        payload.new_version,
        &payload.acting_identity,
    )?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct ActorRequest {
    pub acting_identity: Identity,
}

#[instrument(skip(state, payload))]
pub async fn deactivate_paper(
    State(state): State<AppState>,
    Path(id): Path<PaperId>,
    Json(payload): Json<ActorRequest>,
) -> Result<StatusCode, AppError> {
    state.ledger.deactivate(id, &payload.acting_identity)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct StoreEmbeddingsRequest {
    pub acting_identity: Identity,
    pub embedding_ref: String,
}

#[instrument(skip(state, payload))]
pub async fn store_embeddings(
    State(state): State<AppState>,
    Path(id): Path<PaperId>,
    Json(payload): Json<StoreEmbeddingsRequest>,
) -> Result<StatusCode, AppError> {
    state
        .ledger
        .store_embedding(id, payload.embedding_ref, &payload.acting_identity)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct GenerateEmbeddingsResponse {
    pub embedding_ref: String,
}

#[instrument(skip(state, payload))]
pub async fn generate_embeddings(
    State(state): State<AppState>,
    Path(id): Path<PaperId>,
    Json(payload): Json<ActorRequest>,
) -> Result<Json<GenerateEmbeddingsResponse>, AppError> {
    let embedding_ref = state
        .embedding_service
        .generate_and_store(id, &payload.acting_identity)
        .await?;
    Ok(Json(GenerateEmbeddingsResponse { embedding_ref }))
}

#[derive(Serialize)]
pub struct PaperIdsResponse {
    pub paper_ids: Vec<PaperId>,
}

#[instrument(skip(state))]
pub async fn papers_by_author(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Json<PaperIdsResponse> {
    Json(PaperIdsResponse {
        paper_ids: state.ledger.get_by_author(&Identity::new(identity)),
    })
}

#[derive(Debug, Deserialize)]
pub struct DoiParams {
    doi: String,
}

#[derive(Serialize)]
pub struct DoiResponse {
    pub id: PaperId,
}

#[instrument(skip(state))]
pub async fn paper_by_doi(
    State(state): State<AppState>,
    Query(params): Query<DoiParams>,
) -> Result<Json<DoiResponse>, AppError> {
    Ok(Json(DoiResponse {
        id: state.ledger.get_by_doi(&params.doi)?,
    }))
}

#[instrument(skip(state))]
pub async fn papers_with_embeddings(State(state): State<AppState>) -> Json<PaperIdsResponse> {
    Json(PaperIdsResponse {
        paper_ids: state.ledger.list_with_embeddings(),
    })
}

#[derive(Debug, Deserialize)]
pub struct HashParams {
    content_hash: String,
}

#[derive(Serialize)]
pub struct HashUsedResponse {
    pub used: bool,
}

/// Pre-submission check: a used hash stays reserved even after updates and
/// deactivation, so `used` never flips back to false.
#[instrument(skip(state))]
pub async fn content_hash_used(
    State(state): State<AppState>,
    Query(params): Query<HashParams>,
) -> Json<HashUsedResponse> {
    Json(HashUsedResponse {
        used: state.ledger.is_content_hash_used(&params.content_hash),
    })
}
