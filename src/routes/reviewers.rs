use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::instrument;

use crate::errors::AppError;
use crate::ledger::{Identity, PaperId};
use crate::reviewer::{AssignmentState, RequestToken};
use crate::services::AppState;

use super::papers::ActorRequest;

#[derive(Serialize)]
pub struct TriggerResponse {
    pub request_token: RequestToken,
    pub status: String,
}

/// Arms the two-phase assignment: returns once the randomness request is
/// accepted, with the reviewer arriving later via the oracle callback.
#[instrument(skip(state, payload))]
pub async fn trigger_assignment(
    State(state): State<AppState>,
    Path(id): Path<PaperId>,
    Json(payload): Json<ActorRequest>,
) -> Result<impl IntoResponse, AppError> {
    let request_token = state
        .protocol
        .trigger_assignment(id, &payload.acting_identity)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerResponse {
            request_token,
            status: "requested".to_string(),
        }),
    ))
}

#[derive(Serialize)]
pub struct AssignmentStatusResponse {
    pub state: AssignmentState,
    pub assigned_reviewer: Option<Identity>,
}

#[instrument(skip(state))]
pub async fn assignment_status(
    State(state): State<AppState>,
    Path(id): Path<PaperId>,
) -> Result<Json<AssignmentStatusResponse>, AppError> {
    let record = state.ledger.get(id)?;
    Ok(Json(AssignmentStatusResponse {
        state: state.protocol.assignment_state(id).await,
        assigned_reviewer: record.assigned_reviewer,
    }))
}
