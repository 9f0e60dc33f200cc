use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use tracing::instrument;

use crate::errors::AppError;
use crate::reviewer::RequestToken;
use crate::services::AppState;

#[derive(Debug, Deserialize)]
pub struct FulfillmentRequest {
    pub request_token: RequestToken,
    pub random_value: u64,
}

/// Callback endpoint for an external randomness oracle. Deliveries may
/// arrive more than once per token; duplicates are absorbed by the protocol.
#[instrument(skip(state))]
pub async fn fulfill_randomness(
    State(state): State<AppState>,
    Json(payload): Json<FulfillmentRequest>,
) -> Result<StatusCode, AppError> {
    state
        .protocol
        .on_randomness_fulfilled(payload.request_token, payload.random_value)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
