//! Conform endpoint

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use conform_core::models::{ConformRequest, ConformResponse};

use super::ApiError;
use crate::AppState;

/// POST /process
///
/// Runs one conform job on the blocking pool and returns the download URL
/// and measured durations.
pub async fn process(
    State(state): State<AppState>,
    payload: Result<Json<ConformRequest>, JsonRejection>,
) -> Result<Json<ConformResponse>, ApiError> {
    let Json(request) = payload?;

    let service = state.service.clone();
    let result = tokio::task::spawn_blocking(move || service.conform(request))
        .await
        .map_err(|e| ApiError::internal(format!("conform task failed: {}", e)))??;

    Ok(Json(result.to_response(&state.download_prefix)))
}
