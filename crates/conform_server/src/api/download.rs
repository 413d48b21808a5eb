//! Artifact retrieval endpoint

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use conform_core::store::StoreError;

use super::ApiError;
use crate::AppState;

/// GET /dl/:name
///
/// Serves a published artifact inline, with the content type derived from
/// its suffix.
pub async fn download(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let store = state.service.store();
    let lookup = tokio::task::spawn_blocking(move || store.get(&name))
        .await
        .map_err(|e| ApiError::internal(format!("store task failed: {}", e)))?;

    let artifact = match lookup {
        Ok(artifact) => artifact,
        Err(StoreError::NotFound(_)) => return Err(ApiError::NotFound),
        Err(e) => return Err(ApiError::internal(e.to_string())),
    };

    let disposition = format!("inline; filename=\"{}\"", artifact.id);
    Ok((
        [
            (header::CONTENT_TYPE, artifact.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        artifact.bytes,
    )
        .into_response())
}
