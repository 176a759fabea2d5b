//! Health endpoint.

use crate::api::{error::ApiResult, routes::AppState};
use axum::{extract::State, Json};
use serde_json::json;
use store::DocumentStore;

/// Liveness plus a store probe.
///
/// GET /health
pub async fn health(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    state
        .engine
        .store()
        .health_check()
        .await
        .map_err(|e| crate::api::error::ApiError::Internal(e.to_string()))?;
    Ok(Json(json!({"status": "ok"})))
}
