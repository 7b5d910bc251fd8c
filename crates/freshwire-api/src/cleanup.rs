// Cleanup HTTP route (internal/cron)
//
// Sweeps event records older than the retention window. Idempotent and safe
// to call at any frequency; the periodic in-process sweeper makes this
// endpoint a belt-and-braces hook for external cron schedulers.

use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::bearer_token;
use crate::state::ApiState;

pub fn routes(state: ApiState) -> Router {
    Router::new()
        .route("/v1/cleanup", post(cleanup))
        .with_state(state)
}

/// Sweep result
#[derive(Debug, Serialize, ToSchema)]
pub struct CleanupResponse {
    pub success: bool,
    pub removed_count: usize,
}

/// POST /v1/cleanup - evict expired event records
#[utoipa::path(
    post,
    path = "/v1/cleanup",
    responses(
        (status = 200, description = "Sweep completed", body = CleanupResponse),
        (status = 401, description = "Bad cleanup secret")
    ),
    tag = "cleanup"
)]
pub async fn cleanup(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<CleanupResponse>, StatusCode> {
    let secret = bearer_token(&headers).ok_or(StatusCode::UNAUTHORIZED)?;
    if secret != state.cleanup_secret.as_ref() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let removed_count = freshwire_store::evict_expired(&state.store, state.config.retention());

    Ok(Json(CleanupResponse {
        success: true,
        removed_count,
    }))
}
