// Poll snapshot HTTP route
//
// The pull-based fallback for subscribers that cannot hold a push
// connection. Stateless per call: returns per-item content fingerprints and
// the caller diffs hashes against its previous snapshot. CORS allows
// browser-side subscribers; only GET and OPTIONS are exposed.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, Method, StatusCode},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use freshwire_core::PollSnapshotItem;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use utoipa::{IntoParams, ToSchema};

use crate::auth::bearer_token;
use crate::state::ApiState;

pub fn routes(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/v1/poll", get(poll))
        .layer(cors)
        .with_state(state)
}

/// Query parameters for polling
#[derive(Debug, Deserialize, IntoParams)]
pub struct PollQuery {
    pub site_id: String,
    /// Only items updated strictly after this instant are returned.
    /// Omit for the full snapshot.
    pub since: Option<DateTime<Utc>>,
}

/// Snapshot response: per-item fingerprints plus the server time
#[derive(Debug, Serialize, ToSchema)]
pub struct PollResponse {
    pub items: Vec<PollSnapshotItem>,
    pub timestamp: DateTime<Utc>,
}

/// GET /v1/poll - fingerprint snapshot of a site's items
#[utoipa::path(
    get,
    path = "/v1/poll",
    params(PollQuery),
    responses(
        (status = 200, description = "Snapshot (empty list if nothing changed)", body = PollResponse),
        (status = 401, description = "Bad credential"),
        (status = 500, description = "Internal server error")
    ),
    tag = "poll"
)]
pub async fn poll(
    State(state): State<ApiState>,
    Query(query): Query<PollQuery>,
    headers: HeaderMap,
) -> Result<Json<PollResponse>, StatusCode> {
    let api_key = bearer_token(&headers).ok_or(StatusCode::UNAUTHORIZED)?;
    state
        .registry
        .authorize(&query.site_id, api_key)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let mut items = state.snapshots.snapshot(&query.site_id).await.map_err(|e| {
        tracing::error!(site_id = %query.site_id, "Failed to snapshot content: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    if let Some(since) = query.since {
        items.retain(|item| item.updated_at > since);
    }

    tracing::debug!(
        site_id = %query.site_id,
        items = items.len(),
        "Served poll snapshot"
    );

    Ok(Json(PollResponse {
        items,
        timestamp: Utc::now(),
    }))
}
