// Broadcast HTTP route (internal)
//
// Called by the content store whenever a mutation commits. The caller
// already holds a valid site_id; unregistered tenants are rejected so the
// shared store cannot be poisoned. Failures here never roll back the
// content mutation - the caller treats the notification as lost and the
// poll fallback covers the gap.

use std::collections::HashMap;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use freshwire_core::{EventRecord, EventType, FreshwireError};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::state::ApiState;

pub fn routes(state: ApiState) -> Router {
    Router::new()
        .route("/v1/broadcast", post(broadcast))
        .with_state(state)
}

/// Mutation notification submitted by the content store
#[derive(Debug, Deserialize, ToSchema)]
pub struct BroadcastRequest {
    pub site_id: String,
    pub event_type: EventType,
    pub collection: String,
    pub item_id: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// POST /v1/broadcast - append a mutation record (internal)
#[utoipa::path(
    post,
    path = "/v1/broadcast",
    request_body = BroadcastRequest,
    responses(
        (status = 201, description = "Record appended", body = EventRecord),
        (status = 404, description = "Unknown site"),
        (status = 503, description = "Store unavailable")
    ),
    tag = "broadcast"
)]
pub async fn broadcast(
    State(state): State<ApiState>,
    Json(request): Json<BroadcastRequest>,
) -> Result<(StatusCode, Json<EventRecord>), StatusCode> {
    let record = state
        .broadcaster
        .append(freshwire_store::AppendRequest {
            site_id: request.site_id,
            event_type: request.event_type,
            collection: request.collection,
            item_id: request.item_id,
            slug: request.slug,
            metadata: request.metadata,
        })
        .map_err(|e| match e {
            FreshwireError::UnknownSite(site_id) => {
                tracing::warn!(site_id = %site_id, "Broadcast for unknown site rejected");
                StatusCode::NOT_FOUND
            }
            FreshwireError::StoreUnavailable(msg) => {
                tracing::error!("Event store unavailable: {}", msg);
                StatusCode::SERVICE_UNAVAILABLE
            }
            e => {
                tracing::error!("Failed to broadcast: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        })?;

    Ok((StatusCode::CREATED, Json(record)))
}
