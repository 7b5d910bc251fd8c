// Freshwire API server library
//
// Route modules follow one shape: a module-level `routes(state)` builder and
// handler functions with utoipa annotations. The binary wires state from the
// environment; tests build the router directly against in-memory stores.

pub mod auth;
pub mod broadcast;
pub mod cleanup;
pub mod poll;
pub mod state;
pub mod subscribe;

use axum::{routing::get, Json, Router};
use serde::Serialize;
use utoipa::OpenApi;

pub use state::ApiState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        broadcast::broadcast,
        poll::poll,
        subscribe::subscribe,
        cleanup::cleanup,
    ),
    components(
        schemas(
            freshwire_core::EventRecord,
            freshwire_core::EventType,
            freshwire_core::PollSnapshotItem,
            broadcast::BroadcastRequest,
            poll::PollResponse,
            cleanup::CleanupResponse,
        )
    ),
    tags(
        (name = "broadcast", description = "Internal mutation-notification write path"),
        (name = "poll", description = "Stateless fingerprint snapshots (pull fallback)"),
        (name = "subscribe", description = "Live event window over SSE (push channel)"),
        (name = "cleanup", description = "Retention sweep hook for external cron")
    ),
    info(
        title = "Freshwire API",
        version = "0.2.0",
        description = "Live content-update distribution: broadcast, push, poll and cleanup surfaces"
    )
)]
pub struct ApiDoc;

/// Build the full application router
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(broadcast::routes(state.clone()))
        .merge(poll::routes(state.clone()))
        .merge(subscribe::routes(state.clone()))
        .merge(cleanup::routes(state))
}
