// Subscribe HTTP route (SSE push channel)
//
// A reactive query, not a log tail: every time the store changes for the
// site, the current top-N window is re-evaluated and pushed. A subscriber
// may therefore see the same record more than once (reconnect, window
// shift) - consumers dedup by watermark. Within one delivered window,
// records are in ascending timestamp order.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use tokio::sync::broadcast;
use utoipa::IntoParams;

use crate::auth::bearer_token;
use crate::state::ApiState;

const DEFAULT_WINDOW: usize = 10;
const MAX_WINDOW: usize = 100;

pub fn routes(state: ApiState) -> Router {
    Router::new()
        .route("/v1/subscribe", get(subscribe))
        .with_state(state)
}

/// Query parameters for subscribing
#[derive(Debug, Deserialize, IntoParams)]
pub struct SubscribeQuery {
    pub site_id: String,
    /// Window size pushed on each store change. Defaults to 10.
    pub limit: Option<usize>,
    /// Credential fallback for EventSource clients that cannot set headers
    pub api_key: Option<String>,
}

/// GET /v1/subscribe - live event window (SSE)
///
/// The `id` of each SSE event carries the record timestamp (RFC 3339) for
/// client-side watermark tracking.
#[utoipa::path(
    get,
    path = "/v1/subscribe",
    params(SubscribeQuery),
    responses(
        (status = 200, description = "Live event window", content_type = "text/event-stream"),
        (status = 401, description = "Credential mismatch")
    ),
    tag = "subscribe"
)]
pub async fn subscribe(
    State(state): State<ApiState>,
    Query(query): Query<SubscribeQuery>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, StatusCode> {
    let api_key = bearer_token(&headers)
        .or(query.api_key.as_deref())
        .ok_or(StatusCode::UNAUTHORIZED)?;
    state
        .registry
        .authorize(&query.site_id, api_key)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let site_id = query.site_id;
    let limit = query.limit.unwrap_or(DEFAULT_WINDOW).min(MAX_WINDOW);
    tracing::info!(site_id = %site_id, limit, "Starting push subscription");

    let store = state.store.clone();
    let changes = state.store.subscribe_changes();

    // First step delivers the current window immediately; afterwards each
    // step waits for a store change for this site, then re-queries.
    let stream = stream::unfold(
        (changes, true),
        move |(mut changes, first)| {
            let store = store.clone();
            let site_id = site_id.clone();
            async move {
                if !first {
                    loop {
                        match changes.recv().await {
                            Ok(id) if id == site_id => break,
                            Ok(_) => continue,
                            // Lagging just means we missed notifications;
                            // the re-queried window is still current
                            Err(broadcast::error::RecvError::Lagged(_)) => break,
                            Err(broadcast::error::RecvError::Closed) => return None,
                        }
                    }
                }

                let mut window = store.query(&site_id, DateTime::<Utc>::MIN_UTC, limit);
                window.reverse();

                let sse_events: Vec<Result<SseEvent, Infallible>> = window
                    .into_iter()
                    .map(|record| {
                        let event_type = record.event_type.to_string();
                        let id = record.timestamp.to_rfc3339();
                        let json =
                            serde_json::to_string(&record).unwrap_or_else(|_| "{}".to_string());
                        Ok(SseEvent::default().event(event_type).data(json).id(id))
                    })
                    .collect();

                Some((stream::iter(sse_events), (changes, false)))
            }
        },
    )
    .flatten();

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
