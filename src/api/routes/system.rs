//! System handlers: health, lifecycle events, OpenAPI.

use crate::api::AppState;
use crate::error::ApiError;
use axum::{
    Json,
    extract::State,
    response::{
        IntoResponse,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use serde_json::json;
use std::convert::Infallible;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

/// GET /health - Health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Service is healthy")
    )
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "engine": state.downloader.engine_name(),
        "accepting": state.downloader.is_accepting(),
        "max_concurrent_downloads": state.config.queue.max_concurrent_downloads,
    }))
}

/// GET /openapi.json - OpenAPI specification
#[utoipa::path(
    get,
    path = "/openapi.json",
    tag = "system",
    responses(
        (status = 200, description = "OpenAPI specification in JSON format")
    )
)]
pub async fn openapi_spec() -> impl IntoResponse {
    use crate::api::openapi::ApiDoc;
    use utoipa::OpenApi;

    Json(ApiDoc::openapi())
}

/// GET /events - Server-sent lifecycle events
///
/// Each SSE event is named after the lifecycle event (`queued`, `started`,
/// `completed`, ...) and carries it as JSON.
#[utoipa::path(
    get,
    path = "/events",
    tag = "system",
    responses(
        (status = 200, description = "Server-sent events stream (text/event-stream)", content_type = "text/event-stream")
    )
)]
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let events = BroadcastStream::new(state.downloader.subscribe()).filter_map(|received| {
        let event = match received {
            Ok(event) => event,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event subscriber lagged");
                return Some(Ok::<_, Infallible>(lagged_event(skipped)));
            }
        };
        match serde_json::to_string(&event) {
            Ok(data) => Some(Ok(SseEvent::default().event(event.kind()).data(data))),
            Err(e) => {
                tracing::warn!(kind = event.kind(), error = %e, "failed to serialize event");
                None
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// SSE `error` event telling a slow subscriber how many messages it missed
pub(crate) fn lagged_event(skipped: u64) -> SseEvent {
    let body = ApiError::new("lagged", format!("subscriber lagged, skipped {skipped} messages"));
    SseEvent::default()
        .event("error")
        .json_data(body)
        .unwrap_or_else(|_| SseEvent::default().event("error").data("lagged"))
}
