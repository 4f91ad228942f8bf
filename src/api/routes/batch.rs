//! Queue-wide handlers.

use super::{AddBatchResponse, ClearResponse, QueueResponse, StartBatchResponse};
use crate::api::AppState;
use crate::types::DownloadRequest;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// POST /api/batch/add - Enqueue a list of download requests
///
/// All-or-nothing: one invalid URL rejects the whole list.
#[utoipa::path(
    post,
    path = "/api/batch/add",
    tag = "batch",
    request_body = Vec<DownloadRequest>,
    responses(
        (status = 201, description = "Items added to the queue", body = AddBatchResponse),
        (status = 400, description = "Empty list or invalid URL", body = crate::error::ApiError),
        (status = 503, description = "Shutting down", body = crate::error::ApiError)
    )
)]
pub async fn add_batch(
    State(state): State<AppState>,
    Json(requests): Json<Vec<DownloadRequest>>,
) -> Response {
    match state.downloader.enqueue_batch(requests).await {
        Ok(item_ids) => {
            let queue_status = state.downloader.aggregate_counts().await;
            (
                StatusCode::CREATED,
                Json(AddBatchResponse {
                    item_ids,
                    queue_status,
                }),
            )
                .into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// GET /api/batch/queue - List every item with aggregate counts
#[utoipa::path(
    get,
    path = "/api/batch/queue",
    tag = "batch",
    responses(
        (status = 200, description = "Queue snapshot", body = QueueResponse)
    )
)]
pub async fn get_queue(State(state): State<AppState>) -> impl IntoResponse {
    let items = state.downloader.list_all().await;
    let status = state.downloader.aggregate_counts().await;
    Json(QueueResponse { items, status })
}

/// POST /api/batch/start - Dispatch every pending item
///
/// Returns once dispatch is scheduled; items progress in the background.
#[utoipa::path(
    post,
    path = "/api/batch/start",
    tag = "batch",
    responses(
        (status = 202, description = "Dispatch scheduled", body = StartBatchResponse),
        (status = 400, description = "No pending items", body = crate::error::ApiError),
        (status = 503, description = "Shutting down", body = crate::error::ApiError)
    )
)]
pub async fn start_batch(State(state): State<AppState>) -> Response {
    match state.downloader.start().await {
        Ok(summary) => {
            let queue_status = state.downloader.aggregate_counts().await;
            (
                StatusCode::ACCEPTED,
                Json(StartBatchResponse {
                    scheduled: summary.scheduled,
                    queue_status,
                }),
            )
                .into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// DELETE /api/batch/clear/completed - Remove completed, failed and cancelled items
#[utoipa::path(
    delete,
    path = "/api/batch/clear/completed",
    tag = "batch",
    responses(
        (status = 200, description = "Terminal items removed", body = ClearResponse)
    )
)]
pub async fn clear_completed(State(state): State<AppState>) -> impl IntoResponse {
    let removed = state.downloader.purge_terminal().await;
    let queue_status = state.downloader.aggregate_counts().await;
    Json(ClearResponse {
        removed,
        queue_status,
    })
}

/// DELETE /api/batch/clear/all - Cancel in-flight work and remove every item
#[utoipa::path(
    delete,
    path = "/api/batch/clear/all",
    tag = "batch",
    responses(
        (status = 200, description = "Queue cleared", body = ClearResponse)
    )
)]
pub async fn clear_all(State(state): State<AppState>) -> impl IntoResponse {
    let removed = state.downloader.purge_all().await;
    let queue_status = state.downloader.aggregate_counts().await;
    Json(ClearResponse {
        removed,
        queue_status,
    })
}
