//! Single-item handlers: status, control, file hand-off and progress stream.

use super::ItemActionResponse;
use crate::api::AppState;
use crate::error::{Error, ItemError, Result};
use crate::types::{ItemId, QueueItem, Status};
use crate::utils::{format_filesize, sanitize_filename};
use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::header,
    response::{
        IntoResponse, Response,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use std::convert::Infallible;
use std::path::{Path as FsPath, PathBuf};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_util::io::ReaderStream;

/// GET /api/batch/item/:id - Get a single item
#[utoipa::path(
    get,
    path = "/api/batch/item/{id}",
    tag = "items",
    params(
        ("id" = String, Path, description = "Item ID (UUID); anything else is not found")
    ),
    responses(
        (status = 200, description = "Item snapshot", body = QueueItem),
        (status = 404, description = "Item not found", body = crate::error::ApiError)
    )
)]
pub async fn get_item(State(state): State<AppState>, Path(raw): Path<String>) -> Response {
    let id = match parse_item_id(&raw) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };
    match state.downloader.get_status(id).await {
        Ok(item) => Json(item).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /api/batch/item/:id/cancel - Cancel an item
///
/// Cancelling a finished item is a no-op.
#[utoipa::path(
    post,
    path = "/api/batch/item/{id}/cancel",
    tag = "items",
    params(
        ("id" = String, Path, description = "Item ID (UUID); anything else is not found")
    ),
    responses(
        (status = 200, description = "Item cancelled (or already finished)", body = ItemActionResponse),
        (status = 404, description = "Item not found", body = crate::error::ApiError)
    )
)]
pub async fn cancel_item(State(state): State<AppState>, Path(raw): Path<String>) -> Response {
    let id = match parse_item_id(&raw) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };
    let result = state.downloader.cancel(id).await;
    action_response(&state, id, result).await
}

/// POST /api/batch/item/:id/pause - Hold a pending item back from dispatch
#[utoipa::path(
    post,
    path = "/api/batch/item/{id}/pause",
    tag = "items",
    params(
        ("id" = String, Path, description = "Item ID (UUID); anything else is not found")
    ),
    responses(
        (status = 200, description = "Item paused if it was pending", body = ItemActionResponse),
        (status = 404, description = "Item not found", body = crate::error::ApiError)
    )
)]
pub async fn pause_item(State(state): State<AppState>, Path(raw): Path<String>) -> Response {
    let id = match parse_item_id(&raw) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };
    let result = state.downloader.pause(id).await;
    action_response(&state, id, result).await
}

/// POST /api/batch/item/:id/resume - Return a paused item to pending
#[utoipa::path(
    post,
    path = "/api/batch/item/{id}/resume",
    tag = "items",
    params(
        ("id" = String, Path, description = "Item ID (UUID); anything else is not found")
    ),
    responses(
        (status = 200, description = "Item resumed if it was paused", body = ItemActionResponse),
        (status = 404, description = "Item not found", body = crate::error::ApiError)
    )
)]
pub async fn resume_item(State(state): State<AppState>, Path(raw): Path<String>) -> Response {
    let id = match parse_item_id(&raw) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };
    let result = state.downloader.resume(id).await;
    action_response(&state, id, result).await
}

/// Parse an item id from the path
///
/// Anything that is not a UUID cannot name an item, so it is reported as not
/// found rather than as a malformed request.
fn parse_item_id(raw: &str) -> Result<ItemId> {
    raw.parse()
        .map_err(|_| Error::NotFound(format!("item {raw}")))
}

async fn action_response(state: &AppState, id: ItemId, result: Result<()>) -> Response {
    if let Err(e) = result {
        return e.into_response();
    }
    match state.downloader.get_status(id).await {
        Ok(item) => Json(ItemActionResponse {
            item_id: id,
            status: item.status,
        })
        .into_response(),
        // Purged between the operation and the read-back
        Err(e) => e.into_response(),
    }
}

/// GET /api/batch/item/:id/download - Fetch a completed item's file
///
/// Streams the file as an attachment and marks the item downloaded. The file
/// is removed from disk once the response body is finished or dropped.
#[utoipa::path(
    get,
    path = "/api/batch/item/{id}/download",
    tag = "items",
    params(
        ("id" = String, Path, description = "Item ID (UUID); anything else is not found")
    ),
    responses(
        (status = 200, description = "File contents", content_type = "application/octet-stream"),
        (status = 404, description = "Item or file not found", body = crate::error::ApiError),
        (status = 409, description = "Item is not completed", body = crate::error::ApiError)
    )
)]
pub async fn download_item_file(State(state): State<AppState>, Path(raw): Path<String>) -> Response {
    let result = match parse_item_id(&raw) {
        Ok(id) => serve_file(&state, id).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn serve_file(state: &AppState, id: ItemId) -> Result<Response> {
    let item = state.downloader.get_status(id).await?;
    let path = match (item.status, item.filepath) {
        (Status::Completed, Some(path)) => path,
        (status, _) => {
            return Err(Error::Item(ItemError::InvalidState {
                id,
                operation: "fetch file".to_string(),
                current_state: status.to_string(),
            }));
        }
    };

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::NotFound(format!("file for item {id}")));
        }
        Err(e) => return Err(Error::Io(e)),
    };
    let len = file.metadata().await?.len();

    state.downloader.mark_downloaded(id).await?;

    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(sanitize_filename)
        .unwrap_or_else(|| format!("{id}.{}", item.output_format));

    tracing::info!(item_id = %id, file = %filename, size = %format_filesize(Some(len)), "serving file");

    let headers = [
        (header::CONTENT_TYPE, content_type_for(&path).to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ),
        (header::CONTENT_LENGTH, len.to_string()),
    ];

    let cleanup = RemoveOnDrop { id, path };
    let stream = ReaderStream::new(file).map(move |chunk| {
        let _guard = &cleanup;
        chunk
    });

    Ok((headers, Body::from_stream(stream)).into_response())
}

/// Deletes the served file once the response stream is gone
struct RemoveOnDrop {
    id: ItemId,
    path: PathBuf,
}

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(item_id = %self.id, path = %self.path.display(), "served file removed"),
            Err(e) => tracing::warn!(item_id = %self.id, error = %e, "failed to remove served file"),
        }
    }
}

fn content_type_for(path: &FsPath) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("mp3") => "audio/mpeg",
        Some("m4a") => "audio/mp4",
        Some("opus") | Some("ogg") => "audio/ogg",
        _ => "application/octet-stream",
    }
}

/// GET /api/batch/item/:id/progress - Server-sent progress stream for one item
///
/// The first event (`snapshot`) carries the item as currently stored; each
/// later event is named after the progress stage and carries the update.
#[utoipa::path(
    get,
    path = "/api/batch/item/{id}/progress",
    tag = "items",
    params(
        ("id" = String, Path, description = "Item ID (UUID); anything else is not found")
    ),
    responses(
        (status = 200, description = "Server-sent events stream (text/event-stream)", content_type = "text/event-stream"),
        (status = 404, description = "Item not found", body = crate::error::ApiError)
    )
)]
pub async fn item_progress_stream(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Response {
    let id = match parse_item_id(&raw) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };
    // Subscribe before reading the snapshot so no update falls in between
    let receiver = state.progress.subscribe();
    let item = match state.downloader.get_status(id).await {
        Ok(item) => item,
        Err(e) => return e.into_response(),
    };

    let snapshot = match serde_json::to_string(&item) {
        Ok(json) => SseEvent::default().event("snapshot").data(json),
        Err(e) => return Error::Serialization(e).into_response(),
    };

    let updates = BroadcastStream::new(receiver).filter_map(move |result| match result {
        Ok((item_id, update)) if item_id == id => match serde_json::to_string(&update) {
            Ok(json) => Some(Ok::<_, Infallible>(
                SseEvent::default().event(update.stage.as_str()).data(json),
            )),
            Err(e) => {
                tracing::warn!(item_id = %id, error = %e, "failed to serialize progress update");
                None
            }
        },
        Ok(_) => None,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(item_id = %id, skipped, "progress subscriber lagged");
            Some(Ok(super::system::lagged_event(skipped)))
        }
    });

    let stream = tokio_stream::once(Ok(snapshot)).chain(updates);
    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}
