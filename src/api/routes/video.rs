//! Media handlers: metadata lookup and accepted quality labels.

use super::{FormatsResponse, MediaInfoRequest};
use crate::api::AppState;
use crate::engine::quality_options;
use crate::error::Error;
use crate::types::MediaInfo;
use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};

/// POST /api/video/info - Look up media metadata without downloading
#[utoipa::path(
    post,
    path = "/api/video/info",
    tag = "video",
    request_body = MediaInfoRequest,
    responses(
        (status = 200, description = "Media metadata", body = MediaInfo),
        (status = 400, description = "Missing or invalid URL, or unsupported platform", body = crate::error::ApiError),
        (status = 502, description = "The engine could not read the metadata", body = crate::error::ApiError)
    )
)]
pub async fn media_info(
    State(state): State<AppState>,
    Json(request): Json<MediaInfoRequest>,
) -> Response {
    let Some(url) = request.url.filter(|u| !u.trim().is_empty()) else {
        return Error::Validation("url is required".to_string()).into_response();
    };
    match state.downloader.media_info(&url).await {
        Ok(info) => Json(info).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /api/video/formats - Quality labels accepted by download requests
#[utoipa::path(
    get,
    path = "/api/video/formats",
    tag = "video",
    responses(
        (status = 200, description = "Accepted quality labels", body = FormatsResponse)
    )
)]
pub async fn quality_formats() -> impl IntoResponse {
    Json(FormatsResponse {
        quality_options: quality_options(),
    })
}
