//! REST API server module
//!
//! Exposes the batch queue over HTTP: JSON routes for queue management, SSE
//! streams for lifecycle events and per-item progress, and an OpenAPI document.

use crate::relay::BroadcastProgressSink;
use crate::{BatchDownloader, Config, Result};
use axum::{
    Router,
    http::HeaderValue,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Path Swagger UI loads its document from
///
/// Kept apart from `/openapi.json` because both are served by the same router.
pub const SWAGGER_OPENAPI_URL: &str = "/api-docs/openapi.json";

/// Create the API router with all route definitions
///
/// Installs a [`BroadcastProgressSink`] on the downloader so that progress
/// routes can stream per-item updates.
///
/// # Routes
///
/// ## Batch Queue (`/api/batch`)
/// - `POST /api/batch/add` - Enqueue a list of download requests
/// - `GET /api/batch/queue` - List every item with aggregate counts
/// - `POST /api/batch/start` - Dispatch everything currently pending
/// - `DELETE /api/batch/clear/completed` - Purge completed, failed and cancelled items
/// - `DELETE /api/batch/clear/all` - Cancel in-flight work and purge every item
///
/// ## Items (`/api/batch/item`)
/// - `GET /api/batch/item/:id` - Get a single item
/// - `POST /api/batch/item/:id/cancel` - Cancel an item
/// - `POST /api/batch/item/:id/pause` - Pause a pending item
/// - `POST /api/batch/item/:id/resume` - Resume a paused item
/// - `GET /api/batch/item/:id/download` - Fetch a completed item's file (removed afterwards)
/// - `GET /api/batch/item/:id/progress` - Server-sent progress stream for one item
///
/// ## Media (`/api/video`)
/// - `POST /api/video/info` - Look up media metadata without downloading
/// - `GET /api/video/formats` - Quality labels accepted by requests
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /events` - Server-sent lifecycle events
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled)
pub fn create_router(downloader: Arc<BatchDownloader>, config: Arc<Config>) -> Router {
    let progress = Arc::new(BroadcastProgressSink::new(config.progress.buffer));
    downloader.set_progress_sink(progress.clone());

    let state = AppState::new(downloader, config.clone(), progress);

    let batch = Router::new()
        .route("/add", post(routes::add_batch))
        .route("/queue", get(routes::get_queue))
        .route("/start", post(routes::start_batch))
        .route("/clear/completed", delete(routes::clear_completed))
        .route("/clear/all", delete(routes::clear_all))
        .route("/item/:id", get(routes::get_item))
        .route("/item/:id/cancel", post(routes::cancel_item))
        .route("/item/:id/pause", post(routes::pause_item))
        .route("/item/:id/resume", post(routes::resume_item))
        .route("/item/:id/download", get(routes::download_item_file))
        .route("/item/:id/progress", get(routes::item_progress_stream));

    let video = Router::new()
        .route("/info", post(routes::media_info))
        .route("/formats", get(routes::quality_formats));

    let router = Router::new()
        .nest("/api/batch", batch)
        .nest("/api/video", video)
        // System
        .route("/health", get(routes::health_check))
        .route("/events", get(routes::event_stream))
        .route("/openapi.json", get(routes::openapi_spec));

    // Merge Swagger UI routes if enabled in config (before applying state)
    let router = if config.server.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url(SWAGGER_OPENAPI_URL, ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state).layer(TraceLayer::new_for_http());

    // Apply CORS middleware if enabled in config
    if config.server.api.cors_enabled {
        let cors = build_cors_layer(&config.server.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` (or an empty list) allows any origin; otherwise only the listed
/// origins are allowed. Unparseable origins are skipped.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Runs until the server fails or the surrounding task is dropped.
///
/// # Example
///
/// ```no_run
/// use batch_dl::{BatchDownloader, Config};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let downloader = Arc::new(BatchDownloader::with_ytdlp((*config).clone()).await?);
///
/// // Start API server (blocks until shutdown)
/// batch_dl::api::start_api_server(downloader, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(downloader: Arc<BatchDownloader>, config: Arc<Config>) -> Result<()> {
    let bind_address = config.server.api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let app = create_router(downloader, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "API server failed");
            crate::error::Error::ApiServerError(e.to_string())
        })?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
