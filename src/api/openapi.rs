//! OpenAPI documentation and schema generation
//!
//! Defines the OpenAPI specification for the batch-dl REST API using utoipa
//! for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the batch-dl REST API
///
/// The document can be accessed via:
/// - `/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "batch-dl REST API",
        version = "0.1.0",
        description = "REST API for queueing media downloads, running them with bounded concurrency and fetching the results",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8000", description = "Local development server")
    ),
    paths(
        // Batch Queue
        crate::api::routes::add_batch,
        crate::api::routes::get_queue,
        crate::api::routes::start_batch,
        crate::api::routes::clear_completed,
        crate::api::routes::clear_all,

        // Items
        crate::api::routes::get_item,
        crate::api::routes::cancel_item,
        crate::api::routes::pause_item,
        crate::api::routes::resume_item,
        crate::api::routes::download_item_file,
        crate::api::routes::item_progress_stream,

        // Media
        crate::api::routes::media_info,
        crate::api::routes::quality_formats,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(
        schemas(
            // Core types
            crate::types::ItemId,
            crate::types::Status,
            crate::types::Stage,
            crate::types::DownloadRequest,
            crate::types::QueueItem,
            crate::types::QueueCounts,
            crate::types::StartSummary,
            crate::types::ProgressUpdate,
            crate::types::Event,
            crate::types::MediaInfo,
            crate::types::MediaFormat,
            crate::types::QualityOption,

            // Response types
            crate::api::routes::AddBatchResponse,
            crate::api::routes::QueueResponse,
            crate::api::routes::StartBatchResponse,
            crate::api::routes::ItemActionResponse,
            crate::api::routes::ClearResponse,
            crate::api::routes::MediaInfoRequest,
            crate::api::routes::FormatsResponse,

            // Error types
            crate::error::ApiError,
            crate::error::ErrorDetail,
        )
    ),
    tags(
        (name = "batch", description = "Queue-wide operations"),
        (name = "items", description = "Single-item control, file hand-off and progress"),
        (name = "video", description = "Media metadata lookups"),
        (name = "system", description = "Health, events and API documentation")
    )
)]
pub struct ApiDoc;
