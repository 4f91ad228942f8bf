//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`batch`] - Queue-wide operations (add, list, start, clear)
//! - [`items`] - Single-item control, file hand-off and progress streams
//! - [`video`] - Media metadata lookups and accepted quality labels
//! - [`system`] - Health, lifecycle events, OpenAPI

use crate::types::{ItemId, QualityOption, QueueCounts, QueueItem, Status};
use serde::{Deserialize, Serialize};

mod batch;
mod items;
mod system;
mod video;

// Re-export all handlers so `routes::function_name` works
pub use batch::*;
pub use items::*;
pub use system::*;
pub use video::*;

// ============================================================================
// Response Types (shared across handlers)
// ============================================================================

/// Response for POST /api/batch/add
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct AddBatchResponse {
    /// Identifiers of the new items, in request order
    pub item_ids: Vec<ItemId>,
    /// Counts after the items were added
    pub queue_status: QueueCounts,
}

/// Response for GET /api/batch/queue
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct QueueResponse {
    /// Every item in insertion order
    pub items: Vec<QueueItem>,
    /// Aggregate counts
    pub status: QueueCounts,
}

/// Response for POST /api/batch/start
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct StartBatchResponse {
    /// Pending items handed to the dispatcher
    pub scheduled: usize,
    /// Counts at the time dispatch began
    pub queue_status: QueueCounts,
}

/// Response for the item control routes (cancel, pause, resume)
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ItemActionResponse {
    /// Item ID
    pub item_id: ItemId,
    /// Status after the operation
    pub status: Status,
}

/// Response for the clear routes
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ClearResponse {
    /// Number of items removed
    pub removed: usize,
    /// Counts after removal
    pub queue_status: QueueCounts,
}

/// Request body for POST /api/video/info
#[derive(Debug, Default, Deserialize, Serialize, utoipa::ToSchema)]
pub struct MediaInfoRequest {
    /// Media page URL
    #[serde(default)]
    pub url: Option<String>,
}

/// Response for GET /api/video/formats
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct FormatsResponse {
    /// Quality labels a download request may carry, best first
    pub quality_options: Vec<QualityOption>,
}
