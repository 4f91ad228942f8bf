//! Core types for batch-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;
use uuid::Uuid;

/// Unique identifier for a queue item
///
/// Generated from a random v4 UUID when the item is created, so identifiers are
/// never reused for the lifetime of the process.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct ItemId(pub Uuid);

impl ItemId {
    /// Allocate a fresh identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ItemId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ItemId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Item status
///
/// ```text
/// pending ──► downloading ──► completed
///   │  ▲           │  └─────► failed
///   ▼  │           ▼
/// paused        cancelled ◄── pending / paused
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Waiting to be dispatched
    Pending,
    /// Claimed by the dispatcher, retrieval in flight
    Downloading,
    /// Retrieval succeeded, file available
    Completed,
    /// Retrieval failed
    Failed,
    /// Cancelled by request
    Cancelled,
    /// Held back from dispatch by request
    Paused,
}

impl Status {
    /// All statuses, in display order
    pub const ALL: [Status; 6] = [
        Status::Pending,
        Status::Downloading,
        Status::Completed,
        Status::Failed,
        Status::Cancelled,
        Status::Paused,
    ];

    /// Whether the status admits no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Failed | Status::Cancelled)
    }

    /// Whether `self -> next` is a legal lifecycle transition
    ///
    /// Staying in the same non-terminal status is allowed so progress can be
    /// rewritten without changing the status.
    pub fn can_transition_to(&self, next: Status) -> bool {
        use Status::*;
        match (self, next) {
            (from, _) if from.is_terminal() => false,
            (from, to) if *from == to => true,
            (Pending, Downloading) | (Pending, Paused) | (Paused, Pending) => true,
            (Downloading, Completed) | (Downloading, Failed) => true,
            (Pending, Cancelled) | (Downloading, Cancelled) | (Paused, Cancelled) => true,
            _ => false,
        }
    }

    /// Lowercase name, as serialized
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Downloading => "downloading",
            Status::Completed => "completed",
            Status::Failed => "failed",
            Status::Cancelled => "cancelled",
            Status::Paused => "paused",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress stage reported alongside a percentage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Work claimed, engine starting up
    Starting,
    /// Bytes are being transferred
    Downloading,
    /// Post-transfer work (merging streams, audio extraction)
    Processing,
    /// File ready
    Complete,
    /// Retrieval failed
    Error,
}

impl Stage {
    /// Lowercase name, as used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Starting => "starting",
            Stage::Downloading => "downloading",
            Stage::Processing => "processing",
            Stage::Complete => "complete",
            Stage::Error => "error",
        }
    }

    /// Whether no further updates follow for the item
    pub fn is_final(&self) -> bool {
        matches!(self, Stage::Complete | Stage::Error)
    }
}

/// One progress tuple relayed to observers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProgressUpdate {
    /// Stage of the retrieval
    pub stage: Stage,
    /// Percentage (0-100)
    pub percent: u8,
    /// Human-readable message
    pub message: String,
}

impl ProgressUpdate {
    /// Create a new progress update
    pub fn new(stage: Stage, percent: u8, message: impl Into<String>) -> Self {
        Self {
            stage,
            percent,
            message: message.into(),
        }
    }
}

/// A request to download one media URL
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DownloadRequest {
    /// Media page URL
    pub url: String,

    /// Desired quality (e.g. "1080p", "720p")
    #[serde(default)]
    pub quality: Option<String>,

    /// Output container/codec (e.g. "mp4", "mp3"); defaulted at enqueue time
    #[serde(default)]
    pub output_format: Option<String>,

    /// Fetch audio only
    #[serde(default)]
    pub audio_only: bool,
}

impl DownloadRequest {
    /// Create a request for a URL with default options
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the desired quality
    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = Some(quality.into());
        self
    }

    /// Request audio only
    pub fn audio_only(mut self) -> Self {
        self.audio_only = true;
        self
    }
}

/// Snapshot of a queue item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QueueItem {
    /// Item ID
    pub id: ItemId,
    /// Media page URL
    pub url: String,
    /// Desired quality
    pub quality: Option<String>,
    /// Output format
    pub output_format: String,
    /// Audio only
    pub audio_only: bool,
    /// Current status
    pub status: Status,
    /// Latest progress percentage (0-100)
    pub progress: u8,
    /// Latest progress message
    pub message: String,
    /// Local file path (present iff completed)
    #[schema(value_type = Option<String>)]
    pub filepath: Option<PathBuf>,
    /// Title reported by the engine
    pub title: Option<String>,
    /// Error message (present iff failed)
    pub error: Option<String>,
    /// Whether the file has been handed to a consumer
    pub downloaded: bool,
    /// When the item was enqueued
    pub created_at: DateTime<Utc>,
    /// When the item first started downloading
    pub started_at: Option<DateTime<Utc>>,
    /// When the item reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,
}

impl QueueItem {
    pub(crate) fn new(id: ItemId, request: DownloadRequest, output_format: String) -> Self {
        Self {
            id,
            url: request.url,
            quality: request.quality,
            output_format,
            audio_only: request.audio_only,
            status: Status::Pending,
            progress: 0,
            message: String::new(),
            filepath: None,
            title: None,
            error: None,
            downloaded: false,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

/// Per-status item counts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QueueCounts {
    /// Items waiting to be dispatched
    pub pending: usize,
    /// Items with retrieval in flight
    pub downloading: usize,
    /// Completed items
    pub completed: usize,
    /// Failed items
    pub failed: usize,
    /// Cancelled items
    pub cancelled: usize,
    /// Paused items
    pub paused: usize,
    /// Total items in the store
    pub total: usize,
}

impl QueueCounts {
    pub(crate) fn record(&mut self, status: Status) {
        match status {
            Status::Pending => self.pending += 1,
            Status::Downloading => self.downloading += 1,
            Status::Completed => self.completed += 1,
            Status::Failed => self.failed += 1,
            Status::Cancelled => self.cancelled += 1,
            Status::Paused => self.paused += 1,
        }
        self.total += 1;
    }
}

/// Result of a `start()` call
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StartSummary {
    /// Number of pending items handed to the dispatcher
    pub scheduled: usize,
}

/// Metadata for one media URL, looked up without downloading it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MediaInfo {
    /// URL the lookup was made for
    pub url: String,
    /// Media title ("Unknown" when the site gives none)
    pub title: String,
    /// Description text
    pub description: Option<String>,
    /// Thumbnail image URL
    pub thumbnail: Option<String>,
    /// Duration in seconds
    pub duration: Option<f64>,
    /// Uploader or channel name
    pub uploader: Option<String>,
    /// Uploader or channel page
    pub uploader_url: Option<String>,
    /// View count, when the site exposes one
    pub view_count: Option<u64>,
    /// Available formats (at most [`MediaInfo::MAX_FORMATS`])
    pub formats: Vec<MediaFormat>,
    /// Platform detected from the URL
    pub platform: String,
}

impl MediaInfo {
    /// Formats kept per lookup
    pub const MAX_FORMATS: usize = 50;
}

/// One downloadable format of a media URL
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MediaFormat {
    /// yt-dlp format identifier
    pub format_id: String,
    /// Container extension
    pub ext: String,
    /// Quality note (e.g. "720p", "medium")
    pub quality: Option<String>,
    /// Resolution (e.g. "1280x720", "audio only")
    pub resolution: Option<String>,
    /// Size in bytes, if known up front
    pub filesize: Option<u64>,
    /// Free-form note from the extractor
    pub format_note: Option<String>,
    /// Frames per second
    pub fps: Option<f64>,
    /// Video codec ("none" for audio-only formats)
    pub vcodec: Option<String>,
    /// Audio codec ("none" for video-only formats)
    pub acodec: Option<String>,
}

/// A quality label accepted in [`DownloadRequest::quality`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QualityOption {
    /// Value to send (e.g. "720p")
    pub value: String,
    /// Human-readable label
    pub label: String,
}

/// Lifecycle event broadcast to subscribers
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Item added to the queue
    Queued {
        /// Item ID
        id: ItemId,
        /// Requested URL
        url: String,
    },

    /// A dispatch pass was started
    BatchStarted {
        /// Number of pending items in the pass
        scheduled: usize,
    },

    /// Item claimed by the dispatcher
    Started {
        /// Item ID
        id: ItemId,
    },

    /// Item completed successfully
    Completed {
        /// Item ID
        id: ItemId,
        /// Local file path
        #[schema(value_type = String)]
        path: PathBuf,
    },

    /// Item failed
    Failed {
        /// Item ID
        id: ItemId,
        /// Error reported by the engine
        error: String,
    },

    /// Item cancelled
    Cancelled {
        /// Item ID
        id: ItemId,
    },

    /// Item paused
    Paused {
        /// Item ID
        id: ItemId,
    },

    /// Item resumed
    Resumed {
        /// Item ID
        id: ItemId,
    },

    /// Item removed from the store
    Removed {
        /// Item ID
        id: ItemId,
    },

    /// Entire queue cleared
    QueueCleared,

    /// Downloader is shutting down
    Shutdown,
}

impl Event {
    /// Snake-case event name (SSE event type)
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Queued { .. } => "queued",
            Event::BatchStarted { .. } => "batch_started",
            Event::Started { .. } => "started",
            Event::Completed { .. } => "completed",
            Event::Failed { .. } => "failed",
            Event::Cancelled { .. } => "cancelled",
            Event::Paused { .. } => "paused",
            Event::Resumed { .. } => "resumed",
            Event::Removed { .. } => "removed",
            Event::QueueCleared => "queue_cleared",
            Event::Shutdown => "shutdown",
        }
    }
}
