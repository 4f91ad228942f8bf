//! Traits and types for retrieval engines

use crate::relay::ProgressReporter;
use crate::types::{ItemId, MediaInfo, QueueItem};
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Parameters for one retrieval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalRequest {
    /// Correlation id of the queue item
    pub id: ItemId,
    /// Media page URL
    pub url: String,
    /// Desired quality (e.g. "720p")
    pub quality: Option<String>,
    /// Output format (e.g. "mp4", "mp3")
    pub output_format: String,
    /// Fetch audio only
    pub audio_only: bool,
}

impl From<&QueueItem> for RetrievalRequest {
    fn from(item: &QueueItem) -> Self {
        Self {
            id: item.id,
            url: item.url.clone(),
            quality: item.quality.clone(),
            output_format: item.output_format.clone(),
            audio_only: item.audio_only,
        }
    }
}

/// Result of a successful retrieval
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retrieved {
    /// Local path of the finished file
    pub filepath: PathBuf,
    /// Media title, if the engine learned it
    pub title: Option<String>,
}

/// Retrieval failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RetrievalError {
    /// The engine gave up; the reason is stored verbatim on the item
    #[error("{0}")]
    Failed(String),

    /// The cancellation token fired and the engine stopped
    #[error("retrieval cancelled")]
    Cancelled,
}

/// Trait for retrieval engines
///
/// An engine turns one URL into one local file. It owns every resource it
/// touches (child processes, partial files) and must release them before
/// returning, including when `cancel` fires.
///
/// # Examples
///
/// ```no_run
/// use batch_dl::engine::{RetrievalEngine, RetrievalRequest, YtDlpEngine};
/// use batch_dl::relay::ProgressReporter;
/// use batch_dl::{Config, ItemId};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = YtDlpEngine::from_config(&Config::default().engine)?;
/// let (reporter, _rx) = ProgressReporter::channel();
/// let request = RetrievalRequest {
///     id: ItemId::new(),
///     url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".into(),
///     quality: Some("720p".into()),
///     output_format: "mp4".into(),
///     audio_only: false,
/// };
/// let retrieved = engine
///     .retrieve(&request, reporter, CancellationToken::new())
///     .await?;
/// println!("saved to {}", retrieved.filepath.display());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait RetrievalEngine: Send + Sync {
    /// Retrieve `request.url` into a local file
    ///
    /// Progress goes through `progress` as often as the engine likes. When
    /// `cancel` fires the engine should stop promptly and return
    /// [`RetrievalError::Cancelled`].
    async fn retrieve(
        &self,
        request: &RetrievalRequest,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> Result<Retrieved, RetrievalError>;

    /// Look up metadata for `url` without downloading it
    ///
    /// Engines that cannot do this keep the default, which fails.
    async fn fetch_info(&self, _url: &str) -> Result<MediaInfo, RetrievalError> {
        Err(RetrievalError::Failed(format!(
            "{} engine does not support metadata lookup",
            self.name()
        )))
    }

    /// Get the name of this engine (for logging)
    fn name(&self) -> &'static str;
}
