//! Core downloader implementation split into focused submodules.
//!
//! The `BatchDownloader` struct and its methods are organized by domain:
//! - [`queue`] - Enqueueing and queries
//! - [`queue_processor`] - `start()` and the bounded dispatcher
//! - [`download_task`] - One item's retrieval, from claim to terminal state
//! - [`control`] - Cancel, pause, resume and purge
//! - [`lifecycle`] - Shutdown and idle waiting
//! - [`info`] - Media metadata lookups

mod control;
mod download_task;
mod info;
mod lifecycle;
mod queue;
mod queue_processor;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::engine::{RetrievalEngine, YtDlpEngine};
use crate::error::{Error, Result};
use crate::relay::ProgressSink;
use crate::store::ItemStore;
use crate::types::{Event, MediaInfo};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{RwLock, Semaphore, broadcast};

/// Concurrency limiter and dispatch bookkeeping
#[derive(Clone)]
pub(crate) struct QueueState {
    /// Semaphore to limit concurrent retrievals (one permit per in-flight item)
    pub(crate) concurrent_limit: Arc<Semaphore>,
    /// Flag to indicate whether new work is accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Number of dispatch passes still admitting items
    pub(crate) active_dispatchers: Arc<AtomicUsize>,
}

impl QueueState {
    pub(crate) fn new(max_concurrent: usize) -> Self {
        Self {
            concurrent_limit: Arc::new(Semaphore::new(max_concurrent)),
            accepting_new: Arc::new(AtomicBool::new(true)),
            active_dispatchers: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// Slot holding the optional progress observer
type SinkSlot = Arc<std::sync::RwLock<Option<Arc<dyn ProgressSink>>>>;

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
///
/// Owns the item store, the concurrency limiter and the retrieval engine.
/// Independent instances share nothing, so tests can run several side by side.
#[derive(Clone)]
pub struct BatchDownloader {
    /// Canonical item records
    pub(crate) store: Arc<ItemStore>,
    /// Engine invoked once per item
    pub(crate) engine: Arc<dyn RetrievalEngine>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Limiter and dispatch state
    pub(crate) queue_state: QueueState,
    /// Optional progress observer, captured by each item when its work starts
    pub(crate) progress_sink: SinkSlot,
    /// Metadata already looked up, keyed by URL
    pub(crate) info_cache: Arc<RwLock<HashMap<String, MediaInfo>>>,
}

impl BatchDownloader {
    /// Create a downloader around an engine
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid
    /// (e.g. `max_concurrent_downloads == 0`).
    pub fn new(config: Config, engine: Arc<dyn RetrievalEngine>) -> Result<Self> {
        config.validate()?;

        let (event_tx, _rx) = broadcast::channel(config.queue.event_buffer);
        let queue_state = QueueState::new(config.queue.max_concurrent_downloads);

        tracing::info!(
            engine = engine.name(),
            max_concurrent = config.queue.max_concurrent_downloads,
            "batch downloader initialized"
        );

        Ok(Self {
            store: Arc::new(ItemStore::new()),
            engine,
            event_tx,
            config: Arc::new(config),
            queue_state,
            progress_sink: Arc::new(std::sync::RwLock::new(None)),
            info_cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Create a downloader backed by yt-dlp
    ///
    /// Creates the temp directory and locates the yt-dlp/ffmpeg binaries.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use batch_dl::{BatchDownloader, Config, DownloadRequest};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let downloader = BatchDownloader::with_ytdlp(Config::default()).await?;
    ///
    ///     downloader
    ///         .enqueue(DownloadRequest::new("https://www.youtube.com/watch?v=dQw4w9WgXcQ"))
    ///         .await?;
    ///     downloader.start().await?;
    ///     downloader.wait_for_idle().await;
    ///
    ///     for item in downloader.list_all().await {
    ///         println!("{} {:?}", item.status, item.filepath);
    ///     }
    ///     Ok(())
    /// }
    /// ```
    pub async fn with_ytdlp(config: Config) -> Result<Self> {
        tokio::fs::create_dir_all(&config.engine.temp_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create temp directory '{}': {}",
                        config.engine.temp_dir.display(),
                        e
                    ),
                ))
            })?;

        let engine = YtDlpEngine::from_config(&config.engine)?;
        Self::new(config, Arc::new(engine))
    }

    /// Subscribe to lifecycle events
    ///
    /// Each subscriber receives every event sent after it subscribed. A
    /// subscriber that falls more than `queue.event_buffer` events behind gets
    /// `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Name of the retrieval engine in use
    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Whether enqueue/start are still accepted
    pub fn is_accepting(&self) -> bool {
        self.queue_state.accepting_new.load(Ordering::SeqCst)
    }

    /// Install a progress observer
    ///
    /// Safe to call at any time. Items already running keep the sink they
    /// captured when their work started.
    pub fn set_progress_sink(&self, sink: Arc<dyn ProgressSink>) {
        let mut slot = self
            .progress_sink
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(sink);
    }

    /// Remove the progress observer; later updates are dropped
    pub fn clear_progress_sink(&self) {
        let mut slot = self
            .progress_sink
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = None;
    }

    pub(crate) fn current_sink(&self) -> Option<Arc<dyn ProgressSink>> {
        self.progress_sink
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Spawn the REST API server in a background task
    ///
    /// The server listens on `server.api.bind_address` and runs alongside
    /// dispatch until the task is aborted or fails.
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let downloader = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(downloader, config).await })
    }

    pub(crate) fn ensure_accepting(&self) -> Result<()> {
        if self.is_accepting() {
            Ok(())
        } else {
            Err(Error::ShuttingDown)
        }
    }
}
