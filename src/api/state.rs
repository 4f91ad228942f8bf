//! Application state for the API server

use crate::relay::BroadcastProgressSink;
use crate::{BatchDownloader, Config};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (cheap Arc clones).
#[derive(Clone)]
pub struct AppState {
    /// The batch downloader
    pub downloader: Arc<BatchDownloader>,

    /// Configuration
    pub config: Arc<Config>,

    /// Progress sink installed on the downloader; SSE routes subscribe to it
    pub progress: Arc<BroadcastProgressSink>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(
        downloader: Arc<BatchDownloader>,
        config: Arc<Config>,
        progress: Arc<BroadcastProgressSink>,
    ) -> Self {
        Self {
            downloader,
            config,
            progress,
        }
    }
}
