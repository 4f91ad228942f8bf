//! # batch-dl
//!
//! Backend library for queueing media downloads and running them with bounded
//! concurrency.
//!
//! ## Design Philosophy
//!
//! batch-dl is designed to be:
//! - **Explicitly constructed** - Each [`BatchDownloader`] owns its own store,
//!   limiter and engine; independent instances share nothing
//! - **Engine-agnostic** - Retrieval goes through the [`RetrievalEngine`] trait;
//!   [`YtDlpEngine`] is the bundled implementation
//! - **Event-driven** - Consumers subscribe to lifecycle events and an optional
//!   progress sink, no polling required
//! - **Library-first** - The REST/SSE surface in [`api`] is optional
//!
//! ## Quick Start
//!
//! ```no_run
//! use batch_dl::{BatchDownloader, Config, DownloadRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = BatchDownloader::with_ytdlp(Config::default()).await?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     downloader
//!         .enqueue_batch(vec![
//!             DownloadRequest::new("https://www.youtube.com/watch?v=dQw4w9WgXcQ").with_quality("720p"),
//!             DownloadRequest::new("https://www.tiktok.com/@user/video/123").audio_only(),
//!         ])
//!         .await?;
//!     downloader.start().await?;
//!     downloader.wait_for_idle().await;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Core downloader implementation (decomposed into focused submodules)
pub mod downloader;
/// Retrieval engines
pub mod engine;
/// Error types
pub mod error;
/// Progress relay and sinks
pub mod relay;
/// Item store and state machine
pub mod store;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use downloader::BatchDownloader;
pub use engine::{RetrievalEngine, RetrievalError, RetrievalRequest, Retrieved, YtDlpEngine};
pub use error::{ApiError, Error, ErrorDetail, ItemError, Result, ToHttpStatus};
pub use relay::{BroadcastProgressSink, ProgressReporter, ProgressSink};
pub use types::{
    DownloadRequest, Event, ItemId, MediaFormat, MediaInfo, ProgressUpdate, QualityOption,
    QueueCounts, QueueItem, Stage, StartSummary, Status,
};

/// Helper function to run the downloader with graceful signal handling.
///
/// Waits for a termination signal and then calls the downloader's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use batch_dl::{BatchDownloader, Config, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = BatchDownloader::with_ytdlp(Config::default()).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(downloader).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: BatchDownloader) -> Result<()> {
    wait_for_signal().await;
    downloader.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
