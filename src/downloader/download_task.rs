//! Download task: runs one claimed item through the engine and records its terminal state.

use tokio::sync::OwnedSemaphorePermit;
use tokio_util::sync::CancellationToken;

use super::BatchDownloader;
use crate::engine::{RetrievalError, RetrievalRequest, Retrieved};
use crate::relay::{ProgressReporter, RelayParams, spawn_relay};
use crate::types::{Event, ItemId, QueueItem, Stage};

/// Everything a download task needs, moved into the spawned future
pub(crate) struct DownloadTaskContext {
    /// Snapshot taken at claim time (status is `downloading`)
    pub item: QueueItem,
    /// Limiter slot, released when the task ends on any path
    pub permit: OwnedSemaphorePermit,
    /// Handle the store signals on cancel
    pub cancel_token: CancellationToken,
    /// Downloader handle
    pub downloader: BatchDownloader,
}

/// Spawn the task for one claimed item
pub(crate) fn spawn_download_task(ctx: DownloadTaskContext) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run_download_task(ctx))
}

/// Run one item to a terminal state
///
/// The engine runs in its own task so that a panic inside it surfaces as a
/// `JoinError` here instead of unwinding past the permit.
pub(crate) async fn run_download_task(ctx: DownloadTaskContext) {
    let DownloadTaskContext {
        item,
        permit,
        cancel_token,
        downloader,
    } = ctx;
    let _permit = permit;
    let id = item.id;

    let (reporter, rx) = ProgressReporter::channel();
    spawn_relay(RelayParams {
        id,
        rx,
        sink: downloader.current_sink(),
        store: downloader.store.clone(),
    });
    reporter.report(Stage::Starting, 0, "Starting download");

    let request = RetrievalRequest::from(&item);
    let engine = downloader.engine.clone();
    let engine_reporter = reporter.clone();
    let token = cancel_token.clone();

    tracing::info!(item_id = %id, url = %item.url, engine = engine.name(), "retrieval started");

    let outcome = tokio::spawn(async move {
        engine.retrieve(&request, engine_reporter, token).await
    })
    .await;

    match outcome {
        Ok(Ok(retrieved)) => downloader.finish_success(id, retrieved, &reporter).await,
        Ok(Err(RetrievalError::Cancelled)) => downloader.finish_cancelled(id, &reporter).await,
        Ok(Err(RetrievalError::Failed(reason))) => {
            downloader.finish_failure(id, reason, &reporter).await
        }
        Err(join_error) => {
            tracing::error!(item_id = %id, error = %join_error, "retrieval task aborted");
            downloader
                .finish_failure(id, format!("retrieval task aborted: {join_error}"), &reporter)
                .await
        }
    }
}

impl BatchDownloader {
    async fn finish_success(&self, id: ItemId, retrieved: Retrieved, reporter: &ProgressReporter) {
        let Retrieved { filepath, title } = retrieved;

        if self
            .store
            .set_filepath(id, filepath.clone(), title)
            .await
        {
            tracing::info!(item_id = %id, path = %filepath.display(), "retrieval completed");
            reporter.report(Stage::Complete, 100, "Ready for download");
            self.emit_event(Event::Completed { id, path: filepath });
            return;
        }

        // Cancelled or purged while the engine was finishing; nobody will claim the file
        tracing::debug!(item_id = %id, path = %filepath.display(), "discarding file of cancelled item");
        if let Err(e) = tokio::fs::remove_file(&filepath).await {
            tracing::debug!(item_id = %id, error = %e, "failed to remove orphaned file");
        }
    }

    async fn finish_cancelled(&self, id: ItemId, reporter: &ProgressReporter) {
        // Normally cancel() already moved the item to `cancelled`, making this a no-op.
        // An engine that stops on its own still leaves a terminal, non-completed record.
        if self.store.set_error(id, "retrieval cancelled").await {
            tracing::warn!(item_id = %id, "engine reported cancellation without a cancel request");
            self.emit_event(Event::Failed {
                id,
                error: "retrieval cancelled".to_string(),
            });
        } else {
            tracing::debug!(item_id = %id, "retrieval stopped after cancel");
        }
        reporter.report(Stage::Error, 0, "Download cancelled");
    }

    async fn finish_failure(&self, id: ItemId, reason: String, reporter: &ProgressReporter) {
        if self.store.set_error(id, &reason).await {
            tracing::warn!(item_id = %id, error = %reason, "retrieval failed");
            reporter.report(Stage::Error, 0, format!("Error: {reason}"));
            self.emit_event(Event::Failed { id, error: reason });
        } else {
            tracing::debug!(item_id = %id, error = %reason, "ignoring failure of item no longer in flight");
        }
    }
}
