//! Dispatcher: admits pending items through the concurrency limiter and spawns their work.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio_util::sync::CancellationToken;

use super::BatchDownloader;
use super::download_task::{DownloadTaskContext, spawn_download_task};
use crate::error::{Error, Result};
use crate::types::{Event, ItemId, StartSummary, Status};

/// Counts a running dispatch pass for as long as it lives
struct DispatchGuard(Arc<AtomicUsize>);

impl DispatchGuard {
    fn enter(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl BatchDownloader {
    /// Dispatch every item that is `pending` right now
    ///
    /// Returns as soon as the dispatch pass is spawned. The pass walks the
    /// snapshot in insertion order and, for each item:
    /// 1. Skips it if it is no longer `pending` (cancelled or paused meanwhile)
    /// 2. Acquires a permit from the concurrency limiter (blocks while
    ///    `max_concurrent_downloads` items are in flight)
    /// 3. Atomically claims it (`pending -> downloading`) with a fresh cancellation token
    /// 4. Spawns its download task, which holds the permit until the item is terminal
    ///
    /// Calling `start()` again while a pass is draining is safe: the claim step
    /// lets exactly one pass take each item.
    ///
    /// # Errors
    ///
    /// - [`Error::NoEligibleWork`] if nothing is `pending`
    /// - [`Error::ShuttingDown`] after [`shutdown`](Self::shutdown)
    pub async fn start(&self) -> Result<StartSummary> {
        self.ensure_accepting()?;

        let pending = self.store.ids_with_status(Status::Pending).await;
        if pending.is_empty() {
            return Err(Error::NoEligibleWork);
        }

        let scheduled = pending.len();
        tracing::info!(scheduled, "starting dispatch pass");
        self.emit_event(Event::BatchStarted { scheduled });
        self.spawn_dispatcher(pending);

        Ok(StartSummary { scheduled })
    }

    fn spawn_dispatcher(&self, ids: Vec<ItemId>) -> tokio::task::JoinHandle<()> {
        let guard = DispatchGuard::enter(self.queue_state.active_dispatchers.clone());
        let concurrent_limit = self.queue_state.concurrent_limit.clone();
        let downloader = self.clone();

        tokio::spawn(async move {
            let _guard = guard;

            for id in ids {
                // Don't hold a slot hostage for an item that can no longer run
                match downloader.store.get(id).await {
                    Some(item) if item.status == Status::Pending => {}
                    Some(item) => {
                        tracing::debug!(item_id = %id, status = %item.status, "skipping ineligible item");
                        continue;
                    }
                    None => {
                        tracing::debug!(item_id = %id, "skipping purged item");
                        continue;
                    }
                }

                // Acquire a permit from the semaphore (blocks if at max concurrent downloads)
                let permit = match concurrent_limit.clone().acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => {
                        tracing::debug!("concurrency limiter closed, ending dispatch pass");
                        break;
                    }
                };

                if !downloader.is_accepting() {
                    tracing::debug!("shutdown in progress, ending dispatch pass");
                    break;
                }

                // Re-check under the store lock; the item may have changed while we waited
                let cancel_token = CancellationToken::new();
                let Some(item) = downloader.store.claim(id, cancel_token.clone()).await else {
                    tracing::debug!(item_id = %id, "item no longer pending at admission");
                    continue;
                };

                tracing::debug!(item_id = %id, "item admitted");
                downloader.emit_event(Event::Started { id });

                spawn_download_task(DownloadTaskContext {
                    item,
                    permit,
                    cancel_token,
                    downloader: downloader.clone(),
                });
            }
        })
    }

    /// Number of dispatch passes still admitting items
    pub(crate) fn active_dispatchers(&self) -> usize {
        self.queue_state.active_dispatchers.load(Ordering::SeqCst)
    }

    /// Number of limiter slots currently held by in-flight items
    pub fn slots_in_use(&self) -> usize {
        self.config
            .queue
            .max_concurrent_downloads
            .saturating_sub(self.queue_state.concurrent_limit.available_permits())
    }
}
