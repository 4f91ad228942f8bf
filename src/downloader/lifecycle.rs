//! Shutdown coordination and idle waiting.

use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::error::Result;
use crate::types::Event;

use super::BatchDownloader;

/// Poll interval while waiting for in-flight work to finish
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(20);

impl BatchDownloader {
    /// Gracefully shut down the downloader
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting `enqueue`/`start` (they return [`Error::ShuttingDown`](crate::Error::ShuttingDown))
    /// 2. Cancels every in-flight item
    /// 3. Waits, bounded by `queue.shutdown_timeout`, for every limiter slot to come back
    /// 4. Closes the limiter so draining dispatch passes stop
    /// 5. Emits [`Event::Shutdown`]
    ///
    /// Pending and paused items stay in the store untouched.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        // 1. Stop accepting new work
        self.queue_state.accepting_new.store(false, Ordering::SeqCst);

        // 2. Cancel in-flight items
        let cancelled = self.store.cancel_all_active().await;
        for id in &cancelled {
            tracing::debug!(item_id = %id, "cancelled for shutdown");
            self.emit_event(Event::Cancelled { id: *id });
        }
        tracing::info!(count = cancelled.len(), "Signalled cancellation to active items");

        // 3. Wait for their slots to be released
        let shutdown_timeout = self.config.queue.shutdown_timeout;
        match tokio::time::timeout(shutdown_timeout, self.wait_for_slots()).await {
            Ok(()) => tracing::info!("All active items wound down"),
            Err(_) => tracing::warn!(
                timeout_secs = shutdown_timeout.as_secs(),
                in_use = self.slots_in_use(),
                "Timeout waiting for active items, proceeding with shutdown"
            ),
        }

        // 4. Stop any dispatch pass still waiting for a slot
        self.queue_state.concurrent_limit.close();

        // 5. Emit shutdown event
        self.emit_event(Event::Shutdown);

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Resolve once no dispatch pass is running and every limiter slot is free
    ///
    /// Items left `pending` (e.g. enqueued after the last `start()`) do not
    /// keep this waiting.
    pub async fn wait_for_idle(&self) {
        while !self.is_idle() {
            tokio::time::sleep(IDLE_POLL_INTERVAL).await;
        }
    }

    /// Whether no dispatch pass is running and every limiter slot is free
    pub fn is_idle(&self) -> bool {
        self.active_dispatchers() == 0 && self.slots_in_use() == 0
    }

    async fn wait_for_slots(&self) {
        loop {
            let in_use = self.slots_in_use();
            if in_use == 0 {
                return;
            }
            tracing::debug!(in_use, "Waiting for active items to complete");
            tokio::time::sleep(IDLE_POLL_INTERVAL).await;
        }
    }
}
