//! Item control: cancel, pause, resume and purge.

use crate::error::{Error, Result};
use crate::store::CancelOutcome;
use crate::types::{Event, ItemId};

use super::BatchDownloader;

impl BatchDownloader {
    /// Cancel an item
    ///
    /// A `downloading` item has its cancellation token signalled; the engine is
    /// expected to stop promptly, after which its limiter slot is released.
    /// In every non-terminal case the item is `cancelled` on return. Cancelling
    /// a terminal item is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for unknown ids.
    pub async fn cancel(&self, id: ItemId) -> Result<()> {
        match self.store.cancel(id).await {
            None => Err(Error::item_not_found(id)),
            Some(CancelOutcome::Cancelled { was_running }) => {
                tracing::info!(item_id = %id, was_running, "item cancelled");
                self.emit_event(Event::Cancelled { id });
                Ok(())
            }
            Some(CancelOutcome::AlreadyTerminal) => {
                tracing::debug!(item_id = %id, "cancel ignored, item already terminal");
                Ok(())
            }
        }
    }

    /// Hold a `pending` item back from dispatch
    ///
    /// Only `pending` items can be paused; in-flight work cannot be suspended.
    /// Any other status is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for unknown ids.
    pub async fn pause(&self, id: ItemId) -> Result<()> {
        match self.store.pause(id).await {
            None => Err(Error::item_not_found(id)),
            Some(true) => {
                tracing::info!(item_id = %id, "item paused");
                self.emit_event(Event::Paused { id });
                Ok(())
            }
            Some(false) => {
                tracing::debug!(item_id = %id, "pause ignored, item not pending");
                Ok(())
            }
        }
    }

    /// Return a `paused` item to `pending`; it runs on the next [`start`](Self::start)
    ///
    /// # Errors
    ///
    /// Returns a not-found error for unknown ids.
    pub async fn resume(&self, id: ItemId) -> Result<()> {
        match self.store.resume(id).await {
            None => Err(Error::item_not_found(id)),
            Some(true) => {
                tracing::info!(item_id = %id, "item resumed");
                self.emit_event(Event::Resumed { id });
                Ok(())
            }
            Some(false) => {
                tracing::debug!(item_id = %id, "resume ignored, item not paused");
                Ok(())
            }
        }
    }

    /// Remove every `completed`, `failed` and `cancelled` item
    ///
    /// Returns the number of items removed.
    pub async fn purge_terminal(&self) -> usize {
        let removed = self.store.remove_terminal().await;
        for id in &removed {
            self.emit_event(Event::Removed { id: *id });
        }
        tracing::info!(count = removed.len(), "terminal items purged");
        removed.len()
    }

    /// Cancel all in-flight work and drop every item
    ///
    /// Emits [`Event::Cancelled`] for each item that was `downloading`, then
    /// [`Event::QueueCleared`]. Returns the number of items removed.
    pub async fn purge_all(&self) -> usize {
        let (count, cancelled) = self.store.clear().await;
        for id in cancelled {
            tracing::debug!(item_id = %id, "cancelled by queue clear");
            self.emit_event(Event::Cancelled { id });
        }
        tracing::info!(count, "queue cleared");
        self.emit_event(Event::QueueCleared);
        count
    }
}
