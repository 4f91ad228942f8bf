//! Progress relay between retrieval engines and observers
//!
//! Engines report through a [`ProgressReporter`], which never blocks: updates go
//! onto an unbounded per-item channel. A relay task drains that channel, keeps
//! the percentage monotonic, mirrors it into the [`ItemStore`] and hands it to
//! the optional [`ProgressSink`]. A missing sink just means updates are dropped.

use crate::store::ItemStore;
use crate::types::{ItemId, ProgressUpdate, Stage};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Observer of per-item progress
///
/// Called from the relay task, never from the retrieval path. Implementations
/// must not block; anything slow belongs behind a channel.
pub trait ProgressSink: Send + Sync {
    /// Deliver one update for `id`. Delivery is best-effort.
    fn deliver(&self, id: &ItemId, update: &ProgressUpdate);
}

/// Handle engines use to report progress for one item
#[derive(Clone, Debug)]
pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<ProgressUpdate>,
}

impl ProgressReporter {
    /// Create a reporter and the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue an update. Never blocks or fails; dropped if the relay is gone.
    pub fn report(&self, stage: Stage, percent: u8, message: impl Into<String>) {
        self.tx
            .send(ProgressUpdate::new(stage, percent, message))
            .ok();
    }
}

/// Parameters for spawning a relay task
pub(crate) struct RelayParams {
    /// Correlation id
    pub id: ItemId,
    /// Updates reported for this item
    pub rx: mpsc::UnboundedReceiver<ProgressUpdate>,
    /// Observer captured when the item's work started
    pub sink: Option<Arc<dyn ProgressSink>>,
    /// Store to mirror progress into
    pub store: Arc<ItemStore>,
}

/// Spawn the relay task for one item
///
/// The task ends once every [`ProgressReporter`] clone for the item is dropped
/// and the channel is drained.
pub(crate) fn spawn_relay(params: RelayParams) -> tokio::task::JoinHandle<()> {
    let RelayParams {
        id,
        mut rx,
        sink,
        store,
    } = params;

    tokio::spawn(async move {
        let mut floor: u8 = 0;

        while let Some(mut update) = rx.recv().await {
            update.percent = update.percent.min(100);
            if update.stage == Stage::Error {
                floor = 0;
            } else {
                update.percent = update.percent.max(floor);
                floor = update.percent;
            }

            if matches!(
                update.stage,
                Stage::Starting | Stage::Downloading | Stage::Processing
            ) {
                store
                    .record_progress(id, update.percent, &update.message)
                    .await;
            }

            if let Some(sink) = sink.as_ref() {
                sink.deliver(&id, &update);
            }
        }

        tracing::trace!(item_id = %id, "progress relay finished");
    })
}

/// Sink that fans updates out on a broadcast channel
///
/// Used by the HTTP layer: each SSE subscriber filters the stream by item id.
/// Updates sent while nobody is subscribed are dropped.
pub struct BroadcastProgressSink {
    tx: broadcast::Sender<(ItemId, ProgressUpdate)>,
}

impl BroadcastProgressSink {
    /// Create a sink with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Receive every update delivered from now on
    pub fn subscribe(&self) -> broadcast::Receiver<(ItemId, ProgressUpdate)> {
        self.tx.subscribe()
    }
}

impl ProgressSink for BroadcastProgressSink {
    fn deliver(&self, id: &ItemId, update: &ProgressUpdate) {
        self.tx.send((*id, update.clone())).ok();
    }
}
