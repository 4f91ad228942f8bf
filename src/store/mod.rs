//! In-memory item store and lifecycle enforcement
//!
//! [`ItemStore`] is the single source of truth for every queued item. Each
//! operation takes the store lock once, applies its check-and-set against the
//! [`Status`] state machine, and releases the lock before returning, so readers
//! never observe a half-applied record (e.g. `completed` without a file path).
//!
//! The store never awaits anything while holding its lock. Retrieval work runs
//! outside it and only touches the store briefly to report state changes.

use crate::types::{DownloadRequest, ItemId, QueueCounts, QueueItem, Status};
use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;


/// Outcome of a cancel request against an existing item
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CancelOutcome {
    /// Item moved to `cancelled`; `was_running` is true if an in-flight handle was signalled
    Cancelled {
        /// Whether the item was `downloading` when cancelled
        was_running: bool,
    },
    /// Item was already terminal, nothing changed
    AlreadyTerminal,
}

/// Stored record: the public snapshot plus bookkeeping that never leaves the store
struct Entry {
    /// Insertion sequence, used for stable listing order
    seq: u64,
    item: QueueItem,
    /// Cancellation handle of the in-flight work unit (present iff `downloading`)
    cancel_token: Option<CancellationToken>,
}

impl Entry {
    /// Move to `next`, stamping timestamps. Caller has checked legality.
    fn enter(&mut self, next: Status) {
        let now = Utc::now();
        if next == Status::Downloading && self.item.started_at.is_none() {
            self.item.started_at = Some(now);
        }
        if next.is_terminal() {
            if self.item.completed_at.is_none() {
                self.item.completed_at = Some(now);
            }
            // Terminal items never hold a work handle
            self.cancel_token = None;
        }
        self.item.status = next;
    }
}

#[derive(Default)]
struct StoreInner {
    items: HashMap<ItemId, Entry>,
    next_seq: u64,
}

impl StoreInner {
    fn sorted(&self) -> Vec<&Entry> {
        let mut entries: Vec<&Entry> = self.items.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries
    }
}

/// Canonical item records, shared between submission, dispatch and control paths
#[derive(Default)]
pub struct ItemStore {
    inner: RwLock<StoreInner>,
}

impl ItemStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an identifier and store a new `pending` item
    ///
    /// `output_format` is the resolved format; defaulting happens in the caller.
    pub async fn create(&self, request: DownloadRequest, output_format: String) -> ItemId {
        let id = ItemId::new();
        let mut inner = self.inner.write().await;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.items.insert(
            id,
            Entry {
                seq,
                item: QueueItem::new(id, request, output_format),
                cancel_token: None,
            },
        );
        id
    }

    /// Snapshot of one item
    pub async fn get(&self, id: ItemId) -> Option<QueueItem> {
        self.inner
            .read()
            .await
            .items
            .get(&id)
            .map(|e| e.item.clone())
    }

    /// Snapshot of every item, in insertion order
    pub async fn list(&self) -> Vec<QueueItem> {
        self.inner
            .read()
            .await
            .sorted()
            .into_iter()
            .map(|e| e.item.clone())
            .collect()
    }

    /// Identifiers of items currently in `status`, in insertion order
    pub async fn ids_with_status(&self, status: Status) -> Vec<ItemId> {
        self.inner
            .read()
            .await
            .sorted()
            .into_iter()
            .filter(|e| e.item.status == status)
            .map(|e| e.item.id)
            .collect()
    }

    /// Per-status counts over a single snapshot
    pub async fn counts(&self) -> QueueCounts {
        let inner = self.inner.read().await;
        let mut counts = QueueCounts::default();
        for entry in inner.items.values() {
            counts.record(entry.item.status);
        }
        counts
    }

    /// Number of items currently `downloading`
    pub async fn downloading_count(&self) -> usize {
        self.inner
            .read()
            .await
            .items
            .values()
            .filter(|e| e.item.status == Status::Downloading)
            .count()
    }

    /// Set status, progress and message in one step
    ///
    /// Returns `false` without touching the record when the id is unknown or the
    /// transition is illegal. `completed` and `failed` are only reachable through
    /// [`set_filepath`](Self::set_filepath) and [`set_error`](Self::set_error),
    /// which write the accompanying field in the same step.
    pub async fn update(&self, id: ItemId, status: Status, progress: u8, message: &str) -> bool {
        if matches!(status, Status::Completed | Status::Failed) {
            tracing::debug!(item_id = %id, %status, "update cannot enter a result state");
            return false;
        }

        let mut inner = self.inner.write().await;
        let Some(entry) = inner.items.get_mut(&id) else {
            return false;
        };
        if !entry.item.status.can_transition_to(status) {
            tracing::debug!(
                item_id = %id,
                from = %entry.item.status,
                to = %status,
                "ignoring illegal status update"
            );
            return false;
        }

        if status == Status::Cancelled
            && let Some(token) = entry.cancel_token.as_ref()
        {
            token.cancel();
        }
        entry.enter(status);
        entry.item.progress = progress.min(100);
        entry.item.message = message.to_string();
        true
    }

    /// Mirror engine progress onto a `downloading` item
    ///
    /// Progress never goes backwards. Ignored for any other status.
    pub(crate) async fn record_progress(&self, id: ItemId, percent: u8, message: &str) -> bool {
        let mut inner = self.inner.write().await;
        match inner.items.get_mut(&id) {
            Some(entry) if entry.item.status == Status::Downloading => {
                entry.item.progress = entry.item.progress.max(percent.min(100));
                entry.item.message = message.to_string();
                true
            }
            _ => false,
        }
    }

    /// Record the finished file and complete the item
    ///
    /// Only a `downloading` item can complete. Returns `false` if the item is
    /// unknown or was cancelled/purged while the retrieval ran.
    pub async fn set_filepath(&self, id: ItemId, path: PathBuf, title: Option<String>) -> bool {
        let mut inner = self.inner.write().await;
        let Some(entry) = inner.items.get_mut(&id) else {
            return false;
        };
        if entry.item.status != Status::Downloading {
            return false;
        }
        entry.item.filepath = Some(path);
        entry.item.title = title;
        entry.item.progress = 100;
        entry.item.message = "Download complete".to_string();
        entry.enter(Status::Completed);
        true
    }

    /// Record a failure reason and force the item to `failed`
    ///
    /// Applies from any non-terminal status. Returns `false` for unknown or
    /// already-terminal items, leaving them untouched.
    pub async fn set_error(&self, id: ItemId, message: &str) -> bool {
        let mut inner = self.inner.write().await;
        let Some(entry) = inner.items.get_mut(&id) else {
            return false;
        };
        if entry.item.status.is_terminal() {
            return false;
        }
        entry.item.error = Some(message.to_string());
        entry.item.message = message.to_string();
        entry.item.progress = 0;
        entry.enter(Status::Failed);
        true
    }

    /// Set the sticky `downloaded` flag. Returns `false` for unknown ids.
    pub async fn mark_downloaded(&self, id: ItemId) -> bool {
        let mut inner = self.inner.write().await;
        match inner.items.get_mut(&id) {
            Some(entry) => {
                entry.item.downloaded = true;
                true
            }
            None => false,
        }
    }

    /// Atomically claim a `pending` item for execution
    ///
    /// Moves it to `downloading` and installs its cancellation handle under the
    /// same lock, so a concurrent cancel either sees `pending` (and the claim
    /// fails) or sees the handle (and signals it).
    pub(crate) async fn claim(&self, id: ItemId, token: CancellationToken) -> Option<QueueItem> {
        let mut inner = self.inner.write().await;
        let entry = inner.items.get_mut(&id)?;
        if entry.item.status != Status::Pending {
            return None;
        }
        entry.enter(Status::Downloading);
        entry.item.progress = 0;
        entry.item.message = "Starting download".to_string();
        entry.cancel_token = Some(token);
        Some(entry.item.clone())
    }

    /// Cancel an item, signalling its in-flight handle if it has one
    pub(crate) async fn cancel(&self, id: ItemId) -> Option<CancelOutcome> {
        let mut inner = self.inner.write().await;
        let entry = inner.items.get_mut(&id)?;
        if entry.item.status.is_terminal() {
            return Some(CancelOutcome::AlreadyTerminal);
        }

        let was_running = entry.item.status == Status::Downloading;
        if let Some(token) = entry.cancel_token.take() {
            token.cancel();
        }
        entry.item.message = "Cancelled".to_string();
        entry.enter(Status::Cancelled);
        Some(CancelOutcome::Cancelled { was_running })
    }

    /// `pending -> paused`. `None` if unknown, `Some(false)` if not pending.
    pub(crate) async fn pause(&self, id: ItemId) -> Option<bool> {
        self.flip(id, Status::Pending, Status::Paused).await
    }

    /// `paused -> pending`. `None` if unknown, `Some(false)` if not paused.
    pub(crate) async fn resume(&self, id: ItemId) -> Option<bool> {
        self.flip(id, Status::Paused, Status::Pending).await
    }

    async fn flip(&self, id: ItemId, from: Status, to: Status) -> Option<bool> {
        let mut inner = self.inner.write().await;
        let entry = inner.items.get_mut(&id)?;
        if entry.item.status != from {
            return Some(false);
        }
        entry.enter(to);
        Some(true)
    }

    /// Cancel every `downloading` item and return their ids
    pub(crate) async fn cancel_all_active(&self) -> Vec<ItemId> {
        let mut inner = self.inner.write().await;
        let mut cancelled = Vec::new();
        for entry in inner.items.values_mut() {
            if entry.item.status != Status::Downloading {
                continue;
            }
            if let Some(token) = entry.cancel_token.take() {
                token.cancel();
            }
            entry.item.message = "Cancelled".to_string();
            entry.enter(Status::Cancelled);
            cancelled.push((entry.seq, entry.item.id));
        }
        cancelled.sort_unstable_by_key(|(seq, _)| *seq);
        cancelled.into_iter().map(|(_, id)| id).collect()
    }

    /// Delete the given records unconditionally, returning how many existed
    pub async fn remove(&self, ids: &[ItemId]) -> usize {
        let mut inner = self.inner.write().await;
        let mut removed = 0;
        for id in ids {
            if let Some(entry) = inner.items.remove(id) {
                if let Some(token) = entry.cancel_token {
                    token.cancel();
                }
                removed += 1;
            }
        }
        removed
    }

    /// Delete every terminal record, returning the removed ids
    pub(crate) async fn remove_terminal(&self) -> Vec<ItemId> {
        let mut inner = self.inner.write().await;
        let ids: Vec<ItemId> = inner
            .sorted()
            .into_iter()
            .filter(|e| e.item.status.is_terminal())
            .map(|e| e.item.id)
            .collect();
        for id in &ids {
            inner.items.remove(id);
        }
        ids
    }

    /// Signal every in-flight handle, then drop every record
    ///
    /// Returns how many records were dropped and the ids of those that were
    /// `downloading`, in insertion order.
    pub(crate) async fn clear(&self) -> (usize, Vec<ItemId>) {
        let mut inner = self.inner.write().await;
        let running: Vec<ItemId> = inner
            .sorted()
            .into_iter()
            .filter(|e| e.item.status == Status::Downloading)
            .map(|e| e.item.id)
            .collect();
        for entry in inner.items.values() {
            if let Some(token) = entry.cancel_token.as_ref() {
                token.cancel();
            }
        }
        let count = inner.items.len();
        inner.items.clear();
        (count, running)
    }
}
