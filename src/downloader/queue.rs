//! Enqueueing and item queries.

use crate::error::{Error, Result};
use crate::types::{DownloadRequest, Event, ItemId, QueueCounts, QueueItem};
use crate::utils::validate_url;

use super::BatchDownloader;

/// Output format used for audio-only requests that name none
const AUDIO_FORMAT: &str = "mp3";

impl BatchDownloader {
    /// Add one request to the queue as a `pending` item
    ///
    /// The URL is validated before anything is stored. A missing output format
    /// defaults to `mp3` for audio-only requests and to
    /// `queue.default_output_format` otherwise.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if the URL is not an http(s) URL
    /// - [`Error::ShuttingDown`] after [`shutdown`](Self::shutdown)
    pub async fn enqueue(&self, request: DownloadRequest) -> Result<ItemId> {
        self.ensure_accepting()?;
        validate_url(&request.url)?;
        Ok(self.insert(request).await)
    }

    /// Add several requests; either all are queued or none are
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for an empty list or if any URL is invalid (the
    /// message names its position), [`Error::ShuttingDown`] after shutdown.
    pub async fn enqueue_batch(&self, requests: Vec<DownloadRequest>) -> Result<Vec<ItemId>> {
        self.ensure_accepting()?;
        if requests.is_empty() {
            return Err(Error::Validation("batch must contain at least one request".to_string()));
        }
        for (index, request) in requests.iter().enumerate() {
            validate_url(&request.url).map_err(|e| match e {
                Error::Validation(msg) => Error::Validation(format!("request {index}: {msg}")),
                other => other,
            })?;
        }

        let mut ids = Vec::with_capacity(requests.len());
        for request in requests {
            ids.push(self.insert(request).await);
        }
        tracing::info!(count = ids.len(), "batch enqueued");
        Ok(ids)
    }

    async fn insert(&self, mut request: DownloadRequest) -> ItemId {
        request.url = request.url.trim().to_string();
        let output_format = self.resolve_output_format(&request);
        let url = request.url.clone();
        let id = self.store.create(request, output_format).await;

        tracing::info!(item_id = %id, url = %url, "item queued");
        self.emit_event(Event::Queued { id, url });
        id
    }

    fn resolve_output_format(&self, request: &DownloadRequest) -> String {
        match request.output_format.as_deref().map(str::trim) {
            Some(format) if !format.is_empty() => format.to_lowercase(),
            _ if request.audio_only => AUDIO_FORMAT.to_string(),
            _ => self.config.queue.default_output_format.clone(),
        }
    }

    /// Snapshot of one item
    ///
    /// # Errors
    ///
    /// Returns a not-found error for unknown ids.
    pub async fn get_status(&self, id: ItemId) -> Result<QueueItem> {
        self.store
            .get(id)
            .await
            .ok_or_else(|| Error::item_not_found(id))
    }

    /// Snapshot of every item, in insertion order
    pub async fn list_all(&self) -> Vec<QueueItem> {
        self.store.list().await
    }

    /// Per-status counts over one snapshot
    pub async fn aggregate_counts(&self) -> QueueCounts {
        self.store.counts().await
    }

    /// Record that an item's file was handed to a consumer
    ///
    /// # Errors
    ///
    /// Returns a not-found error for unknown ids.
    pub async fn mark_downloaded(&self, id: ItemId) -> Result<()> {
        if self.store.mark_downloaded(id).await {
            Ok(())
        } else {
            Err(Error::item_not_found(id))
        }
    }
}
