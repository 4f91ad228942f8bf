//! Wait helpers and assertions for integration tests

use batch_dl::{BatchDownloader, Event, ItemId, Status};
use std::path::PathBuf;
use std::time::Duration;

/// Result of waiting for an item to finish
#[derive(Debug, PartialEq)]
pub enum WaitResult {
    /// Completed with this file
    Completed(PathBuf),
    /// Failed with this error
    Failed(String),
    /// Cancelled
    Cancelled,
    /// Event channel closed
    ChannelClosed,
    /// Timed out
    Timeout,
}

/// Wait for an item to reach a terminal state
///
/// Subscribes first, then checks the stored status, so an item that finished
/// before the call is still reported.
pub async fn wait_for_completion(
    downloader: &BatchDownloader,
    id: ItemId,
    timeout: Duration,
) -> WaitResult {
    let mut events = downloader.subscribe();

    if let Ok(item) = downloader.get_status(id).await {
        match item.status {
            Status::Completed => {
                return WaitResult::Completed(item.filepath.unwrap_or_default());
            }
            Status::Failed => return WaitResult::Failed(item.error.unwrap_or_default()),
            Status::Cancelled => return WaitResult::Cancelled,
            _ => {}
        }
    }

    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(Event::Completed { id: event_id, path }) if event_id == id => {
                    return WaitResult::Completed(path);
                }
                Ok(Event::Failed { id: event_id, error }) if event_id == id => {
                    return WaitResult::Failed(error);
                }
                Ok(Event::Cancelled { id: event_id }) if event_id == id => {
                    return WaitResult::Cancelled;
                }
                Ok(_) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(_) => return WaitResult::ChannelClosed,
            }
        }
    })
    .await;

    result.unwrap_or(WaitResult::Timeout)
}

/// Wait until the item is `downloading`
pub async fn wait_for_downloading(downloader: &BatchDownloader, id: ItemId, timeout: Duration) {
    tokio::time::timeout(timeout, async {
        loop {
            if downloader.get_status(id).await.map(|i| i.status).ok() == Some(Status::Downloading) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("item {id} never started downloading"));
}

/// Assert the stored status of an item
pub async fn assert_item_status(downloader: &BatchDownloader, id: ItemId, expected: Status) {
    let item = downloader.get_status(id).await.unwrap();
    assert_eq!(
        item.status, expected,
        "item {id}: expected {expected}, got {} ({:?})",
        item.status, item.error
    );
}
