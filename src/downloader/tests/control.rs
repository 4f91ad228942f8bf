use super::*;
use crate::types::Event;

#[tokio::test]
async fn test_pause_pending_then_resume() {
    let (downloader, engine, _temp_dir) = create_test_downloader();
    let id = downloader.enqueue(req(0)).await.unwrap();

    downloader.pause(id).await.unwrap();
    assert_eq!(downloader.get_status(id).await.unwrap().status, Status::Paused);
    assert!(matches!(downloader.start().await, Err(Error::NoEligibleWork)));
    assert_eq!(engine.calls(), 0, "paused item must not run");

    downloader.resume(id).await.unwrap();
    assert_eq!(downloader.get_status(id).await.unwrap().status, Status::Pending);

    assert_eq!(downloader.start().await.unwrap().scheduled, 1);
    wait_idle(&downloader).await;
    assert_eq!(
        downloader.get_status(id).await.unwrap().status,
        Status::Completed
    );
}

#[tokio::test]
async fn test_pause_and_resume_are_idempotent() {
    let (downloader, _engine, _temp_dir) = create_test_downloader();
    let id = downloader.enqueue(req(0)).await.unwrap();

    // resume on a pending item leaves it pending
    downloader.resume(id).await.unwrap();
    assert_eq!(downloader.get_status(id).await.unwrap().status, Status::Pending);

    downloader.pause(id).await.unwrap();
    downloader.pause(id).await.unwrap();
    assert_eq!(downloader.get_status(id).await.unwrap().status, Status::Paused);
}

#[tokio::test]
async fn test_pause_of_in_flight_item_is_a_no_op() {
    let (downloader, engine, _temp_dir) = create_downloader_with(1, MockBehavior::Gated);
    let id = downloader.enqueue(req(0)).await.unwrap();
    downloader.start().await.unwrap();
    wait_for_running(&engine, 1).await;

    downloader.pause(id).await.unwrap();
    assert_eq!(
        downloader.get_status(id).await.unwrap().status,
        Status::Downloading
    );

    engine.release(1);
    wait_idle(&downloader).await;
    assert_eq!(
        downloader.get_status(id).await.unwrap().status,
        Status::Completed
    );
}

#[tokio::test]
async fn test_cancel_pending_item() {
    let (downloader, engine, _temp_dir) = create_test_downloader();
    let id = downloader.enqueue(req(0)).await.unwrap();

    downloader.cancel(id).await.unwrap();
    let item = downloader.get_status(id).await.unwrap();
    assert_eq!(item.status, Status::Cancelled);
    let completed_at = item.completed_at.expect("cancel stamps completed_at");

    // Second cancel is a no-op
    downloader.cancel(id).await.unwrap();
    let again = downloader.get_status(id).await.unwrap();
    assert_eq!(again.status, Status::Cancelled);
    assert_eq!(again.completed_at, Some(completed_at));

    assert!(matches!(downloader.start().await, Err(Error::NoEligibleWork)));
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn test_cancel_paused_item() {
    let (downloader, _engine, _temp_dir) = create_test_downloader();
    let id = downloader.enqueue(req(0)).await.unwrap();
    downloader.pause(id).await.unwrap();

    downloader.cancel(id).await.unwrap();
    assert_eq!(
        downloader.get_status(id).await.unwrap().status,
        Status::Cancelled
    );
    downloader.resume(id).await.unwrap();
    assert_eq!(
        downloader.get_status(id).await.unwrap().status,
        Status::Cancelled,
        "resume must not revive a cancelled item"
    );
}

#[tokio::test]
async fn test_cancel_downloading_item_releases_slot() {
    let (downloader, engine, _temp_dir) = create_downloader_with(2, MockBehavior::Hang);
    let ids = enqueue_n(&downloader, 2).await;
    downloader.start().await.unwrap();
    wait_for_running(&engine, 2).await;

    downloader.cancel(ids[0]).await.unwrap();
    let item = downloader.get_status(ids[0]).await.unwrap();
    assert_eq!(item.status, Status::Cancelled);
    assert!(item.filepath.is_none() && item.error.is_none());
    wait_for_running(&engine, 1).await;

    downloader.cancel(ids[1]).await.unwrap();
    wait_idle(&downloader).await;
    assert_eq!(downloader.slots_in_use(), 0);

    // All K slots are free again: K fresh items can be admitted at once
    for id in enqueue_n(&downloader, 2).await {
        engine.script(&downloader.get_status(id).await.unwrap().url, MockBehavior::Gated);
    }
    downloader.start().await.unwrap();
    wait_for_running(&engine, 2).await;
    assert_eq!(downloader.aggregate_counts().await.downloading, 2);

    engine.release(2);
    wait_idle(&downloader).await;
    // The cancelled items stay cancelled, the new ones completed
    let counts = downloader.aggregate_counts().await;
    assert_eq!(counts.cancelled, 2);
    assert_eq!(counts.completed, 2);
}

#[tokio::test]
async fn test_cancelled_item_never_gains_a_file() {
    let (downloader, engine, _temp_dir) = create_downloader_with(1, MockBehavior::Gated);
    let id = downloader.enqueue(req(0)).await.unwrap();
    downloader.start().await.unwrap();
    wait_for_running(&engine, 1).await;

    downloader.cancel(id).await.unwrap();
    wait_idle(&downloader).await;

    let item = downloader.get_status(id).await.unwrap();
    assert_eq!(item.status, Status::Cancelled);
    assert!(item.filepath.is_none(), "cancelled item never gains a file");
}

#[tokio::test]
async fn test_purge_terminal_scenario() {
    let (downloader, engine, _temp_dir) = create_test_downloader();
    let ids = enqueue_n(&downloader, 2).await;
    engine.script(&req(1).url, MockBehavior::Fail("HTTP Error 404".into()));

    downloader.start().await.unwrap();
    wait_idle(&downloader).await;

    let ok = downloader.get_status(ids[0]).await.unwrap();
    assert_eq!(ok.status, Status::Completed);
    assert!(ok.filepath.is_some());
    let bad = downloader.get_status(ids[1]).await.unwrap();
    assert_eq!(bad.status, Status::Failed);
    assert!(bad.error.is_some());

    let mut events = downloader.subscribe();
    assert_eq!(downloader.purge_terminal().await, 2);
    assert!(downloader.list_all().await.is_empty());

    let mut removed = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let Event::Removed { id } = event {
            removed.push(id);
        }
    }
    assert_eq!(removed, ids);
}

#[tokio::test]
async fn test_purge_terminal_keeps_live_items() {
    let (downloader, _engine, _temp_dir) = create_test_downloader();
    let ids = enqueue_n(&downloader, 3).await;
    downloader.cancel(ids[0]).await.unwrap();
    downloader.pause(ids[1]).await.unwrap();

    assert_eq!(downloader.purge_terminal().await, 1);
    let remaining: Vec<ItemId> = downloader.list_all().await.iter().map(|i| i.id).collect();
    assert_eq!(remaining, vec![ids[1], ids[2]]);
}

#[tokio::test]
async fn test_purge_all_cancels_in_flight_work() {
    let (downloader, engine, _temp_dir) = create_downloader_with(2, MockBehavior::Hang);
    let ids = enqueue_n(&downloader, 3).await;
    downloader.start().await.unwrap();
    wait_for_running(&engine, 2).await;

    let mut events = downloader.subscribe();
    assert_eq!(downloader.purge_all().await, 3);
    assert!(downloader.list_all().await.is_empty());
    assert_eq!(downloader.aggregate_counts().await.total, 0);

    wait_idle(&downloader).await;
    assert_eq!(engine.running(), 0, "hung retrievals observed the cancel");
    assert_eq!(engine.calls(), 2, "third item was purged before admission");

    // Running items are reported cancelled, the pending one only through the clear
    let received: Vec<Event> = std::iter::from_fn(|| events.try_recv().ok()).collect();
    let cancelled: Vec<ItemId> = received
        .iter()
        .filter_map(|e| match e {
            Event::Cancelled { id } => Some(*id),
            _ => None,
        })
        .collect();
    assert_eq!(cancelled, vec![ids[0], ids[1]]);
    assert!(matches!(received.last(), Some(Event::QueueCleared)));
}

#[tokio::test]
async fn test_control_events() {
    let (downloader, _engine, _temp_dir) = create_test_downloader();
    let id = downloader.enqueue(req(0)).await.unwrap();
    let mut events = downloader.subscribe();

    downloader.pause(id).await.unwrap();
    downloader.pause(id).await.unwrap(); // no-op, no event
    downloader.resume(id).await.unwrap();
    downloader.cancel(id).await.unwrap();
    downloader.cancel(id).await.unwrap(); // no-op, no event

    let kinds: Vec<&str> = std::iter::from_fn(|| events.try_recv().ok())
        .map(|e| e.kind())
        .collect();
    assert_eq!(kinds, vec!["paused", "resumed", "cancelled"]);
}
