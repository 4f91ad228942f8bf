//! End-to-end tests against the real yt-dlp binary
//!
//! These tests need `yt-dlp` on PATH and network access.
//! All tests are marked #[ignore] to prevent running in normal CI.
//!
//! # Running the tests
//!
//! ```bash
//! cargo test --test e2e_live -- --ignored --nocapture
//! ```

mod common;

use batch_dl::{BatchDownloader, Config, DownloadRequest, Status};
use common::{WaitResult, wait_for_completion, wait_for_downloading};
use std::time::Duration;

/// Short, long-lived public test video
const TEST_VIDEO_URL: &str = "https://www.youtube.com/watch?v=jNQXAC9IVRw";

async fn create_live_downloader() -> Option<(BatchDownloader, tempfile::TempDir)> {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.engine.temp_dir = temp_dir.path().to_path_buf();

    match BatchDownloader::with_ytdlp(config).await {
        Ok(downloader) => Some((downloader, temp_dir)),
        Err(e) => {
            eprintln!("Skipping live test: {e}");
            None
        }
    }
}

#[tokio::test]
#[ignore]
async fn test_live_download_audio() {
    let Some((downloader, _temp_dir)) = create_live_downloader().await else {
        return;
    };

    let id = downloader
        .enqueue(DownloadRequest::new(TEST_VIDEO_URL).audio_only())
        .await
        .unwrap();
    downloader.start().await.unwrap();

    match wait_for_completion(&downloader, id, Duration::from_secs(180)).await {
        WaitResult::Completed(path) => {
            assert!(path.exists(), "{} should exist", path.display());
            let item = downloader.get_status(id).await.unwrap();
            assert_eq!(item.status, Status::Completed);
            assert!(item.title.is_some());
        }
        other => panic!("live download did not complete: {other:?}"),
    }
}

#[tokio::test]
#[ignore]
async fn test_live_cancel_kills_process() {
    let Some((downloader, temp_dir)) = create_live_downloader().await else {
        return;
    };

    let id = downloader
        .enqueue(DownloadRequest::new(TEST_VIDEO_URL).with_quality("1080p"))
        .await
        .unwrap();
    downloader.start().await.unwrap();
    wait_for_downloading(&downloader, id, Duration::from_secs(30)).await;

    downloader.cancel(id).await.unwrap();
    tokio::time::timeout(Duration::from_secs(30), downloader.wait_for_idle())
        .await
        .expect("cancelled retrieval should release its slot");

    assert_eq!(downloader.get_status(id).await.unwrap().status, Status::Cancelled);
    let leftovers = std::fs::read_dir(temp_dir.path()).unwrap().count();
    assert_eq!(leftovers, 0, "partial files should be cleaned up");
}

#[tokio::test]
#[ignore]
async fn test_live_media_info() {
    let Some((downloader, _temp_dir)) = create_live_downloader().await else {
        return;
    };

    let info = downloader.media_info(TEST_VIDEO_URL).await.unwrap();

    assert_eq!(info.platform, "YouTube");
    assert_ne!(info.title, "Unknown");
    assert!(info.duration.is_some_and(|d| d > 0.0));
    assert!(!info.formats.is_empty());
    assert!(info.formats.len() <= batch_dl::MediaInfo::MAX_FORMATS);
}
