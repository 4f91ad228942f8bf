use super::test_helpers::*;
use super::*;
use crate::types::{DownloadRequest, ItemId, Stage, Status};

mod control;

fn req(n: usize) -> DownloadRequest {
    DownloadRequest::new(format!("https://www.youtube.com/watch?v=item{n}"))
}

async fn enqueue_n(downloader: &BatchDownloader, n: usize) -> Vec<ItemId> {
    downloader
        .enqueue_batch((0..n).map(req).collect())
        .await
        .unwrap()
}
