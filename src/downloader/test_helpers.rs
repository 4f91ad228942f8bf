//! Shared test helpers: a scriptable mock engine and downloader constructors.

use crate::config::Config;
use crate::downloader::BatchDownloader;
use crate::engine::{RetrievalEngine, RetrievalError, RetrievalRequest, Retrieved};
use crate::relay::{ProgressReporter, ProgressSink};
use crate::types::{ItemId, MediaInfo, ProgressUpdate, Stage, Status};
use crate::utils::detect_platform;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// How long test helpers wait for a condition before failing
pub(crate) const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// What the mock engine does for a request
#[derive(Clone, Debug)]
pub(crate) enum MockBehavior {
    /// Write a file and succeed immediately
    Succeed,
    /// Fail with this reason
    Fail(String),
    /// Block until the test calls [`MockEngine::release`], then succeed
    Gated,
    /// Block until cancelled
    Hang,
    /// Panic inside the engine
    Panic,
}

/// Scriptable engine: behavior is chosen per URL, falling back to a default
pub(crate) struct MockEngine {
    dir: PathBuf,
    default: MockBehavior,
    scripted: Mutex<HashMap<String, MockBehavior>>,
    gate: Arc<Semaphore>,
    running: AtomicUsize,
    max_running: AtomicUsize,
    calls: AtomicUsize,
    info_calls: AtomicUsize,
}

struct RunningGuard<'a>(&'a AtomicUsize);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockEngine {
    pub(crate) fn new(dir: PathBuf, default: MockBehavior) -> Self {
        Self {
            dir,
            default,
            scripted: Mutex::new(HashMap::new()),
            gate: Arc::new(Semaphore::new(0)),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            info_calls: AtomicUsize::new(0),
        }
    }

    /// Use `behavior` for requests with exactly this URL
    pub(crate) fn script(&self, url: &str, behavior: MockBehavior) {
        self.scripted
            .lock()
            .unwrap()
            .insert(url.to_string(), behavior);
    }

    /// Let `n` gated retrievals finish
    pub(crate) fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Retrievals currently inside `retrieve`
    pub(crate) fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous retrievals observed
    pub(crate) fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    /// Total calls to `retrieve`
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Total calls to `fetch_info`
    pub(crate) fn info_calls(&self) -> usize {
        self.info_calls.load(Ordering::SeqCst)
    }

    fn behavior_for(&self, url: &str) -> MockBehavior {
        self.scripted
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }

    async fn write_file(&self, request: &RetrievalRequest) -> Result<Retrieved, RetrievalError> {
        let path = self
            .dir
            .join(format!("{}.{}", request.id, request.output_format));
        tokio::fs::write(&path, b"mock media")
            .await
            .map_err(|e| RetrievalError::Failed(e.to_string()))?;
        Ok(Retrieved {
            filepath: path,
            title: Some(format!("Mock {}", request.url)),
        })
    }
}

#[async_trait]
impl RetrievalEngine for MockEngine {
    async fn retrieve(
        &self,
        request: &RetrievalRequest,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> Result<Retrieved, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        let _guard = RunningGuard(&self.running);

        progress.report(Stage::Downloading, 10, "Downloading: 10% | Speed: 1MiB/s | ETA: 00:09");

        match self.behavior_for(&request.url) {
            MockBehavior::Succeed => {
                progress.report(Stage::Downloading, 50, "Downloading: 50% | Speed: 1MiB/s | ETA: 00:05");
                self.write_file(request).await
            }
            MockBehavior::Fail(reason) => Err(RetrievalError::Failed(reason)),
            MockBehavior::Gated => {
                tokio::select! {
                    _ = cancel.cancelled() => Err(RetrievalError::Cancelled),
                    permit = self.gate.acquire() => {
                        permit.unwrap().forget();
                        self.write_file(request).await
                    }
                }
            }
            MockBehavior::Hang => {
                cancel.cancelled().await;
                Err(RetrievalError::Cancelled)
            }
            MockBehavior::Panic => panic!("mock engine exploded"),
        }
    }

    async fn fetch_info(&self, url: &str) -> Result<MediaInfo, RetrievalError> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        if let MockBehavior::Fail(reason) = self.behavior_for(url) {
            return Err(RetrievalError::Failed(reason));
        }
        Ok(MediaInfo {
            url: url.to_string(),
            title: format!("Mock {url}"),
            description: None,
            thumbnail: None,
            duration: Some(10.0),
            uploader: Some("mock".to_string()),
            uploader_url: None,
            view_count: None,
            formats: Vec::new(),
            platform: detect_platform(url).name().to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Sink recording every delivered update
#[derive(Default)]
pub(crate) struct RecordingSink {
    pub(crate) updates: Mutex<Vec<(ItemId, ProgressUpdate)>>,
}

impl RecordingSink {
    pub(crate) fn for_item(&self, id: ItemId) -> Vec<ProgressUpdate> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .filter(|(i, _)| *i == id)
            .map(|(_, u)| u.clone())
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn deliver(&self, id: &ItemId, update: &ProgressUpdate) {
        self.updates.lock().unwrap().push((*id, update.clone()));
    }
}

/// Test downloader with `max_concurrent` slots and a mock engine.
/// Returns the downloader, the engine and the tempdir (which must be kept alive).
pub(crate) fn create_downloader_with(
    max_concurrent: usize,
    default: MockBehavior,
) -> (BatchDownloader, Arc<MockEngine>, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();

    let mut config = Config::default();
    config.queue.max_concurrent_downloads = max_concurrent;
    config.queue.shutdown_timeout = Duration::from_secs(2);
    config.engine.temp_dir = temp_dir.path().to_path_buf();

    let engine = Arc::new(MockEngine::new(temp_dir.path().to_path_buf(), default));
    let downloader = BatchDownloader::new(config, engine.clone()).unwrap();

    (downloader, engine, temp_dir)
}

/// Test downloader with 3 slots whose engine succeeds immediately
pub(crate) fn create_test_downloader() -> (BatchDownloader, Arc<MockEngine>, tempfile::TempDir) {
    create_downloader_with(3, MockBehavior::Succeed)
}

/// Wait until `id` reaches `status`, failing the test after [`WAIT_TIMEOUT`]
pub(crate) async fn wait_for_status(downloader: &BatchDownloader, id: ItemId, status: Status) {
    let result = tokio::time::timeout(WAIT_TIMEOUT, async {
        loop {
            if downloader.get_status(id).await.map(|i| i.status).ok() == Some(status) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    if result.is_err() {
        let current = downloader.get_status(id).await.map(|i| i.status);
        panic!("item {id} never reached {status}, currently {current:?}");
    }
}

/// Wait until the engine has exactly `n` retrievals in flight
pub(crate) async fn wait_for_running(engine: &MockEngine, n: usize) {
    tokio::time::timeout(WAIT_TIMEOUT, async {
        while engine.running() != n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("engine never reached {n} running, at {}", engine.running()));
}

/// Wait for the downloader to go idle, failing the test after [`WAIT_TIMEOUT`]
pub(crate) async fn wait_idle(downloader: &BatchDownloader) {
    tokio::time::timeout(WAIT_TIMEOUT, downloader.wait_for_idle())
        .await
        .expect("downloader did not go idle");
}
