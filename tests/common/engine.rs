//! A retrieval engine driven by markers in the URL, built only on the public API

use async_trait::async_trait;
use batch_dl::{
    BatchDownloader, Config, ProgressReporter, RetrievalEngine, RetrievalError, RetrievalRequest,
    Retrieved, Stage,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Engine whose behavior is chosen by the URL:
/// - contains `fail` - fails with "scripted failure"
/// - contains `hang` - waits until cancelled
/// - anything else - reports progress in steps, then writes a file
pub struct ScriptedEngine {
    dir: PathBuf,
    step_delay: Duration,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new(dir: PathBuf, step_delay: Duration) -> Self {
        Self {
            dir,
            step_delay,
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Highest number of simultaneous retrievals observed
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RetrievalEngine for ScriptedEngine {
    async fn retrieve(
        &self,
        request: &RetrievalRequest,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> Result<Retrieved, RetrievalError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let result = async {
            if request.url.contains("hang") {
                cancel.cancelled().await;
                return Err(RetrievalError::Cancelled);
            }

            for percent in [25u8, 50, 75] {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(RetrievalError::Cancelled),
                    _ = tokio::time::sleep(self.step_delay) => {}
                }
                progress.report(Stage::Downloading, percent, format!("Downloading: {percent}%"));
            }

            if request.url.contains("fail") {
                return Err(RetrievalError::Failed("scripted failure".to_string()));
            }

            progress.report(Stage::Processing, 90, "Merging formats");
            let path = self
                .dir
                .join(format!("{}.{}", request.id, request.output_format));
            tokio::fs::write(&path, request.url.as_bytes())
                .await
                .map_err(|e| RetrievalError::Failed(e.to_string()))?;
            Ok(Retrieved {
                filepath: path,
                title: Some(format!("Title of {}", request.url)),
            })
        }
        .await;

        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Downloader with `max_concurrent` slots around a [`ScriptedEngine`]
pub fn create_downloader(max_concurrent: usize) -> (BatchDownloader, Arc<ScriptedEngine>, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.queue.max_concurrent_downloads = max_concurrent;
    config.queue.shutdown_timeout = Duration::from_secs(2);
    config.engine.temp_dir = temp_dir.path().to_path_buf();

    let engine = Arc::new(ScriptedEngine::new(
        temp_dir.path().to_path_buf(),
        Duration::from_millis(10),
    ));
    let downloader = BatchDownloader::new(config, engine.clone()).unwrap();
    (downloader, engine, temp_dir)
}
