//! yt-dlp backed retrieval engine

use super::parser::{
    FILEPATH_TAG, OutputLine, PROGRESS_TAG, TITLE_TAG, describe_lookup_failure, parse_media_info,
    parse_output_line, percent_to_u8, select_format, stderr_tail,
};
use super::traits::{RetrievalEngine, RetrievalError, RetrievalRequest, Retrieved};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::relay::ProgressReporter;
use crate::types::{MediaInfo, Stage};
use crate::utils::detect_platform;
use async_trait::async_trait;
use rand::Rng;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Characters used for the random part of output file names
const NAME_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Length of the random part of output file names
const NAME_CODE_LEN: usize = 8;

/// Stderr lines kept for failure messages
const STDERR_KEEP: usize = 50;

/// Stderr lines quoted in a failure reason
const STDERR_REASON_LINES: usize = 3;

/// Metadata lookups may take this many socket timeouts before giving up
const INFO_TIMEOUT_FACTOR: u32 = 3;

/// Retrieval engine driving the external `yt-dlp` binary
///
/// Each retrieval spawns one `yt-dlp` process writing into `output_dir` as
/// `MediaVid{Platform}{random}.{ext}`. Progress is parsed from stdout; the
/// final path and title are printed by yt-dlp after the move stage.
///
/// # Examples
///
/// ```no_run
/// use batch_dl::engine::YtDlpEngine;
/// use std::path::PathBuf;
///
/// // Explicit binary
/// let engine = YtDlpEngine::new(PathBuf::from("/usr/bin/yt-dlp"), PathBuf::from("./temp_downloads"));
///
/// // Or auto-discover from PATH
/// let engine = YtDlpEngine::from_path(PathBuf::from("./temp_downloads"))
///     .expect("yt-dlp not found in PATH");
/// ```
#[derive(Debug, Clone)]
pub struct YtDlpEngine {
    binary_path: PathBuf,
    ffmpeg_path: Option<PathBuf>,
    output_dir: PathBuf,
    socket_timeout: Duration,
    max_file_size_mb: Option<u64>,
}

impl YtDlpEngine {
    /// Create an engine with an explicit yt-dlp path and output directory
    pub fn new(binary_path: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            binary_path,
            ffmpeg_path: None,
            output_dir,
            socket_timeout: Duration::from_secs(30),
            max_file_size_mb: None,
        }
    }

    /// Attempt to find yt-dlp (and ffmpeg, if present) in PATH
    pub fn from_path(output_dir: PathBuf) -> Option<Self> {
        let binary = which::which("yt-dlp").ok()?;
        Some(Self::new(binary, output_dir).with_ffmpeg(which::which("ffmpeg").ok()))
    }

    /// Build an engine from configuration
    ///
    /// Explicit paths win; otherwise PATH is searched when `search_path` is set.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let binary = match (&config.ytdlp_path, config.search_path) {
            (Some(path), _) => path.clone(),
            (None, true) => which::which("yt-dlp").map_err(|e| {
                Error::ExternalTool(format!("yt-dlp not found in PATH: {}", e))
            })?,
            (None, false) => {
                return Err(Error::ExternalTool(
                    "yt-dlp path not configured and PATH search disabled".to_string(),
                ));
            }
        };

        let ffmpeg = match (&config.ffmpeg_path, config.search_path) {
            (Some(path), _) => Some(path.clone()),
            (None, true) => which::which("ffmpeg").ok(),
            (None, false) => None,
        };

        tracing::info!(
            ytdlp = %binary.display(),
            ffmpeg = ?ffmpeg,
            output_dir = %config.temp_dir.display(),
            "yt-dlp engine initialized"
        );

        let mut engine = Self::new(binary, config.temp_dir.clone()).with_ffmpeg(ffmpeg);
        engine.socket_timeout = config.socket_timeout;
        engine.max_file_size_mb = config.max_file_size_mb;
        Ok(engine)
    }

    /// Use this ffmpeg binary for merging and audio extraction
    pub fn with_ffmpeg(mut self, ffmpeg_path: Option<PathBuf>) -> Self {
        self.ffmpeg_path = ffmpeg_path;
        self
    }

    /// Path of the yt-dlp binary
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    /// Directory finished files are written to
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Whether ffmpeg is available for merging/extraction
    pub fn ffmpeg_available(&self) -> bool {
        self.ffmpeg_path.as_ref().is_some_and(|p| p.exists())
    }

    /// Command-line arguments for one retrieval
    pub(crate) fn build_args(&self, request: &RetrievalRequest, output_template: &Path) -> Vec<String> {
        let mut args = vec![
            "--newline".to_string(),
            "--no-colors".to_string(),
            "--no-warnings".to_string(),
            "--no-playlist".to_string(),
            "--progress".to_string(),
            "--progress-template".to_string(),
            format!(
                "download:{PROGRESS_TAG} %(progress._percent_str)s %(progress._speed_str)s %(progress._eta_str)s"
            ),
            "--print".to_string(),
            format!("after_move:{TITLE_TAG} %(title)s"),
            "--print".to_string(),
            format!("after_move:{FILEPATH_TAG} %(filepath)s"),
            "--socket-timeout".to_string(),
            self.socket_timeout.as_secs().to_string(),
            "--output".to_string(),
            output_template.to_string_lossy().to_string(),
        ];

        if let Some(mb) = self.max_file_size_mb {
            args.push("--max-filesize".to_string());
            args.push(format!("{mb}M"));
        }

        let ffmpeg_available = self.ffmpeg_available();
        if ffmpeg_available && let Some(ffmpeg) = &self.ffmpeg_path {
            args.push("--ffmpeg-location".to_string());
            args.push(ffmpeg.to_string_lossy().to_string());
        }

        args.extend(
            select_format(
                &request.url,
                request.quality.as_deref(),
                request.audio_only,
                ffmpeg_available,
            )
            .to_args(),
        );

        args.push("--".to_string());
        args.push(request.url.clone());
        args
    }

    /// Command-line arguments for a metadata lookup
    pub(crate) fn build_info_args(&self, url: &str) -> Vec<String> {
        vec![
            "--dump-json".to_string(),
            "--skip-download".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            self.socket_timeout.as_secs().to_string(),
            "--".to_string(),
            url.to_string(),
        ]
    }
}

/// Random `[a-z0-9]` code for output file names
fn random_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| NAME_CHARSET[rng.gen_range(0..NAME_CHARSET.len())] as char)
        .collect()
}

/// Newest file in `dir` whose name starts with `stem.`
async fn find_output(dir: &Path, stem: &str) -> Option<PathBuf> {
    let prefix = format!("{stem}.");
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;

    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with(&prefix) || name.ends_with(".part") || name.ends_with(".ytdl") {
            continue;
        }
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        let modified = meta.modified().unwrap_or(std::time::UNIX_EPOCH);
        if newest.as_ref().is_none_or(|(t, _)| modified > *t) {
            newest = Some((modified, entry.path()));
        }
    }

    newest.map(|(_, path)| path)
}

/// Remove every file in `dir` produced for `stem` (partial or complete)
async fn remove_outputs(dir: &Path, stem: &str) {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_name().to_string_lossy().starts_with(stem)
            && let Err(e) = tokio::fs::remove_file(entry.path()).await
        {
            tracing::debug!(path = %entry.path().display(), error = %e, "failed to remove partial file");
        }
    }
}

#[async_trait]
impl RetrievalEngine for YtDlpEngine {
    async fn retrieve(
        &self,
        request: &RetrievalRequest,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> std::result::Result<Retrieved, RetrievalError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| {
                RetrievalError::Failed(format!(
                    "failed to create output directory '{}': {}",
                    self.output_dir.display(),
                    e
                ))
            })?;

        let platform = detect_platform(&request.url);
        let stem = format!("MediaVid{}{}", platform.name(), random_code(NAME_CODE_LEN));
        let template = self.output_dir.join(format!("{stem}.%(ext)s"));
        let args = self.build_args(request, &template);

        tracing::debug!(item_id = %request.id, %platform, ?args, "spawning yt-dlp");

        let mut child = Command::new(&self.binary_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RetrievalError::Failed(format!("failed to start yt-dlp: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RetrievalError::Failed("failed to capture yt-dlp stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RetrievalError::Failed("failed to capture yt-dlp stderr".to_string()))?;

        let mut stdout_lines = BufReader::new(stdout).lines();
        let mut stderr_lines = BufReader::new(stderr).lines();
        let mut stdout_done = false;
        let mut stderr_done = false;

        let mut stderr_buf: Vec<String> = Vec::new();
        let mut filepath: Option<PathBuf> = None;
        let mut title: Option<String> = None;
        let mut last_percent: Option<u8> = None;

        while !(stdout_done && stderr_done) {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(item_id = %request.id, "cancel signalled, killing yt-dlp");
                    child.kill().await.ok();
                    remove_outputs(&self.output_dir, &stem).await;
                    return Err(RetrievalError::Cancelled);
                }
                line = stdout_lines.next_line(), if !stdout_done => match line {
                    Ok(Some(line)) => match parse_output_line(&line) {
                        Some(OutputLine::Progress { percent, speed, eta }) => {
                            let pct = percent_to_u8(percent);
                            if last_percent != Some(pct) {
                                last_percent = Some(pct);
                                progress.report(
                                    Stage::Downloading,
                                    pct,
                                    OutputLine::progress_message(pct, speed.as_deref(), eta.as_deref()),
                                );
                            }
                        }
                        Some(OutputLine::Processing(step)) => {
                            progress.report(Stage::Processing, last_percent.unwrap_or(100), step);
                        }
                        Some(OutputLine::FilePath(path)) => filepath = Some(path),
                        Some(OutputLine::Title(t)) => title = Some(t),
                        None => tracing::trace!(item_id = %request.id, line = %line, "yt-dlp stdout"),
                    },
                    Ok(None) => stdout_done = true,
                    Err(e) => {
                        tracing::warn!(item_id = %request.id, error = %e, "error reading yt-dlp stdout");
                        stdout_done = true;
                    }
                },
                line = stderr_lines.next_line(), if !stderr_done => match line {
                    Ok(Some(line)) => {
                        tracing::debug!(item_id = %request.id, line = %line, "yt-dlp stderr");
                        if stderr_buf.len() == STDERR_KEEP {
                            stderr_buf.remove(0);
                        }
                        stderr_buf.push(line);
                    }
                    Ok(None) => stderr_done = true,
                    Err(e) => {
                        tracing::warn!(item_id = %request.id, error = %e, "error reading yt-dlp stderr");
                        stderr_done = true;
                    }
                },
            }
        }

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                child.kill().await.ok();
                remove_outputs(&self.output_dir, &stem).await;
                return Err(RetrievalError::Cancelled);
            }
            status = child.wait() => status
                .map_err(|e| RetrievalError::Failed(format!("failed to wait for yt-dlp: {}", e)))?,
        };

        if !status.success() {
            remove_outputs(&self.output_dir, &stem).await;
            let tail = stderr_tail(&stderr_buf, STDERR_REASON_LINES);
            let reason = if tail.is_empty() {
                format!("yt-dlp exited with {}", status)
            } else {
                tail
            };
            return Err(RetrievalError::Failed(reason));
        }

        let filepath = match filepath.filter(|p| p.exists()) {
            Some(path) => path,
            None => find_output(&self.output_dir, &stem).await.ok_or_else(|| {
                RetrievalError::Failed("no output file found after download".to_string())
            })?,
        };

        Ok(Retrieved { filepath, title })
    }

    async fn fetch_info(&self, url: &str) -> std::result::Result<MediaInfo, RetrievalError> {
        let platform = detect_platform(url);
        let args = self.build_info_args(url);
        tracing::debug!(%platform, ?args, "looking up media info");

        let mut command = Command::new(&self.binary_path);
        command
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        let output = command.output();

        // yt-dlp may retry several requests of its own, each bounded by the socket timeout
        let limit = self.socket_timeout.saturating_mul(INFO_TIMEOUT_FACTOR);
        let output = match tokio::time::timeout(limit, output).await {
            Ok(result) => {
                result.map_err(|e| RetrievalError::Failed(format!("failed to start yt-dlp: {}", e)))?
            }
            Err(_) => {
                tracing::warn!(url, timeout_secs = limit.as_secs(), "media info lookup timed out");
                return Err(RetrievalError::Failed(
                    "Timed out looking up the video. Try again or check that it is public."
                        .to_string(),
                ));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(url, status = %output.status, stderr = %stderr, "media info lookup failed");
            return Err(RetrievalError::Failed(describe_lookup_failure(&stderr, platform)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let json = stdout.lines().find(|l| l.trim_start().starts_with('{')).unwrap_or("");
        parse_media_info(url, json).map_err(|e| {
            tracing::warn!(url, error = %e, "unreadable yt-dlp metadata");
            RetrievalError::Failed("yt-dlp returned unreadable metadata".to_string())
        })
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}
