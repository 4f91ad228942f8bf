//! Configuration types for batch-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Main configuration
///
/// Every field carries a serde default, so `{}` deserializes to [`Config::default`].
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Queue and dispatcher settings
    #[serde(default)]
    pub queue: QueueConfig,

    /// Retrieval engine settings (yt-dlp, temp directory)
    #[serde(default)]
    pub engine: EngineConfig,

    /// Progress relay settings
    #[serde(default)]
    pub progress: ProgressConfig,

    /// API server settings
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Check invariants that serde defaults cannot express
    pub fn validate(&self) -> Result<()> {
        if self.queue.max_concurrent_downloads == 0 {
            return Err(Error::Config {
                message: "max_concurrent_downloads must be at least 1".to_string(),
                key: Some("queue.max_concurrent_downloads".to_string()),
            });
        }
        if self.queue.event_buffer == 0 {
            return Err(Error::Config {
                message: "event_buffer must be at least 1".to_string(),
                key: Some("queue.event_buffer".to_string()),
            });
        }
        if self.progress.buffer == 0 {
            return Err(Error::Config {
                message: "progress buffer must be at least 1".to_string(),
                key: Some("progress.buffer".to_string()),
            });
        }
        if self.queue.default_output_format.trim().is_empty() {
            return Err(Error::Config {
                message: "default_output_format must not be empty".to_string(),
                key: Some("queue.default_output_format".to_string()),
            });
        }
        Ok(())
    }

    /// Temporary directory where the engine writes finished files
    pub fn temp_dir(&self) -> &PathBuf {
        &self.engine.temp_dir
    }
}

/// Queue behavior configuration (concurrency, defaults, shutdown)
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct QueueConfig {
    /// Maximum concurrent downloads (default: 3, must be at least 1)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Output format used when a request names none and is not audio-only (default: "mp4")
    #[serde(default = "default_output_format")]
    pub default_output_format: String,

    /// Lifecycle event channel capacity (default: 1000)
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// How long `shutdown()` waits for in-flight work to wind down (default: 30 seconds)
    #[serde(default = "default_shutdown_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub shutdown_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: default_max_concurrent(),
            default_output_format: default_output_format(),
            event_buffer: default_event_buffer(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// Retrieval engine configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct EngineConfig {
    /// Directory finished files are written to (default: "./temp_downloads")
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Path to the yt-dlp binary (auto-detected if None)
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,

    /// Path to the ffmpeg binary (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Whether to search PATH for binaries not configured explicitly (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Network socket timeout handed to yt-dlp (default: 30 seconds)
    #[serde(default = "default_socket_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub socket_timeout: Duration,

    /// Maximum file size in megabytes (default: 500, None = unlimited)
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
            ytdlp_path: None,
            ffmpeg_path: None,
            search_path: true,
            socket_timeout: default_socket_timeout(),
            max_file_size_mb: default_max_file_size_mb(),
        }
    }
}

/// Progress relay configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ProgressConfig {
    /// Progress broadcast capacity (default: 256)
    #[serde(default = "default_progress_buffer")]
    pub buffer: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            buffer: default_progress_buffer(),
        }
    }
}

/// Server integration configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ServerConfig {
    /// REST API settings
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:8000)
    #[serde(default = "default_bind_address")]
    #[schema(value_type = String)]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

fn default_max_concurrent() -> usize {
    3
}

fn default_output_format() -> String {
    "mp4".to_string()
}

fn default_event_buffer() -> usize {
    1000
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("./temp_downloads")
}

fn default_socket_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_file_size_mb() -> Option<u64> {
    Some(500)
}

fn default_progress_buffer() -> usize {
    256
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
