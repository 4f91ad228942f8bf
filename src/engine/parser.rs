//! yt-dlp argument selection and output parsing

use crate::types::{MediaFormat, MediaInfo, QualityOption};
use crate::utils::{Platform, detect_platform, is_youtube_short};
use regex::Regex;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Tag prefixed to our progress template lines
pub(crate) const PROGRESS_TAG: &str = "[batch-dl]";
/// Tag prefixed to the final file path printed after the move stage
pub(crate) const FILEPATH_TAG: &str = "[batch-dl:file]";
/// Tag prefixed to the media title printed after the move stage
pub(crate) const TITLE_TAG: &str = "[batch-dl:title]";

/// Preferred audio bitrate for mp3 extraction (kbps)
const AUDIO_QUALITY_KBPS: &str = "192";

/// Height used when a quality label is not recognised
const DEFAULT_HEIGHT: u32 = 720;

/// Format arguments chosen for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSelection {
    /// Value for `--format`
    pub format: String,
    /// Value for `--merge-output-format`, if streams are merged
    pub merge_output_format: Option<String>,
    /// Extract audio to this codec (`--extract-audio --audio-format`)
    pub extract_audio: Option<String>,
}

impl FormatSelection {
    fn plain(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            merge_output_format: None,
            extract_audio: None,
        }
    }

    /// Render as yt-dlp command-line arguments
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["--format".to_string(), self.format.clone()];
        if let Some(ref merge) = self.merge_output_format {
            args.push("--merge-output-format".to_string());
            args.push(merge.clone());
        }
        if let Some(ref codec) = self.extract_audio {
            args.push("--extract-audio".to_string());
            args.push("--audio-format".to_string());
            args.push(codec.clone());
            args.push("--audio-quality".to_string());
            args.push(format!("{AUDIO_QUALITY_KBPS}K"));
        }
        args
    }
}

/// Pick yt-dlp format arguments for a request
///
/// - audio-only: `bestaudio/best`, extracted to mp3 when ffmpeg is available
/// - Reddit: separate video and audio streams, merged to mp4 when ffmpeg is available
/// - short-form platforms and YouTube Shorts: `best`
/// - explicit quality: best stream at or below that height
/// - otherwise: `best`
pub fn select_format(
    url: &str,
    quality: Option<&str>,
    audio_only: bool,
    ffmpeg_available: bool,
) -> FormatSelection {
    if audio_only {
        let mut selection = FormatSelection::plain("bestaudio/best");
        if ffmpeg_available {
            selection.extract_audio = Some("mp3".to_string());
        }
        return selection;
    }

    let platform = detect_platform(url);
    if platform == Platform::Reddit {
        return if ffmpeg_available {
            FormatSelection {
                format: "bestvideo+bestaudio/best".to_string(),
                merge_output_format: Some("mp4".to_string()),
                extract_audio: None,
            }
        } else {
            FormatSelection::plain("best")
        };
    }

    if platform.is_short_form() || is_youtube_short(url) {
        return FormatSelection::plain("best");
    }

    match quality {
        Some(label) => {
            let h = quality_height(label);
            FormatSelection::plain(format!(
                "best[height<={h}]/bestvideo[height<={h}]+bestaudio/best"
            ))
        }
        None => FormatSelection::plain("best"),
    }
}

/// Map a quality label to a maximum frame height
pub(crate) fn quality_height(label: &str) -> u32 {
    match label.trim().to_lowercase().as_str() {
        "1080p" => 1080,
        "720p" => 720,
        "480p" => 480,
        "360p" => 360,
        _ => DEFAULT_HEIGHT,
    }
}

/// Quality labels understood by [`select_format`], best first
const QUALITY_LABELS: [(&str, &str); 4] = [
    ("1080p", "Full HD 1080p"),
    ("720p", "HD 720p"),
    ("480p", "SD 480p"),
    ("360p", "Low 360p"),
];

/// Quality labels a request may carry
pub fn quality_options() -> Vec<QualityOption> {
    QUALITY_LABELS
        .iter()
        .map(|(value, label)| QualityOption {
            value: value.to_string(),
            label: label.to_string(),
        })
        .collect()
}

/// Subset of yt-dlp's `--dump-json` output
#[derive(Debug, Deserialize)]
struct RawInfo {
    title: Option<String>,
    description: Option<String>,
    thumbnail: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    channel: Option<String>,
    uploader_id: Option<String>,
    uploader_url: Option<String>,
    channel_url: Option<String>,
    view_count: Option<u64>,
    #[serde(default)]
    formats: Option<Vec<RawFormat>>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    format_id: Option<String>,
    ext: Option<String>,
    format_note: Option<String>,
    resolution: Option<String>,
    filesize: Option<u64>,
    fps: Option<f64>,
    vcodec: Option<String>,
    acodec: Option<String>,
}

/// Build [`MediaInfo`] from the JSON yt-dlp prints for `url`
///
/// Formats without an id or extension are skipped; at most
/// [`MediaInfo::MAX_FORMATS`] are kept.
pub(crate) fn parse_media_info(url: &str, json: &str) -> Result<MediaInfo, serde_json::Error> {
    let raw: RawInfo = serde_json::from_str(json.trim())?;

    let formats = raw
        .formats
        .unwrap_or_default()
        .into_iter()
        .filter_map(|f| {
            let format_id = f.format_id.filter(|v| !v.is_empty())?;
            let ext = f.ext.filter(|v| !v.is_empty())?;
            Some(MediaFormat {
                format_id,
                ext,
                quality: f.format_note.clone(),
                resolution: f.resolution,
                filesize: f.filesize,
                format_note: f.format_note,
                fps: f.fps,
                vcodec: f.vcodec,
                acodec: f.acodec,
            })
        })
        .take(MediaInfo::MAX_FORMATS)
        .collect();

    Ok(MediaInfo {
        url: url.to_string(),
        title: raw
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| "Unknown".to_string()),
        description: raw.description,
        thumbnail: raw.thumbnail,
        duration: raw.duration,
        uploader: raw.uploader.or(raw.channel).or(raw.uploader_id),
        uploader_url: raw.uploader_url.or(raw.channel_url),
        view_count: raw.view_count,
        formats,
        platform: detect_platform(url).name().to_string(),
    })
}

/// Turn yt-dlp's stderr from a failed lookup into a short reason
///
/// Raw extractor traces are not passed through.
pub(crate) fn describe_lookup_failure(stderr: &str, platform: Platform) -> String {
    let lower = stderr.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["unsupported url"]) {
        "Unsupported URL. Check that the link is correct.".to_string()
    } else if has(&["private video", "this video is private"]) {
        "This video is private and cannot be accessed.".to_string()
    } else if has(&["video unavailable", "has been removed", "no video could be found"]) {
        "Video unavailable, removed, or has no downloadable media.".to_string()
    } else if has(&["sign in", "login", "cookies", "authentication"]) {
        match platform {
            Platform::Instagram | Platform::Twitter => format!(
                "This {} content is not accessible right now. Try another public video.",
                platform.name()
            ),
            _ => "This video requires authentication or is not publicly available.".to_string(),
        }
    } else if has(&["geo restricted", "not available in your country"]) {
        "This video is geo-restricted and not available in your region.".to_string()
    } else if has(&["http error 429", "too many requests"]) {
        "Too many requests. Please wait a few minutes.".to_string()
    } else if has(&["http error 404"]) {
        "Content not found. Check that the link is correct.".to_string()
    } else {
        "Could not access this video. Check that the link is correct and the video is public."
            .to_string()
    }
}

/// One meaningful line of yt-dlp output
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum OutputLine {
    /// Transfer progress
    Progress {
        /// Percentage, as reported (may be fractional)
        percent: f64,
        /// Speed string, e.g. "1.50MiB/s"
        speed: Option<String>,
        /// ETA string, e.g. "00:30"
        eta: Option<String>,
    },
    /// Post-transfer work (merging, audio extraction)
    Processing(String),
    /// Final location of the file
    FilePath(PathBuf),
    /// Media title
    Title(String),
}

impl OutputLine {
    /// Progress message shown to observers
    pub(crate) fn progress_message(percent: u8, speed: Option<&str>, eta: Option<&str>) -> String {
        format!(
            "Downloading: {percent}% | Speed: {} | ETA: {}",
            speed.unwrap_or("N/A"),
            eta.unwrap_or("N/A")
        )
    }
}

struct LinePatterns {
    /// `[batch-dl]  42.0% 1.50MiB/s 00:30`
    template: Regex,
    /// `[download]  42.0% of 100.00MiB at 1.50MiB/s ETA 00:30`
    standard: Regex,
    /// `[download]  42.0%`
    bare: Regex,
    /// `[Merger] ...`, `[ExtractAudio] ...`, `[ffmpeg] ...`
    processing: Regex,
}

impl LinePatterns {
    fn compile() -> Option<Self> {
        Some(Self {
            template: Regex::new(r"^\[batch-dl\]\s+(\S+)%?\s+(\S+)\s+(\S+)").ok()?,
            standard: Regex::new(
                r"\[download\]\s+(\d+(?:\.\d+)?)%\s+of\s+~?\s*\S+\s+at\s+(\S+)\s+ETA\s+(\S+)",
            )
            .ok()?,
            bare: Regex::new(r"\[download\]\s+(\d+(?:\.\d+)?)%").ok()?,
            processing: Regex::new(r"^\[(Merger|ExtractAudio|ffmpeg|FixupM3u8|VideoConvertor)\]")
                .ok()?,
        })
    }
}

static PATTERNS: LazyLock<Option<LinePatterns>> = LazyLock::new(LinePatterns::compile);

/// yt-dlp prints "NA"/"Unknown" placeholders when a field is not known yet
fn known(value: &str) -> Option<String> {
    let v = value.trim();
    if v.is_empty() || v.eq_ignore_ascii_case("na") || v.eq_ignore_ascii_case("unknown") {
        None
    } else {
        Some(v.to_string())
    }
}

/// Parse one stdout line from yt-dlp
pub(crate) fn parse_output_line(line: &str) -> Option<OutputLine> {
    let line = line.trim();

    if let Some(path) = line.strip_prefix(FILEPATH_TAG) {
        let path = path.trim();
        return (!path.is_empty()).then(|| OutputLine::FilePath(PathBuf::from(path)));
    }
    if let Some(title) = line.strip_prefix(TITLE_TAG) {
        return known(title).map(OutputLine::Title);
    }

    let patterns = PATTERNS.as_ref()?;

    if let Some(caps) = patterns.template.captures(line) {
        let percent = caps[1].trim_end_matches('%').parse::<f64>().ok()?;
        return Some(OutputLine::Progress {
            percent,
            speed: known(&caps[2]),
            eta: known(&caps[3]),
        });
    }
    if let Some(caps) = patterns.standard.captures(line) {
        return Some(OutputLine::Progress {
            percent: caps[1].parse().ok()?,
            speed: known(&caps[2]),
            eta: known(&caps[3]),
        });
    }
    if let Some(caps) = patterns.bare.captures(line) {
        return Some(OutputLine::Progress {
            percent: caps[1].parse().ok()?,
            speed: None,
            eta: None,
        });
    }
    if let Some(caps) = patterns.processing.captures(line) {
        let step = match &caps[1] {
            "Merger" => "Merging formats",
            "ExtractAudio" => "Extracting audio",
            _ => "Post-processing",
        };
        return Some(OutputLine::Processing(step.to_string()));
    }

    None
}

/// Round a reported percentage into 0..=100
pub(crate) fn percent_to_u8(percent: f64) -> u8 {
    if percent.is_nan() {
        0
    } else {
        percent.clamp(0.0, 100.0).floor() as u8
    }
}

/// Last non-empty stderr lines, for failure reasons
pub(crate) fn stderr_tail(lines: &[String], max: usize) -> String {
    let tail: Vec<&str> = lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();
    let start = tail.len().saturating_sub(max);
    tail[start..].join("\n")
}
