//! Request validation and filename helpers

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::ToSchema;

/// Characters that are invalid in file names on at least one supported OS
const INVALID_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Media platform recognised from a URL's host
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Platform {
    /// youtube.com, youtu.be
    YouTube,
    /// instagram.com
    Instagram,
    /// tiktok.com
    TikTok,
    /// twitter.com, x.com
    Twitter,
    /// facebook.com, fb.watch
    Facebook,
    /// reddit.com
    Reddit,
    /// Anything else yt-dlp may still understand
    Unknown,
}

impl Platform {
    /// Display name, also used as the output file name infix
    pub fn name(&self) -> &'static str {
        match self {
            Platform::YouTube => "YouTube",
            Platform::Instagram => "Instagram",
            Platform::TikTok => "TikTok",
            Platform::Twitter => "Twitter",
            Platform::Facebook => "Facebook",
            Platform::Reddit => "Reddit",
            Platform::Unknown => "Unknown",
        }
    }

    /// Platforms serving short single-stream clips
    pub fn is_short_form(&self) -> bool {
        matches!(
            self,
            Platform::Instagram | Platform::TikTok | Platform::Twitter | Platform::Facebook
        )
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Validate that a string is an absolute http(s) URL with a host
///
/// Returns the parsed URL so callers don't need to parse twice.
///
/// # Examples
///
/// ```
/// use batch_dl::utils::validate_url;
///
/// assert!(validate_url("https://www.youtube.com/watch?v=abc").is_ok());
/// assert!(validate_url("ftp://example.com/file").is_err());
/// assert!(validate_url("not a url").is_err());
/// ```
pub fn validate_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation("url must not be empty".to_string()));
    }

    let url = Url::parse(trimmed)
        .map_err(|e| Error::Validation(format!("invalid url '{trimmed}': {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::Validation(format!(
            "unsupported url scheme '{}': expected http or https",
            url.scheme()
        )));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(Error::Validation(format!("url '{trimmed}' has no host"))),
    }
}

/// Detect the media platform from a URL
///
/// Matching is done on the lowercased URL text, so it also works for URLs
/// that failed strict parsing.
pub fn detect_platform(url: &str) -> Platform {
    let lower = url.to_lowercase();

    if lower.contains("youtube.com") || lower.contains("youtu.be") {
        Platform::YouTube
    } else if lower.contains("instagram.com") {
        Platform::Instagram
    } else if lower.contains("tiktok.com") {
        Platform::TikTok
    } else if lower.contains("twitter.com") || lower.contains("x.com") {
        Platform::Twitter
    } else if lower.contains("facebook.com") || lower.contains("fb.watch") {
        Platform::Facebook
    } else if lower.contains("reddit.com") {
        Platform::Reddit
    } else {
        Platform::Unknown
    }
}

/// Whether a URL points at a YouTube Short
pub fn is_youtube_short(url: &str) -> bool {
    detect_platform(url) == Platform::YouTube && url.to_lowercase().contains("/shorts/")
}

/// Strip characters that are invalid in file names and trim surrounding whitespace
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| !INVALID_FILENAME_CHARS.contains(c) && !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Format a byte count for humans ("1.50 MB")
pub fn format_filesize(size_bytes: Option<u64>) -> String {
    let Some(bytes) = size_bytes.filter(|b| *b > 0) else {
        return "Unknown".to_string();
    };

    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.2} TB")
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url_accepts_http_and_https() {
        assert!(validate_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ").is_ok());
        assert!(validate_url("http://localhost:8080/video").is_ok());
        assert!(validate_url("  https://vm.tiktok.com/abc  ").is_ok());
    }

    #[test]
    fn test_validate_url_rejects_garbage() {
        for bad in ["", "   ", "not a url", "ftp://example.com/a", "file:///etc/passwd"] {
            let err = validate_url(bad).unwrap_err();
            assert!(
                matches!(err, Error::Validation(_)),
                "'{bad}' should be a validation error, got {err:?}"
            );
        }
    }

    #[test]
    fn test_detect_platform() {
        let cases = [
            ("https://youtu.be/abc", Platform::YouTube),
            ("https://www.YouTube.com/watch?v=1", Platform::YouTube),
            ("https://www.instagram.com/reel/xyz", Platform::Instagram),
            ("https://www.tiktok.com/@u/video/1", Platform::TikTok),
            ("https://x.com/u/status/1", Platform::Twitter),
            ("https://fb.watch/abc", Platform::Facebook),
            ("https://www.reddit.com/r/videos/comments/1", Platform::Reddit),
            ("https://vimeo.com/1", Platform::Unknown),
        ];
        for (url, expected) in cases {
            assert_eq!(detect_platform(url), expected, "platform for {url}");
        }
    }

    #[test]
    fn test_is_youtube_short() {
        assert!(is_youtube_short("https://www.youtube.com/shorts/abc123"));
        assert!(!is_youtube_short("https://www.youtube.com/watch?v=abc123"));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("  My: Video? <HD>  "), "My Video HD");
        assert_eq!(sanitize_filename("a/b\\c|d*e\"f"), "abcdef");
        assert_eq!(sanitize_filename("plain.mp4"), "plain.mp4");
    }

    #[test]
    fn test_format_filesize() {
        assert_eq!(format_filesize(None), "Unknown");
        assert_eq!(format_filesize(Some(0)), "Unknown");
        assert_eq!(format_filesize(Some(512)), "512.00 B");
        assert_eq!(format_filesize(Some(1536)), "1.50 KB");
        assert_eq!(format_filesize(Some(5 * 1024 * 1024)), "5.00 MB");
    }
}
