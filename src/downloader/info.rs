//! Media metadata lookups.

use crate::error::{Error, Result};
use crate::types::MediaInfo;
use crate::utils::{Platform, detect_platform, validate_url};

use super::BatchDownloader;

impl BatchDownloader {
    /// Look up title, duration and formats for a URL without queueing it
    ///
    /// Successful lookups are cached for the lifetime of the downloader, so
    /// repeated calls for the same URL do not reach the engine again.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if the URL is invalid or no known platform hosts it
    /// - [`Error::Retrieval`] if the engine could not read the metadata
    pub async fn media_info(&self, url: &str) -> Result<MediaInfo> {
        let url = url.trim();
        validate_url(url)?;
        if detect_platform(url) == Platform::Unknown {
            return Err(Error::Validation(
                "unsupported platform: supported are YouTube, Instagram, TikTok, Twitter/X, Facebook and Reddit"
                    .to_string(),
            ));
        }

        if let Some(info) = self.info_cache.read().await.get(url) {
            tracing::debug!(url, "media info served from cache");
            return Ok(info.clone());
        }

        let info = self.engine.fetch_info(url).await.map_err(|e| {
            tracing::warn!(url, error = %e, "media info lookup failed");
            Error::Retrieval(e)
        })?;

        tracing::info!(url, title = %info.title, formats = info.formats.len(), "media info looked up");
        self.info_cache
            .write()
            .await
            .insert(url.to_string(), info.clone());
        Ok(info)
    }
}
