//! Asset downloader
//!
//! Streams a binary resource into a fresh file inside the acquisition's
//! [`ResourceScope`]. Fails with `DownloadFailed` on a non-success status,
//! an empty payload, a size above the configured ceiling, a network error
//! or a timeout. Partial files are discarded through the scope before the
//! error is returned.
//!
//! The final file extension comes from magic-byte sniffing of the first
//! chunk (`infer`), then the URL path, then the asset kind's default.

use crate::error::{AcquireError, AcquireResult};
use crate::services::lifecycle::ResourceScope;
use crate::types::{AssetKind, DownloadedAsset};
use futures::StreamExt;
use moodpost_common::config::AcquisitionConfig;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Per-kind download limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadLimits {
    pub timeout: Duration,
    pub max_bytes: u64,
}

/// Downloads audio and image assets into acquisition scopes
#[derive(Debug, Clone)]
pub struct AssetDownloader {
    http_client: reqwest::Client,
    audio: DownloadLimits,
    image: DownloadLimits,
}

impl AssetDownloader {
    pub fn new(http_client: reqwest::Client, audio: DownloadLimits, image: DownloadLimits) -> Self {
        Self {
            http_client,
            audio,
            image,
        }
    }

    pub fn from_config(http_client: reqwest::Client, config: &AcquisitionConfig) -> Self {
        Self::new(
            http_client,
            DownloadLimits {
                timeout: Duration::from_secs(config.audio_timeout_secs),
                max_bytes: config.max_audio_bytes,
            },
            DownloadLimits {
                timeout: Duration::from_secs(config.image_timeout_secs),
                max_bytes: config.max_image_bytes,
            },
        )
    }

    pub fn limits(&self, kind: AssetKind) -> DownloadLimits {
        match kind {
            AssetKind::Audio => self.audio,
            AssetKind::Image => self.image,
        }
    }

    /// Download `url` into a new file in `scope`
    pub async fn download(
        &self,
        url: &str,
        kind: AssetKind,
        scope: &mut ResourceScope,
    ) -> AcquireResult<DownloadedAsset> {
        let limits = self.limits(kind);
        let part_path = scope.allocate(kind, "part")?;

        debug!(url = %url, kind = kind.as_str(), path = %part_path.display(), "Downloading asset");

        let (byte_size, sniffed) = match self.stream_to_file(url, &part_path, limits).await {
            Ok(result) => result,
            Err(e) => {
                scope.discard(&part_path).await;
                warn!(url = %url, error = %e, "Asset download failed");
                return Err(e);
            }
        };

        let extension = sniffed
            .filter(|ext| kind_accepts(kind, ext))
            .or_else(|| extension_from_url(url, kind))
            .unwrap_or_else(|| kind.default_extension());

        let local_path = match scope.finalize(&part_path, extension).await {
            Ok(path) => path,
            Err(e) => {
                scope.discard(&part_path).await;
                return Err(e);
            }
        };

        info!(
            url = %url,
            kind = kind.as_str(),
            bytes = byte_size,
            path = %local_path.display(),
            "Asset downloaded"
        );

        Ok(DownloadedAsset {
            kind,
            source_url: url.to_string(),
            local_path,
            byte_size,
        })
    }

    async fn stream_to_file(
        &self,
        url: &str,
        path: &Path,
        limits: DownloadLimits,
    ) -> AcquireResult<(u64, Option<&'static str>)> {
        let response = self
            .http_client
            .get(url)
            .timeout(limits.timeout)
            .send()
            .await
            .map_err(|e| AcquireError::download_failed(url, describe_reqwest_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AcquireError::download_failed(url, format!("HTTP {}", status)));
        }

        if let Some(length) = response.content_length() {
            if length > limits.max_bytes {
                return Err(AcquireError::download_failed(
                    url,
                    format!("declared size {} exceeds limit {}", length, limits.max_bytes),
                ));
            }
        }

        let mut file = tokio::fs::File::create(path).await.map_err(|e| {
            AcquireError::ResourceFatal(format!("cannot create {}: {}", path.display(), e))
        })?;

        let mut stream = response.bytes_stream();
        let mut total: u64 = 0;
        let mut sniffed = None;

        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| AcquireError::download_failed(url, describe_reqwest_error(&e)))?;

            if total == 0 && !chunk.is_empty() {
                sniffed = infer::get(&chunk).map(|t| t.extension());
            }

            total += chunk.len() as u64;
            if total > limits.max_bytes {
                return Err(AcquireError::download_failed(
                    url,
                    format!("payload exceeds limit {}", limits.max_bytes),
                ));
            }

            file.write_all(&chunk).await.map_err(|e| {
                AcquireError::ResourceFatal(format!("cannot write {}: {}", path.display(), e))
            })?;
        }

        file.flush().await.map_err(|e| {
            AcquireError::ResourceFatal(format!("cannot flush {}: {}", path.display(), e))
        })?;

        if total == 0 {
            return Err(AcquireError::download_failed(url, "empty payload"));
        }

        Ok((total, sniffed))
    }
}

fn describe_reqwest_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("timeout: {}", err)
    } else {
        err.to_string()
    }
}

fn kind_accepts(kind: AssetKind, extension: &str) -> bool {
    kind.known_extensions().contains(&extension)
}

/// Extension of the URL's last path segment, if it is known for `kind`
pub fn extension_from_url(url: &str, kind: AssetKind) -> Option<&'static str> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.next_back()?;
    let (_, ext) = segment.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();

    kind.known_extensions()
        .iter()
        .find(|known| **known == ext)
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_from_url() {
        assert_eq!(
            extension_from_url("https://x.org/a/song.OGG?dl=1", AssetKind::Audio),
            Some("ogg")
        );
        assert_eq!(
            extension_from_url("https://x.org/a/cover.png", AssetKind::Image),
            Some("png")
        );
        assert_eq!(extension_from_url("https://x.org/a/track", AssetKind::Audio), None);
        assert_eq!(
            extension_from_url("https://x.org/a/cover.png", AssetKind::Audio),
            None
        );
        assert_eq!(extension_from_url("not a url", AssetKind::Audio), None);
    }

    #[test]
    fn test_limits_from_config() {
        let config = AcquisitionConfig {
            max_audio_bytes: 10,
            max_image_bytes: 5,
            ..AcquisitionConfig::default()
        };
        let downloader = AssetDownloader::from_config(reqwest::Client::new(), &config);
        assert_eq!(downloader.limits(AssetKind::Audio).max_bytes, 10);
        assert_eq!(downloader.limits(AssetKind::Image).max_bytes, 5);
        assert_eq!(
            downloader.limits(AssetKind::Audio).timeout,
            Duration::from_secs(60)
        );
    }
}
