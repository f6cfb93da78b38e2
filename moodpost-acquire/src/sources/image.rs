//! Unsplash cover image source
//!
//! `GET {base}/photos/random?query=<genre> music mood&orientation=landscape`
//! authenticated with the access key as `client_id`. Without an access key the
//! source yields nothing and the configured fallback URL is used.

use crate::error::{AcquireError, AcquireResult};
use crate::types::ImageSource;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct RandomPhoto {
    urls: PhotoUrls,
}

#[derive(Debug, Default, Deserialize)]
struct PhotoUrls {
    #[serde(default)]
    regular: Option<String>,
    #[serde(default)]
    small: Option<String>,
}

pub struct UnsplashImageSource {
    base_url: String,
    access_key: Option<String>,
    http_client: reqwest::Client,
    timeout: Duration,
}

impl UnsplashImageSource {
    pub fn new(
        base_url: impl Into<String>,
        access_key: Option<String>,
        http_client: reqwest::Client,
        timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            access_key: access_key.filter(|k| !k.trim().is_empty()),
            http_client,
            timeout,
        }
    }

    pub fn search_query(genre: &str) -> String {
        format!("{} music mood", genre.trim())
    }
}

#[async_trait]
impl ImageSource for UnsplashImageSource {
    fn id(&self) -> &str {
        "unsplash"
    }

    async fn image_url(&self, genre: &str) -> AcquireResult<Option<String>> {
        let Some(key) = self.access_key.as_deref() else {
            debug!("Unsplash disabled: no access key");
            return Ok(None);
        };

        let url = format!("{}/photos/random", self.base_url.trim_end_matches('/'));
        let response = self
            .http_client
            .get(&url)
            .timeout(self.timeout)
            .query(&[
                ("query", Self::search_query(genre).as_str()),
                ("orientation", "landscape"),
                ("content_filter", "high"),
                ("client_id", key),
            ])
            .send()
            .await
            .map_err(|e| AcquireError::source_unavailable(self.id(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AcquireError::source_unavailable(self.id(), format!("HTTP {}", status)));
        }

        let photo: RandomPhoto = response
            .json()
            .await
            .map_err(|e| AcquireError::source_unavailable(self.id(), format!("invalid response: {}", e)))?;

        let chosen = photo
            .urls
            .small
            .or(photo.urls.regular)
            .filter(|u| !u.trim().is_empty());

        debug!(genre = %genre, found = chosen.is_some(), "Unsplash lookup");
        Ok(chosen)
    }
}
