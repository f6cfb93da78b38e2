//! HTML scrape adapter
//!
//! Fetches a configured page (with `{query}` replaced by the URL-encoded
//! search terms) and collects links to audio files. Anchors are preferred
//! because their text usually carries "Artist - Title"; bare audio URLs in
//! scripts or JSON blobs are picked up as a second pass.

use super::{finish_results, is_audio_url, matches_constraints, split_artist_title, UNKNOWN_ARTIST};
use crate::error::AcquireResult;
use crate::types::{Candidate, Constraints, SourceAdapter, SourceKind};
use async_trait::async_trait;
use moodpost_common::text::{strip_markup, unescape_entities};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;
use url::Url;

static ANCHOR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a>"#).expect("valid anchor pattern")
});

static AUDIO_URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)https?://[^\s"'<>\\]+?\.(?:mp3|ogg|wav|flac|m4a)(?:\?[^\s"'<>\\]*)?"#)
        .expect("valid audio URL pattern")
});

/// Placeholder replaced by the encoded search terms in page URLs
pub const QUERY_PLACEHOLDER: &str = "{query}";

/// Page-scraping track source
pub struct ScrapeAdapter {
    id: String,
    url_template: String,
    http_client: reqwest::Client,
    timeout: Duration,
}

impl ScrapeAdapter {
    pub fn new(
        id: impl Into<String>,
        url_template: impl Into<String>,
        http_client: reqwest::Client,
        timeout: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            url_template: url_template.into(),
            http_client,
            timeout,
        }
    }

    /// Page URL for the given constraints
    pub fn page_url(&self, constraints: &Constraints) -> String {
        if !self.url_template.contains(QUERY_PLACEHOLDER) {
            return self.url_template.clone();
        }
        let terms = constraints.search_terms().join(" ");
        let encoded: String = url::form_urlencoded::byte_serialize(terms.as_bytes()).collect();
        self.url_template.replace(QUERY_PLACEHOLDER, &encoded)
    }

    /// Extract constraint-matching candidates from an HTML document
    pub fn parse(&self, page_url: &str, html: &str, constraints: &Constraints) -> Vec<Candidate> {
        let base = Url::parse(page_url).ok();
        let mut seen_urls = HashSet::new();
        let mut candidates = Vec::new();

        for captures in ANCHOR_PATTERN.captures_iter(html) {
            let href = unescape_entities(&captures[1]);
            let Some(absolute) = resolve(base.as_ref(), &href) else {
                continue;
            };
            if !is_audio_url(&absolute) || !seen_urls.insert(absolute.clone()) {
                continue;
            }

            let label = strip_markup(&captures[2]);
            let label = if label.is_empty() {
                filename_label(&absolute)
            } else {
                label
            };
            candidates.push(self.candidate(&label, absolute));
        }

        let unescaped = html.replace("\\/", "/");
        for found in AUDIO_URL_PATTERN.find_iter(&unescaped) {
            let Some(url) = resolve(None, &unescape_entities(found.as_str())) else {
                continue;
            };
            if !seen_urls.insert(url.clone()) {
                continue;
            }
            let label = filename_label(&url);
            candidates.push(self.candidate(&label, url));
        }

        let filtered = candidates
            .into_iter()
            .filter(|c| {
                let genre_text = format!("{} {} {}", c.title, c.artist, c.asset_url);
                let language_text = format!("{} {}", c.title, c.artist);
                matches_constraints(constraints, &genre_text, &language_text)
            })
            .collect();

        finish_results(filtered, constraints)
    }

    fn candidate(&self, label: &str, url: String) -> Candidate {
        let (artist, title) = split_artist_title(label);
        Candidate::new(title, artist, url, self.id.as_str())
    }
}

/// Absolute URL in its normalised form
///
/// Hosts are lowercased, default ports dropped and non-ASCII path bytes
/// percent-encoded, so the same file found twice compares equal.
fn resolve(base: Option<&Url>, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    match Url::parse(href) {
        Ok(url) => Some(url.to_string()),
        Err(_) => base?.join(href).ok().map(|u| u.to_string()),
    }
}

/// Human-ish label from the last URL path segment
fn filename_label(url: &str) -> String {
    let segment = Url::parse(url)
        .ok()
        .and_then(|u| u.path_segments().and_then(|mut s| s.next_back().map(String::from)))
        .unwrap_or_default();

    let decoded: String = url::form_urlencoded::parse(segment.as_bytes())
        .map(|(k, v)| if v.is_empty() { k.into_owned() } else { format!("{}={}", k, v) })
        .collect::<Vec<_>>()
        .join("&");

    let stem = decoded.rsplit_once('.').map_or(decoded.as_str(), |(stem, _)| stem);
    let label = stem.replace('_', " ").trim().to_string();

    if label.is_empty() {
        UNKNOWN_ARTIST.to_string()
    } else {
        label
    }
}

#[async_trait]
impl SourceAdapter for ScrapeAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Scrape
    }

    async fn fetch(&self, constraints: &Constraints) -> AcquireResult<Vec<Candidate>> {
        let page_url = self.page_url(constraints);
        let body = super::fetch_document(&self.http_client, &self.id, &page_url, self.timeout).await?;
        let html = String::from_utf8_lossy(&body);
        let candidates = self.parse(&page_url, &html, constraints);

        debug!(
            provider = %self.id,
            tier = %constraints.tier,
            count = candidates.len(),
            "Page scraped"
        );
        Ok(candidates)
    }
}
