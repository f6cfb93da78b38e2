//! Syndication feed adapter
//!
//! Reads RSS 2.0 feeds (with iTunes / Dublin Core extensions) and turns
//! items carrying an audio asset into candidates. Asset URL precedence:
//! enclosure, first audio URL in the description, then the item link when
//! it is itself an audio file.
//!
//! A channel `<language>` equal to the requested language satisfies the
//! language constraint for every item; otherwise item text is checked.

use super::{finish_results, is_audio_url, matches_constraints, split_artist_title};
use crate::error::{AcquireError, AcquireResult};
use crate::types::{Candidate, Constraints, SourceAdapter, SourceKind};
use async_trait::async_trait;
use moodpost_common::text::{collapse_whitespace, strip_markup, unescape_entities};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::debug;

static URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s"'<>]+"#).expect("valid URL pattern"));

/// Feed-backed track source
pub struct FeedAdapter {
    id: String,
    url: String,
    http_client: reqwest::Client,
    timeout: Duration,
}

impl FeedAdapter {
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        http_client: reqwest::Client,
        timeout: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            http_client,
            timeout,
        }
    }

    /// Parse a feed document into constraint-matching candidates
    pub fn parse(&self, body: &[u8], constraints: &Constraints) -> AcquireResult<Vec<Candidate>> {
        let channel = rss::Channel::read_from(body)
            .map_err(|e| AcquireError::source_unavailable(&self.id, format!("invalid feed: {}", e)))?;

        let channel_language = channel.language().map(primary_language_subtag);
        let declares_requested = constraints
            .language
            .as_deref()
            .is_some_and(|lang| channel_language.as_deref() == Some(lang.trim().to_lowercase().as_str()));
        let item_constraints = if declares_requested {
            Constraints {
                language: None,
                ..constraints.clone()
            }
        } else {
            constraints.clone()
        };

        let mut candidates = Vec::new();

        for item in channel.items() {
            let Some(raw_title) = item.title().filter(|t| !t.trim().is_empty()) else {
                continue;
            };
            let description = item.description().unwrap_or_default();

            let Some(asset_url) = asset_url_for(item, description) else {
                continue;
            };

            let explicit_artist = item
                .itunes_ext()
                .and_then(|ext| ext.author())
                .or_else(|| {
                    item.dublin_core_ext()
                        .and_then(|dc| dc.creators().first().map(String::as_str))
                })
                .or_else(|| item.author())
                .map(|a| collapse_whitespace(&unescape_entities(a)))
                .filter(|a| !a.is_empty());

            let (artist, title) = match explicit_artist {
                Some(artist) => (artist, collapse_whitespace(&unescape_entities(raw_title))),
                None => split_artist_title(raw_title),
            };

            let tags: Vec<String> = item
                .categories()
                .iter()
                .map(|c| collapse_whitespace(c.name()))
                .filter(|c| !c.is_empty())
                .collect();

            let genre_text = format!("{} {} {} {}", title, artist, tags.join(" "), asset_url);
            let language_text = format!("{} {} {}", title, artist, strip_markup(description));

            if !matches_constraints(&item_constraints, &genre_text, &language_text) {
                continue;
            }

            candidates.push(Candidate::new(title, artist, asset_url, self.id.as_str()).with_tags(tags));
        }

        Ok(finish_results(candidates, constraints))
    }
}

/// `"uk-UA"` → `"uk"`
fn primary_language_subtag(tag: &str) -> String {
    tag.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

fn asset_url_for(item: &rss::Item, description: &str) -> Option<String> {
    if let Some(enclosure) = item.enclosure() {
        let url = enclosure.url().trim();
        if !url.is_empty() && (enclosure.mime_type().starts_with("audio/") || is_audio_url(url)) {
            return Some(url.to_string());
        }
    }

    let unescaped = unescape_entities(description);
    if let Some(found) = URL_PATTERN
        .find_iter(&unescaped)
        .map(|m| m.as_str())
        .find(|u| is_audio_url(u))
    {
        return Some(found.to_string());
    }

    item.link()
        .map(str::trim)
        .filter(|link| is_audio_url(link))
        .map(String::from)
}

#[async_trait]
impl SourceAdapter for FeedAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Feed
    }

    async fn fetch(&self, constraints: &Constraints) -> AcquireResult<Vec<Candidate>> {
        let body = super::fetch_document(&self.http_client, &self.id, &self.url, self.timeout).await?;
        let candidates = self.parse(&body, constraints)?;

        debug!(
            provider = %self.id,
            tier = %constraints.tier,
            count = candidates.len(),
            "Feed parsed"
        );
        Ok(candidates)
    }
}
