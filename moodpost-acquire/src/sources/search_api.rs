//! Keyword search API adapter
//!
//! Talks to a Jamendo-style track search API:
//! - `GET {base}/tracks/` with `client_id`, `search`, `order` and
//!   offset-based pagination (at most `max_pages` pages per fetch)
//! - optional OAuth2 client-credentials exchange; the bearer token is cached
//!   until shortly before it expires
//! - optional `GET {base}/artists/musicinfo/` lookups for near-misses whose
//!   track tags lack the genre but whose artist is tagged with it
//!
//! Requests are throttled with a token bucket. The adapter is disabled (and
//! contributes nothing) when no client id is configured.

use super::{finish_results, genre_matches, language::matches_language};
use crate::error::{AcquireError, AcquireResult};
use crate::types::{Candidate, Constraints, Ordering, SourceAdapter, SourceKind};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use moodpost_common::config::SearchApiConfig;
use serde::Deserialize;
use std::collections::HashSet;
use std::num::NonZeroU32;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Maximum artist tag lookups per fetch
pub const MAX_ARTIST_LOOKUPS: usize = 5;

/// Search text used when no constraint is left
const POPULAR_QUERY: &str = "popular";

/// Minimum per-request result count
const MIN_PAGE_LIMIT: usize = 10;

/// Tokens are refreshed this long before their reported expiry
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ApiHeaders {
    status: String,
    #[serde(default)]
    error_message: String,
}

#[derive(Debug, Deserialize)]
struct TrackResponse {
    headers: ApiHeaders,
    #[serde(default)]
    results: Vec<ApiTrack>,
}

#[derive(Debug, Deserialize)]
struct ApiTrack {
    name: String,
    #[serde(default)]
    artist_name: String,
    #[serde(default)]
    audio: String,
    #[serde(default)]
    audiodownload: String,
    #[serde(default)]
    musicinfo: Option<TrackMusicInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct TrackMusicInfo {
    #[serde(default)]
    lang: String,
    #[serde(default)]
    tags: TrackTags,
}

#[derive(Debug, Default, Deserialize)]
struct TrackTags {
    #[serde(default)]
    genres: Vec<String>,
    #[serde(default)]
    vartags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ArtistResponse {
    headers: ApiHeaders,
    #[serde(default)]
    results: Vec<ApiArtist>,
}

#[derive(Debug, Deserialize)]
struct ApiArtist {
    #[serde(default)]
    musicinfo: Option<ArtistMusicInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct ArtistMusicInfo {
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Search API track source
pub struct SearchApiAdapter {
    id: String,
    config: SearchApiConfig,
    http_client: reqwest::Client,
    timeout: Duration,
    rate_limiter: DefaultDirectRateLimiter,
    token: Mutex<Option<CachedToken>>,
}

impl SearchApiAdapter {
    pub fn new(
        id: impl Into<String>,
        config: SearchApiConfig,
        http_client: reqwest::Client,
        timeout: Duration,
    ) -> Self {
        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Self {
            id: id.into(),
            config,
            http_client,
            timeout,
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
            token: Mutex::new(None),
        }
    }

    /// Whether a client id is configured
    pub fn is_enabled(&self) -> bool {
        self.config
            .client_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty())
    }

    fn cached_token(&self) -> Option<String> {
        let guard = self.token.lock().ok()?;
        guard
            .as_ref()
            .filter(|t| t.expires_at > Instant::now())
            .map(|t| t.value.clone())
    }

    /// Bearer token, exchanging client credentials when needed
    ///
    /// `None` when no secret/token endpoint is configured.
    async fn bearer_token(&self, client_id: &str) -> AcquireResult<Option<String>> {
        let (Some(secret), Some(token_url)) = (
            self.config.client_secret.as_deref(),
            self.config.token_url.as_deref(),
        ) else {
            return Ok(None);
        };

        if let Some(token) = self.cached_token() {
            return Ok(Some(token));
        }

        self.rate_limiter.until_ready().await;
        debug!(provider = %self.id, "Exchanging client credentials");

        let response = self
            .http_client
            .post(token_url)
            .timeout(self.timeout)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id),
                ("client_secret", secret),
            ])
            .send()
            .await
            .map_err(|e| AcquireError::source_unavailable(&self.id, format!("token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AcquireError::source_unavailable(
                &self.id,
                format!("token endpoint returned {}", status),
            ));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AcquireError::source_unavailable(&self.id, format!("invalid token response: {}", e)))?;

        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        let expires_at = Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN);

        if let Ok(mut guard) = self.token.lock() {
            *guard = Some(CachedToken {
                value: token.access_token.clone(),
                expires_at,
            });
        }

        Ok(Some(token.access_token))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        bearer: Option<&str>,
    ) -> AcquireResult<T> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), path);
        let mut request = self.http_client.get(&url).timeout(self.timeout).query(query);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AcquireError::source_unavailable(&self.id, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AcquireError::source_unavailable(
                &self.id,
                format!("HTTP {} from {}", status, url),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| AcquireError::source_unavailable(&self.id, format!("invalid response: {}", e)))
    }

    fn check_headers(&self, headers: &ApiHeaders) -> AcquireResult<()> {
        if headers.status == "success" {
            Ok(())
        } else {
            Err(AcquireError::source_unavailable(
                &self.id,
                format!("API status '{}': {}", headers.status, headers.error_message),
            ))
        }
    }

    async fn track_page(&self, query: &[(&str, String)], bearer: Option<&str>) -> AcquireResult<TrackResponse> {
        let response: TrackResponse = self.get_json("tracks/", query, bearer).await?;
        self.check_headers(&response.headers)?;
        Ok(response)
    }

    async fn artist_tags(&self, client_id: &str, artist: &str, bearer: Option<&str>) -> AcquireResult<Vec<String>> {
        let query = [
            ("client_id", client_id.to_string()),
            ("format", "json".to_string()),
            ("name", artist.to_string()),
        ];
        let response: ArtistResponse = self.get_json("artists/musicinfo/", &query, bearer).await?;
        self.check_headers(&response.headers)?;

        Ok(response
            .results
            .into_iter()
            .filter_map(|a| a.musicinfo)
            .flat_map(|m| m.tags)
            .collect())
    }
}

fn order_param(ordering: Ordering) -> &'static str {
    match ordering {
        Ordering::Relevance => "relevance",
        Ordering::Popular | Ordering::Shuffled => "popularity_total",
    }
}

fn search_text(constraints: &Constraints) -> String {
    let terms = constraints.search_terms();
    if terms.is_empty() {
        POPULAR_QUERY.to_string()
    } else {
        terms.join(" ")
    }
}

fn page_limit(wanted: usize, page_size: usize) -> usize {
    (wanted * 4).max(MIN_PAGE_LIMIT).min(page_size.max(1))
}

fn language_ok(constraints: &Constraints, track_lang: &str, text: &str) -> bool {
    match constraints.language.as_deref() {
        None => true,
        Some(lang) => track_lang.eq_ignore_ascii_case(lang) || matches_language(text, lang),
    }
}

#[async_trait]
impl SourceAdapter for SearchApiAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::SearchApi
    }

    async fn fetch(&self, constraints: &Constraints) -> AcquireResult<Vec<Candidate>> {
        let Some(client_id) = self.config.client_id.as_deref().filter(|id| !id.trim().is_empty()) else {
            debug!(provider = %self.id, "Search API disabled: no client id");
            return Ok(Vec::new());
        };

        let bearer = self.bearer_token(client_id).await?;
        let wanted = constraints.limit.max(1);
        let limit = page_limit(wanted, self.config.page_size);

        let mut accepted = Vec::new();
        let mut genre_misses: Vec<Candidate> = Vec::new();

        for page in 0..self.config.max_pages.max(1) {
            let mut query = vec![
                ("client_id", client_id.to_string()),
                ("format", "json".to_string()),
                ("limit", limit.to_string()),
                ("offset", (page * limit).to_string()),
                ("include", "musicinfo".to_string()),
                ("audioformat", "mp32".to_string()),
                ("order", order_param(constraints.ordering).to_string()),
            ];
            query.push(("search", search_text(constraints)));

            let response = match self.track_page(&query, bearer.as_deref()).await {
                Ok(response) => response,
                Err(e) if page == 0 => return Err(e),
                Err(e) => {
                    warn!(
                        provider = %self.id,
                        page,
                        kept = accepted.len(),
                        error = %e,
                        "Search API page failed, keeping earlier pages"
                    );
                    break;
                }
            };
            let page_len = response.results.len();

            for track in response.results {
                let asset_url = if track.audiodownload.trim().is_empty() {
                    track.audio.trim().to_string()
                } else {
                    track.audiodownload.trim().to_string()
                };
                if asset_url.is_empty() || track.name.trim().is_empty() {
                    continue;
                }

                let info = track.musicinfo.unwrap_or_default();
                let tags: Vec<String> = info.tags.genres.into_iter().chain(info.tags.vartags).collect();
                let text = format!("{} {}", track.name, track.artist_name);

                if !language_ok(constraints, &info.lang, &text) {
                    continue;
                }

                let candidate = Candidate::new(track.name.trim(), track.artist_name.trim(), asset_url, self.id.as_str())
                    .with_tags(tags);

                let genre_text = format!("{} {}", text, candidate.tags.join(" "));
                match constraints.genre.as_deref() {
                    Some(genre) if !genre_matches(&genre_text, genre) => genre_misses.push(candidate),
                    _ => accepted.push(candidate),
                }
            }

            if accepted.len() >= wanted || page_len < limit {
                break;
            }
        }

        if let (Some(genre), true) = (constraints.genre.as_deref(), self.config.artist_lookup) {
            if accepted.len() < wanted && !genre_misses.is_empty() {
                let mut looked_up = HashSet::new();

                for candidate in genre_misses {
                    if accepted.len() >= wanted {
                        break;
                    }
                    if candidate.artist.is_empty() || !looked_up.insert(candidate.artist.clone()) {
                        continue;
                    }
                    if looked_up.len() > MAX_ARTIST_LOOKUPS {
                        break;
                    }

                    match self.artist_tags(client_id, &candidate.artist, bearer.as_deref()).await {
                        Ok(tags) if genre_matches(&tags.join(" "), genre) => accepted.push(candidate),
                        Ok(_) => {}
                        Err(e) => {
                            warn!(provider = %self.id, artist = %candidate.artist, error = %e, "Artist lookup failed");
                        }
                    }
                }
            }
        }

        debug!(
            provider = %self.id,
            tier = %constraints.tier,
            count = accepted.len(),
            "Search API results"
        );
        Ok(finish_results(accepted, constraints))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TierId;

    #[test]
    fn test_page_limit_bounds() {
        assert_eq!(page_limit(1, 50), 10);
        assert_eq!(page_limit(5, 50), 20);
        assert_eq!(page_limit(20, 50), 50);
        assert_eq!(page_limit(2, 0), 1);
    }

    #[test]
    fn test_search_text() {
        let mut c = Constraints {
            tier: TierId::GenreAndLanguage,
            genre: Some("lofi".into()),
            language: Some("uk".into()),
            ordering: Ordering::Relevance,
            limit: 2,
        };
        assert_eq!(search_text(&c), "lofi uk");
        c.genre = None;
        c.language = None;
        assert_eq!(search_text(&c), "popular");
    }

    #[test]
    fn test_order_param() {
        assert_eq!(order_param(Ordering::Relevance), "relevance");
        assert_eq!(order_param(Ordering::Popular), "popularity_total");
    }

    #[test]
    fn test_language_ok_prefers_reported_language() {
        let c = Constraints {
            tier: TierId::LanguageOnly,
            genre: None,
            language: Some("uk".into()),
            ordering: Ordering::Relevance,
            limit: 2,
        };
        assert!(language_ok(&c, "UK", "Morning song"));
        assert!(language_ok(&c, "", "Ранкова пісня"));
        assert!(!language_ok(&c, "en", "Morning song"));
    }

    #[test]
    fn test_disabled_without_client_id() {
        let adapter = SearchApiAdapter::new(
            "search",
            SearchApiConfig::default(),
            reqwest::Client::new(),
            Duration::from_secs(1),
        );
        assert!(!adapter.is_enabled());
    }

    #[test]
    fn test_track_response_parses() {
        let json = r#"{
            "headers": {"status": "success", "code": 0, "results_count": 1},
            "results": [{
                "id": "1", "name": "Night", "artist_name": "Band",
                "audio": "https://cdn.test/1.mp3", "audiodownload": "",
                "musicinfo": {"lang": "uk", "tags": {"genres": ["lounge"], "vartags": ["calm"]}}
            }]
        }"#;
        let parsed: TrackResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.headers.status, "success");
        let info = parsed.results[0].musicinfo.as_ref().unwrap();
        assert_eq!(info.tags.genres, vec!["lounge".to_string()]);
    }
}
