//! Track and image source adapters
//!
//! Three track provider variants implement [`SourceAdapter`]:
//! - [`feed::FeedAdapter`]: syndication feeds with audio enclosures/links
//! - [`search_api::SearchApiAdapter`]: token-authenticated keyword search API
//! - [`scrape::ScrapeAdapter`]: HTML pages with audio links
//!
//! Shared here: audio URL recognition, "Artist - Title" splitting, constraint
//! filtering and ordering, plus the fetch helper every adapter uses.
//!
//! [`SourceAdapter`]: crate::types::SourceAdapter

pub mod fallback;
pub mod feed;
pub mod image;
pub mod language;
pub mod scrape;
pub mod search_api;

use crate::error::{AcquireError, AcquireResult};
use crate::types::{Candidate, Constraints, Ordering};
use moodpost_common::text::{alphanumeric_fold, collapse_whitespace, unescape_entities};
use rand::seq::SliceRandom;
use std::time::Duration;

pub use fallback::{builtin_static_tracks, static_candidates, STATIC_PROVIDER_ID};
pub use feed::FeedAdapter;
pub use image::UnsplashImageSource;
pub use scrape::ScrapeAdapter;
pub use search_api::SearchApiAdapter;

/// Substrings identifying audio file URLs
pub const AUDIO_EXTENSIONS: [&str; 5] = [".mp3", ".ogg", ".wav", ".flac", ".m4a"];

/// Artist used when free text carries no recognisable artist part
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

const TITLE_SEPARATORS: [&str; 5] = [" - ", " — ", " – ", " —", "-"];

/// Whether the URL points at a known audio file type
pub fn is_audio_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    AUDIO_EXTENSIONS.iter().any(|ext| lower.contains(ext))
}

/// Split free text of the form "Artist - Title"
///
/// Returns `(artist, title)`; the artist is [`UNKNOWN_ARTIST`] when no
/// separator with non-empty sides is present.
pub fn split_artist_title(raw: &str) -> (String, String) {
    let cleaned = collapse_whitespace(&unescape_entities(raw));

    for separator in TITLE_SEPARATORS {
        if let Some((left, right)) = cleaned.split_once(separator) {
            let (left, right) = (left.trim(), right.trim());
            if !left.is_empty() && !right.is_empty() {
                return (left.to_string(), right.to_string());
            }
        }
    }

    (UNKNOWN_ARTIST.to_string(), cleaned)
}

/// Case-insensitive, punctuation-insensitive genre match
///
/// `"Lo-Fi"` matches `"lofi hip hop"`.
pub fn genre_matches(haystack: &str, genre: &str) -> bool {
    let needle = alphanumeric_fold(genre);
    !needle.is_empty() && alphanumeric_fold(haystack).contains(&needle)
}

/// Apply the genre/language constraints to one item
///
/// `genre_text` is matched for the genre (title, artist, tags, URL);
/// `language_text` is checked with the language heuristics (title, artist,
/// description). Absent constraints always pass.
pub fn matches_constraints(constraints: &Constraints, genre_text: &str, language_text: &str) -> bool {
    let genre_ok = constraints
        .genre
        .as_deref()
        .map_or(true, |genre| genre_matches(genre_text, genre));
    let language_ok = constraints
        .language
        .as_deref()
        .map_or(true, |lang| language::matches_language(language_text, lang));

    genre_ok && language_ok
}

/// Multiple of `limit` a provider may return, leaving room for duplicates
/// and download replacements
pub const RESULT_HEADROOM: usize = 4;

/// Order and truncate a provider's filtered result set
///
/// Providers return up to `limit * RESULT_HEADROOM` candidates; nothing is
/// dropped when the limit is zero.
pub fn finish_results(mut candidates: Vec<Candidate>, constraints: &Constraints) -> Vec<Candidate> {
    if constraints.ordering == Ordering::Shuffled {
        candidates.shuffle(&mut rand::thread_rng());
    }
    if constraints.limit > 0 {
        candidates.truncate(constraints.limit.saturating_mul(RESULT_HEADROOM));
    }
    candidates
}

/// GET a document as bytes, mapping every failure to `SourceUnavailable`
pub(crate) async fn fetch_document(
    http_client: &reqwest::Client,
    provider: &str,
    url: &str,
    timeout: Duration,
) -> AcquireResult<Vec<u8>> {
    let response = http_client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| AcquireError::source_unavailable(provider, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AcquireError::source_unavailable(
            provider,
            format!("HTTP {} from {}", status, url),
        ));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| AcquireError::source_unavailable(provider, e))?;

    Ok(body.to_vec())
}
