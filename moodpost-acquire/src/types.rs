//! Core Types and Trait Definitions for moodpost-acquire
//!
//! Defines the data model that flows through one acquisition and the two
//! provider seams:
//! - [`SourceAdapter`]: discovers audio track candidates (feed, search API, scrape)
//! - [`ImageSource`]: resolves a cover image URL for a genre
//!
//! # Lifecycle
//! [`Candidate`]s are ephemeral and die at the dedup boundary. A
//! [`DownloadedAsset`] owns one file inside the acquisition's
//! [`ResourceScope`]; the scope travels inside the [`ContentBundle`] until
//! the caller releases it.

use crate::error::AcquireResult;
use crate::services::lifecycle::ResourceScope;
use chrono::{DateTime, Utc};
use moodpost_common::text::normalize;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

// ============================================================================
// Request
// ============================================================================

/// Genre/language pair for one acquisition call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRequest {
    pub genre: String,
    pub language: String,
}

impl ContentRequest {
    /// Create request; both values must be non-blank
    pub fn new(genre: impl Into<String>, language: impl Into<String>) -> moodpost_common::Result<Self> {
        let genre = genre.into().trim().to_string();
        let language = language.into().trim().to_lowercase();

        if genre.is_empty() {
            return Err(moodpost_common::Error::InvalidInput("genre must not be empty".into()));
        }
        if language.is_empty() {
            return Err(moodpost_common::Error::InvalidInput("language must not be empty".into()));
        }

        Ok(Self { genre, language })
    }
}

// ============================================================================
// Tiers and constraints
// ============================================================================

/// Ordered fallback stage identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TierId {
    /// Genre + language constrained query
    GenreAndLanguage,
    /// Genre dropped
    LanguageOnly,
    /// No constraints, provider's popular ordering
    Unconstrained,
    /// Anything at all, then the static list
    BestEffort,
}

impl TierId {
    /// All tiers in execution order
    pub const ALL: [TierId; 4] = [
        TierId::GenreAndLanguage,
        TierId::LanguageOnly,
        TierId::Unconstrained,
        TierId::BestEffort,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TierId::GenreAndLanguage => "genre+language",
            TierId::LanguageOnly => "language-only",
            TierId::Unconstrained => "unconstrained",
            TierId::BestEffort => "best-effort",
        }
    }
}

impl fmt::Display for TierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result ordering requested from a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordering {
    /// Best match for the query first
    Relevance,
    /// Provider's default "popular" ordering
    Popular,
    /// Random order (best-effort sampling)
    Shuffled,
}

/// Query constraints handed to a [`SourceAdapter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraints {
    /// Tier issuing the query
    pub tier: TierId,
    pub genre: Option<String>,
    pub language: Option<String>,
    pub ordering: Ordering,
    /// Number of candidates still missing; adapters may return more
    pub limit: usize,
}

impl Constraints {
    /// Keyword terms for search-style providers
    pub fn search_terms(&self) -> Vec<&str> {
        self.genre
            .iter()
            .chain(self.language.iter())
            .map(String::as_str)
            .collect()
    }
}

// ============================================================================
// Candidates
// ============================================================================

/// Deduplication identity: `normalize(title) + "::" + normalize(artist)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn new(title: &str, artist: &str) -> Self {
        Self(format!("{}::{}", normalize(title), normalize(artist)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Discovered track metadata plus an asset URL, before download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    pub artist: String,
    pub asset_url: String,
    pub provider_id: String,
    /// Set by the discovery engine when the candidate is accepted
    pub tier_id: Option<TierId>,
    /// Genre/mood tags reported by the provider
    pub tags: Vec<String>,
}

impl Candidate {
    pub fn new(
        title: impl Into<String>,
        artist: impl Into<String>,
        asset_url: impl Into<String>,
        provider_id: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            asset_url: asset_url.into(),
            provider_id: provider_id.into(),
            tier_id: None,
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey::new(&self.title, &self.artist)
    }
}

/// Ordered set of candidates unique by [`IdentityKey`]
#[derive(Debug, Default)]
pub struct CandidatePool {
    candidates: Vec<Candidate>,
    seen: HashSet<IdentityKey>,
}

impl CandidatePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert if the identity is new; returns whether it was inserted
    pub fn insert(&mut self, candidate: Candidate) -> bool {
        if self.seen.insert(candidate.identity_key()) {
            self.candidates.push(candidate);
            true
        } else {
            false
        }
    }

    /// Insert all, returning the number of new identities
    pub fn extend(&mut self, candidates: impl IntoIterator<Item = Candidate>) -> usize {
        let mut added = 0;
        for candidate in candidates {
            if self.insert(candidate) {
                added += 1;
            }
        }
        added
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.seen.contains(key)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn into_vec(self) -> Vec<Candidate> {
        self.candidates
    }
}

// ============================================================================
// Assets and bundles
// ============================================================================

/// Binary asset category; selects limits and default file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Audio,
    Image,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Audio => "audio",
            AssetKind::Image => "image",
        }
    }

    pub fn default_extension(&self) -> &'static str {
        match self {
            AssetKind::Audio => "mp3",
            AssetKind::Image => "jpg",
        }
    }

    /// Extensions accepted when taken from a URL path
    pub fn known_extensions(&self) -> &'static [&'static str] {
        match self {
            AssetKind::Audio => &["mp3", "ogg", "wav", "flac", "m4a"],
            AssetKind::Image => &["jpg", "jpeg", "png", "webp", "gif"],
        }
    }
}

/// One downloaded file inside an acquisition scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedAsset {
    pub kind: AssetKind,
    pub source_url: String,
    pub local_path: PathBuf,
    pub byte_size: u64,
}

/// Downloaded audio file with the candidate it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackAsset {
    pub candidate: Candidate,
    pub asset: DownloadedAsset,
}

/// Quote + image + tracks, ready for review and publishing
///
/// Owns the acquisition's temp directory. Call [`ContentBundle::release`]
/// (or `ContentBundleAssembler::release`) once the bundle is published or
/// discarded; dropping an unreleased bundle also removes the directory.
#[derive(Debug)]
pub struct ContentBundle {
    pub id: Uuid,
    pub request: ContentRequest,
    pub quote_text: String,
    pub image_asset: DownloadedAsset,
    /// Ordered, 1..=required entries
    pub track_assets: Vec<TrackAsset>,
    /// Fewer distinct tracks than requested
    pub degraded: bool,
    pub created_at: DateTime<Utc>,
    scope: ResourceScope,
}

impl ContentBundle {
    pub(crate) fn new(
        request: ContentRequest,
        quote_text: String,
        image_asset: DownloadedAsset,
        track_assets: Vec<TrackAsset>,
        degraded: bool,
        scope: ResourceScope,
    ) -> Self {
        Self {
            id: scope.id(),
            request,
            quote_text,
            image_asset,
            track_assets,
            degraded,
            created_at: Utc::now(),
            scope,
        }
    }

    /// Temp directory holding every file of this bundle
    pub fn directory(&self) -> &std::path::Path {
        self.scope.path()
    }

    pub fn is_released(&self) -> bool {
        self.scope.is_released()
    }

    /// Delete the bundle's temp directory
    ///
    /// Idempotent: returns `Ok(false)` when already released.
    pub async fn release(&mut self) -> AcquireResult<bool> {
        self.scope.release().await
    }
}

// ============================================================================
// Provider traits
// ============================================================================

/// Provider integration category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Feed,
    SearchApi,
    Scrape,
}

/// Track discovery provider
///
/// All variants normalise their results to [`Candidate`] so the discovery
/// engine stays adapter-agnostic.
///
/// # Example
/// ```rust,ignore
/// pub struct FixedAdapter(Vec<Candidate>);
///
/// #[async_trait::async_trait]
/// impl SourceAdapter for FixedAdapter {
///     fn id(&self) -> &str { "fixed" }
///     fn kind(&self) -> SourceKind { SourceKind::Feed }
///
///     async fn fetch(&self, _c: &Constraints) -> AcquireResult<Vec<Candidate>> {
///         Ok(self.0.clone())
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Provider id for provenance and logging
    fn id(&self) -> &str;

    fn kind(&self) -> SourceKind;

    /// Fetch candidates matching the constraints
    ///
    /// # Errors
    /// `AcquireError::SourceUnavailable` on network or parse failure. The
    /// engine logs it and treats the provider as having contributed nothing.
    async fn fetch(&self, constraints: &Constraints) -> AcquireResult<Vec<Candidate>>;
}

/// Cover image provider
#[async_trait::async_trait]
pub trait ImageSource: Send + Sync {
    fn id(&self) -> &str;

    /// Image URL for the genre, `None` when the provider has nothing
    async fn image_url(&self, genre: &str) -> AcquireResult<Option<String>>;
}

/// Image source that never yields anything; the fallback URL is used
pub struct NoImageSource;

#[async_trait::async_trait]
impl ImageSource for NoImageSource {
    fn id(&self) -> &str {
        "none"
    }

    async fn image_url(&self, _genre: &str) -> AcquireResult<Option<String>> {
        Ok(None)
    }
}
