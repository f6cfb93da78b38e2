//! Test Helper Utilities
//!
//! Shared utilities for testing moodpost-acquire:
//! - a local fixture HTTP server (audio, image, feed, failure routes)
//! - a scripted search API server (token, track search, artist tags)
//! - scripted / failing / slow `SourceAdapter` fakes
//! - assembler construction over a temp root

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use moodpost_acquire::discovery::{ProviderCatalog, TrackDiscoveryEngine};
use moodpost_acquire::error::{AcquireError, AcquireResult};
use moodpost_acquire::services::{
    AssetDownloader, ContentBundleAssembler, DownloadLimits, QuoteComposer, ResourceLifecycleManager,
};
use moodpost_acquire::types::{Candidate, Constraints, ImageSource, SourceAdapter, SourceKind, TierId};
use moodpost_common::config::{SearchApiConfig, SingleTrackPolicy, StaticTrack};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Download ceiling used by test downloaders
pub const TEST_MAX_BYTES: u64 = 16 * 1024;

/// Fake MP3 payload (ID3 header + padding)
pub fn mp3_bytes() -> Vec<u8> {
    let mut bytes = b"ID3\x03\x00\x00\x00\x00\x00\x00".to_vec();
    bytes.extend(std::iter::repeat(0u8).take(2048));
    bytes
}

/// Fake JPEG payload (SOI + APP0 marker + padding)
pub fn jpeg_bytes() -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];
    bytes.extend(std::iter::repeat(0u8).take(1024));
    bytes
}

// ============================================================================
// Fixture server
// ============================================================================

/// Local HTTP server on an ephemeral port
pub struct FixtureServer {
    pub base: String,
}

#[derive(Clone)]
struct FixtureState {
    base: String,
    /// Names already served by `/once/:name`
    served_once: Arc<Mutex<HashSet<String>>>,
}

impl FixtureServer {
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let app = fixture_routes(base.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// URL of a downloadable fake MP3
    pub fn audio(&self, name: &str) -> String {
        self.url(&format!("/audio/{}.mp3", name))
    }

    /// URL of a fake MP3 that answers 404 after its first download
    pub fn audio_once(&self, name: &str) -> String {
        self.url(&format!("/once/{}.mp3", name))
    }
}

fn fixture_routes(base: String) -> Router {
    let state = FixtureState {
        base,
        served_once: Arc::new(Mutex::new(HashSet::new())),
    };

    Router::new()
        .route("/audio/:name", get(audio))
        .route("/once/:name", get(audio_once))
        .route("/image", get(image))
        .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
        .route("/empty", get(|| async { StatusCode::OK }))
        .route("/large", get(|| async { vec![0u8; (TEST_MAX_BYTES * 4) as usize] }))
        .route("/slow", get(slow))
        .route("/feed.xml", get(feed))
        .route("/page.html", get(page))
        .route("/quotes.xml", get(quotes_mixed))
        .route("/quotes-en.xml", get(quotes_english))
        .with_state(state)
}

async fn audio(Path(_name): Path<String>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "audio/mpeg")], mp3_bytes())
}

async fn audio_once(State(state): State<FixtureState>, Path(name): Path<String>) -> Response {
    if state.served_once.lock().unwrap().insert(name) {
        audio(Path(String::new())).await.into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn image() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/jpeg")], jpeg_bytes())
}

async fn slow() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_secs(10)).await;
    mp3_bytes()
}

async fn feed(State(FixtureState { base, .. }): State<FixtureState>) -> impl IntoResponse {
    let body = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Fixture feed</title>
    <link>{base}/</link>
    <description>Fixture</description>
    <item>
      <title>Гурт А - Київський лоуфай</title>
      <enclosure url="{base}/audio/kyiv.mp3" length="2058" type="audio/mpeg"/>
      <category>lofi</category>
    </item>
    <item>
      <title>Band B - Night Drive</title>
      <enclosure url="{base}/audio/night.mp3" length="2058" type="audio/mpeg"/>
      <category>synthwave</category>
    </item>
    <item>
      <title>Band C - Broken Upload</title>
      <enclosure url="{base}/missing" length="0" type="audio/mpeg"/>
    </item>
  </channel>
</rss>"#
    );
    ([(header::CONTENT_TYPE, "application/rss+xml")], body)
}

/// Ukrainian quote served by `/quotes.xml`
pub const REMOTE_QUOTE_UK: &str = "Де згода в сімействі, там мир і тишина. Щасливі люди, блаженна сторона.";

/// English quote served by both quote feeds
pub const REMOTE_QUOTE_EN: &str = "Stay hungry. Stay foolish. Keep moving forward.";

fn quote_feed(entries: &[&str]) -> impl IntoResponse {
    let items: String = entries
        .iter()
        .map(|text| format!("<item><title>q</title><description>{}</description></item>", text))
        .collect();
    let body = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Quotes</title><link>https://quotes.test/</link><description>Quotes</description>{items}</channel></rss>"#
    );
    ([(header::CONTENT_TYPE, "application/rss+xml")], body)
}

async fn quotes_mixed() -> impl IntoResponse {
    quote_feed(&[REMOTE_QUOTE_EN, REMOTE_QUOTE_UK, "Too short"])
}

async fn quotes_english() -> impl IntoResponse {
    quote_feed(&[REMOTE_QUOTE_EN])
}

async fn page() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/html")],
        r#"<html><body>
            <a href="/audio/rain.mp3">Artist R - Lofi Rain</a>
            <a href="/about.html">About</a>
        </body></html>"#,
    )
}

// ============================================================================
// Search API server
// ============================================================================

/// Bearer token issued by the fixture token endpoint
pub const FIXTURE_TOKEN: &str = "fixture-token";

/// What the search API fixture answers
#[derive(Clone)]
pub struct SearchApiScript {
    /// Full result list, paged by `offset`/`limit`
    pub tracks: Vec<Value>,
    /// Artist name to tags for `artists/musicinfo/`
    pub artist_tags: HashMap<String, Vec<String>>,
    /// `headers.status` of every response
    pub status: String,
    /// Answer 500 for every page after the first
    pub fail_after_first_page: bool,
}

impl SearchApiScript {
    pub fn new(tracks: Vec<Value>) -> Self {
        Self {
            tracks,
            artist_tags: HashMap::new(),
            status: "success".to_string(),
            fail_after_first_page: false,
        }
    }
}

/// Requests seen by the search API fixture
#[derive(Default)]
pub struct SearchApiLog {
    pub token_requests: AtomicUsize,
    pub track_offsets: Mutex<Vec<usize>>,
    pub artist_lookups: Mutex<Vec<String>>,
    pub bearers: Mutex<Vec<String>>,
}

impl SearchApiLog {
    pub fn token_requests(&self) -> usize {
        self.token_requests.load(AtomicOrdering::SeqCst)
    }

    pub fn track_offsets(&self) -> Vec<usize> {
        self.track_offsets.lock().unwrap().clone()
    }

    pub fn artist_lookups(&self) -> Vec<String> {
        self.artist_lookups.lock().unwrap().clone()
    }

    pub fn bearers(&self) -> Vec<String> {
        self.bearers.lock().unwrap().clone()
    }
}

#[derive(Clone)]
struct SearchApiState {
    script: Arc<SearchApiScript>,
    log: Arc<SearchApiLog>,
}

/// Local search API on an ephemeral port
pub struct SearchApiServer {
    pub base: String,
    pub log: Arc<SearchApiLog>,
}

impl SearchApiServer {
    pub async fn start(script: SearchApiScript) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let log = Arc::new(SearchApiLog::default());

        let state = SearchApiState {
            script: Arc::new(script),
            log: Arc::clone(&log),
        };
        let app = Router::new()
            .route("/token", post(api_token))
            .route("/tracks/", get(api_tracks))
            .route("/artists/musicinfo/", get(api_artist))
            .with_state(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base, log }
    }

    /// Adapter config pointing at this server
    ///
    /// `with_secret` enables the client-credentials exchange.
    pub fn config(&self, with_secret: bool) -> SearchApiConfig {
        SearchApiConfig {
            base_url: self.base.clone(),
            client_id: Some("fixture-client".to_string()),
            client_secret: with_secret.then(|| "fixture-secret".to_string()),
            token_url: with_secret.then(|| format!("{}/token", self.base)),
            page_size: 10,
            max_pages: 3,
            artist_lookup: true,
            requests_per_second: 100,
        }
    }
}

/// One `tracks/` result entry
pub fn api_track(name: &str, artist: &str, lang: &str, genres: &[&str]) -> Value {
    json!({
        "id": name,
        "name": name,
        "artist_name": artist,
        "audio": format!("https://cdn.test/{}.mp3", name.replace(' ', "_")),
        "audiodownload": "",
        "musicinfo": { "lang": lang, "tags": { "genres": genres, "vartags": [] } }
    })
}

fn api_headers(status: &str) -> Value {
    let error_message = if status == "success" { "" } else { "Your credential is not authorized." };
    json!({ "status": status, "code": 0, "error_message": error_message })
}

fn record_bearer(log: &SearchApiLog, headers: &HeaderMap) {
    if let Some(value) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        log.bearers.lock().unwrap().push(value.to_string());
    }
}

async fn api_token(State(state): State<SearchApiState>) -> Json<Value> {
    state.log.token_requests.fetch_add(1, AtomicOrdering::SeqCst);
    Json(json!({ "access_token": FIXTURE_TOKEN, "expires_in": 3600 }))
}

async fn api_tracks(
    State(state): State<SearchApiState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let offset: usize = params.get("offset").and_then(|v| v.parse().ok()).unwrap_or(0);
    let limit: usize = params.get("limit").and_then(|v| v.parse().ok()).unwrap_or(10);
    state.log.track_offsets.lock().unwrap().push(offset);
    record_bearer(&state.log, &headers);

    if state.script.fail_after_first_page && offset > 0 {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let results: Vec<Value> = state.script.tracks.iter().skip(offset).take(limit).cloned().collect();
    Json(json!({ "headers": api_headers(&state.script.status), "results": results })).into_response()
}

async fn api_artist(
    State(state): State<SearchApiState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Json<Value> {
    let name = params.get("name").cloned().unwrap_or_default();
    state.log.artist_lookups.lock().unwrap().push(name.clone());
    record_bearer(&state.log, &headers);

    let tags = state.script.artist_tags.get(&name).cloned().unwrap_or_default();
    Json(json!({
        "headers": api_headers(&state.script.status),
        "results": [{ "name": name, "musicinfo": { "tags": tags } }]
    }))
}

// ============================================================================
// Fake adapters
// ============================================================================

/// Candidate with the given provenance
pub fn candidate(title: &str, artist: &str, url: &str, provider: &str) -> Candidate {
    Candidate::new(title, artist, url, provider)
}

/// Adapter answering from a per-tier script and recording the tiers queried
pub struct ScriptedAdapter {
    id: String,
    script: HashMap<TierId, Vec<Candidate>>,
    calls: Arc<Mutex<Vec<TierId>>>,
}

impl ScriptedAdapter {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            script: HashMap::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Items returned for `tier`; tiers without a script return nothing
    pub fn on(mut self, tier: TierId, items: Vec<Candidate>) -> Self {
        self.script.insert(tier, items);
        self
    }

    pub fn call_log(&self) -> Arc<Mutex<Vec<TierId>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Feed
    }

    async fn fetch(&self, constraints: &Constraints) -> AcquireResult<Vec<Candidate>> {
        self.calls.lock().unwrap().push(constraints.tier);
        Ok(self.script.get(&constraints.tier).cloned().unwrap_or_default())
    }
}

/// Adapter that always fails
pub struct FailingAdapter;

#[async_trait]
impl SourceAdapter for FailingAdapter {
    fn id(&self) -> &str {
        "failing"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::SearchApi
    }

    async fn fetch(&self, _constraints: &Constraints) -> AcquireResult<Vec<Candidate>> {
        Err(AcquireError::source_unavailable("failing", "connection refused"))
    }
}

/// Adapter that answers only after a delay
pub struct SlowAdapter {
    pub delay: Duration,
    pub items: Vec<Candidate>,
}

#[async_trait]
impl SourceAdapter for SlowAdapter {
    fn id(&self) -> &str {
        "slow"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Scrape
    }

    async fn fetch(&self, _constraints: &Constraints) -> AcquireResult<Vec<Candidate>> {
        tokio::time::sleep(self.delay).await;
        Ok(self.items.clone())
    }
}

/// Image source returning a fixed URL
pub struct FixedImageSource(pub Option<String>);

#[async_trait]
impl ImageSource for FixedImageSource {
    fn id(&self) -> &str {
        "fixed-image"
    }

    async fn image_url(&self, _genre: &str) -> AcquireResult<Option<String>> {
        Ok(self.0.clone())
    }
}

// ============================================================================
// Pipeline construction
// ============================================================================

/// Static list pointing at the fixture server
pub fn fixture_static_tracks(server: &FixtureServer) -> Vec<StaticTrack> {
    vec![
        StaticTrack {
            title: "Static One".into(),
            artist: "House Band".into(),
            url: server.audio("static-one"),
        },
        StaticTrack {
            title: "Static Two".into(),
            artist: "House Band".into(),
            url: server.audio("static-two"),
        },
    ]
}

/// Discovery engine over the standard tiers of `providers`
pub fn engine(
    providers: Vec<Arc<dyn SourceAdapter>>,
    static_tracks: Vec<StaticTrack>,
    policy: SingleTrackPolicy,
) -> TrackDiscoveryEngine {
    let catalog = providers
        .into_iter()
        .fold(ProviderCatalog::new(), |catalog, provider| catalog.with_provider(provider));

    TrackDiscoveryEngine::new(catalog.standard_tiers(), static_tracks)
        .with_policy(policy)
        .with_provider_timeout(Duration::from_secs(2))
}

/// Downloader with small limits and short timeouts
pub fn test_downloader() -> AssetDownloader {
    let limits = DownloadLimits {
        timeout: Duration::from_secs(2),
        max_bytes: TEST_MAX_BYTES,
    };
    AssetDownloader::new(reqwest::Client::new(), limits, limits)
}

/// Assembler over a temp root, offline quotes, fixture image
pub fn assembler(
    root: &std::path::Path,
    server: &FixtureServer,
    engine: TrackDiscoveryEngine,
) -> ContentBundleAssembler {
    ContentBundleAssembler::new(
        ResourceLifecycleManager::new(root),
        engine,
        test_downloader(),
        QuoteComposer::offline(),
    )
    .with_image_source(Arc::new(FixedImageSource(Some(server.url("/image")))))
    .with_fallback_image_url(server.url("/image"))
}

/// Number of entries directly under `dir`
pub fn entry_count(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}
