//! Configuration loading and temp root resolution
//!
//! Bootstrap configuration comes from a single TOML file. Every section is
//! optional; a missing file is not an error and yields built-in defaults.
//!
//! # File location priority
//! 1. Explicit path (command-line argument / `MOODPOST_CONFIG`)
//! 2. `~/.config/moodpost/config.toml`
//! 3. `/etc/moodpost/config.toml` (Linux only)
//! 4. Built-in defaults

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default HTTP port for the acquisition service
pub const DEFAULT_PORT: u16 = 5731;

/// Image used whenever no image provider yields a usable URL
pub const DEFAULT_FALLBACK_IMAGE_URL: &str =
    "https://images.unsplash.com/photo-1470225620780-dba8ba36b745?w=900";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory under which per-acquisition temp directories are created
    #[serde(default)]
    pub temp_root: Option<PathBuf>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Acquisition limits and policies
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// External content providers
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Quote sources
    #[serde(default)]
    pub quotes: QuotesConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            temp_root: None,
            logging: LoggingConfig::default(),
            acquisition: AcquisitionConfig::default(),
            providers: ProvidersConfig::default(),
            quotes: QuotesConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// What to do when every tier together produced fewer unique tracks than required
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SingleTrackPolicy {
    /// Repeat the tracks found until the quota is filled
    DuplicateToFill,
    /// Return the short track list as a degraded bundle
    #[default]
    ReturnDegraded,
    /// Fail the acquisition with insufficient content
    Abort,
}

/// One entry of the built-in last-resort track list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StaticTrack {
    pub title: String,
    pub artist: String,
    pub url: String,
}

/// Acquisition limits and policies
#[derive(Debug, Clone, Deserialize)]
pub struct AcquisitionConfig {
    /// Number of audio tracks a complete bundle carries
    #[serde(default = "default_required_tracks")]
    pub required_tracks: usize,

    #[serde(default)]
    pub single_track_policy: SingleTrackPolicy,

    /// Deadline for one provider query (metadata fetch)
    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_secs: u64,

    /// Deadline for one audio download
    #[serde(default = "default_audio_timeout")]
    pub audio_timeout_secs: u64,

    /// Deadline for one image download
    #[serde(default = "default_image_timeout")]
    pub image_timeout_secs: u64,

    /// Overall deadline applied by the shared HTTP client
    #[serde(default = "default_client_timeout")]
    pub client_timeout_secs: u64,

    #[serde(default = "default_max_audio_bytes")]
    pub max_audio_bytes: u64,

    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,

    /// Replaces the built-in static track list when non-empty
    #[serde(default)]
    pub static_tracks: Vec<StaticTrack>,

    /// Held bundles older than this are released by the sweeper
    #[serde(default = "default_held_bundle_ttl")]
    pub held_bundle_ttl_secs: u64,

    /// Upper bound on bundles held at once; the oldest is released first
    #[serde(default = "default_max_held_bundles")]
    pub max_held_bundles: usize,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            required_tracks: default_required_tracks(),
            single_track_policy: SingleTrackPolicy::default(),
            provider_timeout_secs: default_provider_timeout(),
            audio_timeout_secs: default_audio_timeout(),
            image_timeout_secs: default_image_timeout(),
            client_timeout_secs: default_client_timeout(),
            max_audio_bytes: default_max_audio_bytes(),
            max_image_bytes: default_max_image_bytes(),
            static_tracks: Vec::new(),
            held_bundle_ttl_secs: default_held_bundle_ttl(),
            max_held_bundles: default_max_held_bundles(),
        }
    }
}

/// A named URL (syndication feed or scrape page)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NamedUrl {
    pub name: String,
    pub url: String,
}

impl NamedUrl {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// External content providers
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    /// Audio syndication feeds
    #[serde(default = "default_feeds")]
    pub feeds: Vec<NamedUrl>,

    /// HTML pages scraped for audio links; `{query}` is replaced by search terms
    #[serde(default)]
    pub scrape_pages: Vec<NamedUrl>,

    #[serde(default)]
    pub search: SearchApiConfig,

    #[serde(default)]
    pub image: ImageConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            feeds: default_feeds(),
            scrape_pages: Vec::new(),
            search: SearchApiConfig::default(),
            image: ImageConfig::default(),
        }
    }
}

/// Token-authenticated track search API
#[derive(Debug, Clone, Deserialize)]
pub struct SearchApiConfig {
    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    /// Public client id; the provider is disabled without one
    #[serde(default)]
    pub client_id: Option<String>,

    /// Enables the client-credentials exchange together with `token_url`
    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default)]
    pub token_url: Option<String>,

    /// Upper bound for the per-request result count
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Look up artist tags to refine genre matches
    #[serde(default = "default_true")]
    pub artist_lookup: bool,

    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

impl Default for SearchApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_search_base_url(),
            client_id: None,
            client_secret: None,
            token_url: None,
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            artist_lookup: true,
            requests_per_second: default_requests_per_second(),
        }
    }
}

/// Cover image provider
#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    #[serde(default)]
    pub unsplash_access_key: Option<String>,

    #[serde(default = "default_unsplash_base_url")]
    pub unsplash_base_url: String,

    #[serde(default = "default_fallback_image_url")]
    pub fallback_url: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            unsplash_access_key: None,
            unsplash_base_url: default_unsplash_base_url(),
            fallback_url: default_fallback_image_url(),
        }
    }
}

/// Quote sources
#[derive(Debug, Clone, Deserialize)]
pub struct QuotesConfig {
    /// Feeds whose item descriptions are candidate quotes
    #[serde(default)]
    pub feeds: Vec<NamedUrl>,

    /// Entries shorter than this (in characters) are skipped
    #[serde(default = "default_min_quote_length")]
    pub min_length: usize,
}

impl Default for QuotesConfig {
    fn default() -> Self {
        Self {
            feeds: Vec::new(),
            min_length: default_min_quote_length(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_required_tracks() -> usize {
    2
}

fn default_provider_timeout() -> u64 {
    20
}

fn default_audio_timeout() -> u64 {
    60
}

fn default_image_timeout() -> u64 {
    30
}

fn default_client_timeout() -> u64 {
    90
}

fn default_max_audio_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_max_image_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_held_bundle_ttl() -> u64 {
    3600
}

fn default_max_held_bundles() -> usize {
    32
}

fn default_feeds() -> Vec<NamedUrl> {
    vec![
        NamedUrl::new(
            "archive-opensource-audio",
            "https://archive.org/services/collection-rss.php?collection=opensource_audio",
        ),
        NamedUrl::new("fma-playlist", "https://freemusicarchive.org/playlist/rss"),
    ]
}

fn default_search_base_url() -> String {
    "https://api.jamendo.com/v3.0".to_string()
}

fn default_page_size() -> usize {
    50
}

fn default_max_pages() -> usize {
    2
}

fn default_true() -> bool {
    true
}

fn default_requests_per_second() -> u32 {
    2
}

fn default_unsplash_base_url() -> String {
    "https://api.unsplash.com".to_string()
}

fn default_fallback_image_url() -> String {
    DEFAULT_FALLBACK_IMAGE_URL.to_string()
}

fn default_min_quote_length() -> usize {
    40
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Read and parse a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Load configuration following the file location priority
    ///
    /// An explicitly requested file must exist. Otherwise a missing file
    /// produces a warning and built-in defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            info!("Loading configuration from {}", path.display());
            return Self::load(path);
        }

        match locate_config_file() {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::load(&path)
            }
            None => {
                warn!("No configuration file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Find the first existing default configuration file for the platform
pub fn locate_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("moodpost").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/moodpost/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Resolve the temp root following priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS temp directory joined with `moodpost`
pub fn resolve_temp_root(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_config: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.temp_root {
        return path.clone();
    }

    std::env::temp_dir().join("moodpost")
}

/// Resolve a secret with Environment → TOML priority
///
/// Blank values count as unset. A warning is logged when both sources
/// carry a value, since the TOML value is then silently ignored.
pub fn resolve_secret(env_var_name: &str, toml_value: Option<&str>, label: &str) -> Option<String> {
    let env_value = std::env::var(env_var_name)
        .ok()
        .filter(|v| is_valid_key(v));
    let toml_value = toml_value.filter(|v| is_valid_key(v));

    if env_value.is_some() && toml_value.is_some() {
        warn!(
            "{} found in environment and TOML config. Using environment (highest priority).",
            label
        );
    }

    if let Some(value) = env_value {
        info!("{} loaded from environment variable", label);
        return Some(value.trim().to_string());
    }

    if let Some(value) = toml_value {
        info!("{} loaded from TOML config", label);
        return Some(value.trim().to_string());
    }

    None
}

/// Validate key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
