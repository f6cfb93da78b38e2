//! Unit tests for configuration loading and resolution
//!
//! Covers:
//! - Missing TOML files fall back to defaults
//! - Priority order for temp root resolution (CLI → ENV → TOML → OS temp)
//! - Environment → TOML priority for secrets
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate MOODPOST_* variables are marked with #[serial].

use moodpost_common::config::{resolve_secret, resolve_temp_root, SingleTrackPolicy, TomlConfig};
use moodpost_common::Error;
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};

const TEMP_ROOT_VAR: &str = "MOODPOST_TEST_TEMP_ROOT";
const SECRET_VAR: &str = "MOODPOST_TEST_SECRET";

#[test]
fn test_load_full_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
        port = 6000
        temp_root = "/var/tmp/moodpost"

        [logging]
        level = "debug"

        [acquisition]
        required_tracks = 3
        single_track_policy = "abort"

        [[acquisition.static_tracks]]
        title = "Carefree"
        artist = "Kevin MacLeod"
        url = "https://example.org/carefree.mp3"

        [providers]
        feeds = [{ name = "local", url = "http://127.0.0.1/feed.xml" }]
        scrape_pages = [{ name = "page", url = "http://127.0.0.1/search?q={query}" }]

        [providers.search]
        client_id = "abc"
        max_pages = 1

        [providers.image]
        fallback_url = "http://127.0.0.1/cover.jpg"

        [quotes]
        min_length = 10
        "#,
    )
    .unwrap();

    let config = TomlConfig::load(&path).unwrap();
    assert_eq!(config.port, 6000);
    assert_eq!(config.temp_root, Some(PathBuf::from("/var/tmp/moodpost")));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.acquisition.required_tracks, 3);
    assert_eq!(config.acquisition.single_track_policy, SingleTrackPolicy::Abort);
    assert_eq!(config.acquisition.static_tracks.len(), 1);
    assert_eq!(config.providers.feeds.len(), 1);
    assert_eq!(config.providers.feeds[0].name, "local");
    assert_eq!(config.providers.scrape_pages.len(), 1);
    assert_eq!(config.providers.search.client_id.as_deref(), Some("abc"));
    assert_eq!(config.providers.search.max_pages, 1);
    assert_eq!(config.providers.search.page_size, 50);
    assert_eq!(config.providers.image.fallback_url, "http://127.0.0.1/cover.jpg");
    assert_eq!(config.quotes.min_length, 10);
}

#[test]
fn test_explicit_missing_file_is_error() {
    let result = TomlConfig::load_or_default(Some(Path::new("/nonexistent/moodpost.toml")));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_temp_root_cli_overrides_everything() {
    env::set_var(TEMP_ROOT_VAR, "/from/env");
    let mut config = TomlConfig::default();
    config.temp_root = Some(PathBuf::from("/from/toml"));

    let root = resolve_temp_root(Some(Path::new("/from/cli")), TEMP_ROOT_VAR, &config);
    assert_eq!(root, PathBuf::from("/from/cli"));

    env::remove_var(TEMP_ROOT_VAR);
}

#[test]
#[serial]
fn test_temp_root_env_overrides_toml() {
    env::set_var(TEMP_ROOT_VAR, "/from/env");
    let mut config = TomlConfig::default();
    config.temp_root = Some(PathBuf::from("/from/toml"));

    let root = resolve_temp_root(None, TEMP_ROOT_VAR, &config);
    assert_eq!(root, PathBuf::from("/from/env"));

    env::remove_var(TEMP_ROOT_VAR);
}

#[test]
#[serial]
fn test_temp_root_falls_back_to_os_temp() {
    env::remove_var(TEMP_ROOT_VAR);
    let root = resolve_temp_root(None, TEMP_ROOT_VAR, &TomlConfig::default());
    assert_eq!(root, env::temp_dir().join("moodpost"));
}

#[test]
#[serial]
fn test_secret_env_overrides_toml() {
    env::set_var(SECRET_VAR, "env-key");
    let value = resolve_secret(SECRET_VAR, Some("toml-key"), "test secret");
    assert_eq!(value.as_deref(), Some("env-key"));
    env::remove_var(SECRET_VAR);
}

#[test]
#[serial]
fn test_blank_env_secret_falls_back_to_toml() {
    env::set_var(SECRET_VAR, "   ");
    let value = resolve_secret(SECRET_VAR, Some("toml-key"), "test secret");
    assert_eq!(value.as_deref(), Some("toml-key"));
    env::remove_var(SECRET_VAR);
}

#[test]
#[serial]
fn test_secret_missing_everywhere() {
    env::remove_var(SECRET_VAR);
    assert!(resolve_secret(SECRET_VAR, None, "test secret").is_none());
    assert!(resolve_secret(SECRET_VAR, Some(""), "test secret").is_none());
}
