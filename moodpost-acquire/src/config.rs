//! Service wiring from configuration
//!
//! Resolves provider secrets (Environment → TOML), builds the shared HTTP
//! client and assembles the acquisition pipeline.

use crate::discovery::{ProviderCatalog, TrackDiscoveryEngine};
use crate::error::{AcquireError, AcquireResult};
use crate::services::{AssetDownloader, ContentBundleAssembler, QuoteComposer, ResourceLifecycleManager};
use crate::sources::UnsplashImageSource;
use moodpost_common::config::{resolve_secret, AcquisitionConfig, ProvidersConfig, TomlConfig};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub const ENV_SEARCH_CLIENT_ID: &str = "MOODPOST_SEARCH_CLIENT_ID";
pub const ENV_SEARCH_CLIENT_SECRET: &str = "MOODPOST_SEARCH_CLIENT_SECRET";
pub const ENV_UNSPLASH_ACCESS_KEY: &str = "MOODPOST_UNSPLASH_ACCESS_KEY";
pub const ENV_TEMP_ROOT: &str = "MOODPOST_TEMP_ROOT";

/// User agent sent with every outbound request
pub fn user_agent() -> String {
    format!("moodpost/{}", env!("CARGO_PKG_VERSION"))
}

/// Provider configuration with secrets resolved
pub fn resolve_providers(config: &ProvidersConfig) -> ProvidersConfig {
    let mut resolved = config.clone();

    resolved.search.client_id = resolve_secret(
        ENV_SEARCH_CLIENT_ID,
        config.search.client_id.as_deref(),
        "Search API client id",
    );
    resolved.search.client_secret = resolve_secret(
        ENV_SEARCH_CLIENT_SECRET,
        config.search.client_secret.as_deref(),
        "Search API client secret",
    );
    resolved.image.unsplash_access_key = resolve_secret(
        ENV_UNSPLASH_ACCESS_KEY,
        config.image.unsplash_access_key.as_deref(),
        "Unsplash access key",
    );

    resolved
}

/// Shared HTTP client
pub fn build_http_client(config: &AcquisitionConfig) -> AcquireResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent())
        .timeout(Duration::from_secs(config.client_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| AcquireError::ResourceFatal(format!("cannot build HTTP client: {}", e)))
}

/// Full acquisition pipeline from configuration
pub fn build_assembler(config: &TomlConfig, temp_root: &Path) -> AcquireResult<ContentBundleAssembler> {
    let acquisition = &config.acquisition;
    let providers = resolve_providers(&config.providers);
    let http_client = build_http_client(acquisition)?;
    let provider_timeout = Duration::from_secs(acquisition.provider_timeout_secs);

    let catalog = ProviderCatalog::from_config(&providers, &http_client, provider_timeout);
    info!(
        providers = catalog.providers().len(),
        temp_root = %temp_root.display(),
        policy = ?acquisition.single_track_policy,
        "Acquisition pipeline configured"
    );

    let discovery = TrackDiscoveryEngine::new(catalog.standard_tiers(), acquisition.static_tracks.clone())
        .with_policy(acquisition.single_track_policy)
        .with_provider_timeout(provider_timeout);

    let image_source = UnsplashImageSource::new(
        providers.image.unsplash_base_url.clone(),
        providers.image.unsplash_access_key.clone(),
        http_client.clone(),
        provider_timeout,
    );

    let assembler = ContentBundleAssembler::new(
        ResourceLifecycleManager::new(temp_root),
        discovery,
        AssetDownloader::from_config(http_client.clone(), acquisition),
        QuoteComposer::new(http_client, &config.quotes, provider_timeout),
    )
    .with_image_source(Arc::new(image_source))
    .with_fallback_image_url(providers.image.fallback_url.clone())
    .with_required_tracks(acquisition.required_tracks)
    .with_image_lookup_timeout(provider_timeout);

    Ok(assembler)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_carries_version() {
        assert!(user_agent().starts_with("moodpost/"));
    }

    #[test]
    fn test_build_assembler_from_defaults() {
        let root = tempfile::tempdir().unwrap();
        let config = TomlConfig::default();

        let assembler = build_assembler(&config, root.path()).unwrap();
        assert_eq!(assembler.required_tracks(), 2);
        assert_eq!(assembler.lifecycle().root(), root.path());
    }
}
