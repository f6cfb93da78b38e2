//! Tier descriptors and the provider catalogue
//!
//! A [`Tier`] pairs a constraint relaxation with the providers it queries.
//! Fallback order is the order of the `Vec<Tier>` handed to the engine;
//! adding a provider or reordering stages never touches engine control flow.

use crate::sources::{FeedAdapter, ScrapeAdapter, SearchApiAdapter};
use crate::types::{Constraints, ContentRequest, Ordering, SourceAdapter, TierId};
use moodpost_common::config::ProvidersConfig;
use std::sync::Arc;
use std::time::Duration;

/// Which request constraints a tier keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relaxation {
    pub keep_genre: bool,
    pub keep_language: bool,
    pub ordering: Ordering,
}

impl Relaxation {
    /// Standard relaxation for each tier id
    pub fn for_tier(id: TierId) -> Self {
        match id {
            TierId::GenreAndLanguage => Self {
                keep_genre: true,
                keep_language: true,
                ordering: Ordering::Relevance,
            },
            TierId::LanguageOnly => Self {
                keep_genre: false,
                keep_language: true,
                ordering: Ordering::Relevance,
            },
            TierId::Unconstrained => Self {
                keep_genre: false,
                keep_language: false,
                ordering: Ordering::Popular,
            },
            TierId::BestEffort => Self {
                keep_genre: false,
                keep_language: false,
                ordering: Ordering::Shuffled,
            },
        }
    }
}

/// One ordered fallback stage
#[derive(Clone)]
pub struct Tier {
    pub id: TierId,
    pub relaxation: Relaxation,
    pub providers: Vec<Arc<dyn SourceAdapter>>,
}

impl Tier {
    /// Tier with the standard relaxation for `id`
    pub fn new(id: TierId, providers: Vec<Arc<dyn SourceAdapter>>) -> Self {
        Self {
            id,
            relaxation: Relaxation::for_tier(id),
            providers,
        }
    }

    /// Query constraints for this tier, asking for `missing` more candidates
    pub fn constraints(&self, request: &ContentRequest, missing: usize) -> Constraints {
        Constraints {
            tier: self.id,
            genre: self.relaxation.keep_genre.then(|| request.genre.clone()),
            language: self.relaxation.keep_language.then(|| request.language.clone()),
            ordering: self.relaxation.ordering,
            limit: missing,
        }
    }
}

impl std::fmt::Debug for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tier")
            .field("id", &self.id)
            .field("relaxation", &self.relaxation)
            .field(
                "providers",
                &self.providers.iter().map(|p| p.id()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Ordered set of track providers
#[derive(Clone, Default)]
pub struct ProviderCatalog {
    providers: Vec<Arc<dyn SourceAdapter>>,
}

impl ProviderCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: Arc<dyn SourceAdapter>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn providers(&self) -> &[Arc<dyn SourceAdapter>] {
        &self.providers
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Catalogue from configuration
    ///
    /// Order: search API (when a client id is configured), feeds, scrape
    /// pages. Secrets in `config` must already be resolved.
    pub fn from_config(config: &ProvidersConfig, http_client: &reqwest::Client, timeout: Duration) -> Self {
        let mut catalog = Self::new();

        let search = SearchApiAdapter::new("search-api", config.search.clone(), http_client.clone(), timeout);
        if search.is_enabled() {
            catalog = catalog.with_provider(Arc::new(search));
        }

        for feed in &config.feeds {
            catalog = catalog.with_provider(Arc::new(FeedAdapter::new(
                format!("feed:{}", feed.name),
                feed.url.clone(),
                http_client.clone(),
                timeout,
            )));
        }

        for page in &config.scrape_pages {
            catalog = catalog.with_provider(Arc::new(ScrapeAdapter::new(
                format!("scrape:{}", page.name),
                page.url.clone(),
                http_client.clone(),
                timeout,
            )));
        }

        catalog
    }

    /// The four standard tiers, each querying every provider
    pub fn standard_tiers(&self) -> Vec<Tier> {
        TierId::ALL
            .iter()
            .map(|id| Tier::new(*id, self.providers.clone()))
            .collect()
    }
}
