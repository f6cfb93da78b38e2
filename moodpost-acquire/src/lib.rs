//! moodpost-acquire library interface
//!
//! Content acquisition pipeline: tiered track discovery over pluggable
//! sources, bounded asset downloads into per-acquisition temp directories,
//! quote composition, and the assembler that ties them into a
//! [`types::ContentBundle`]. The HTTP surface in [`api`] is what the binary
//! serves; integration tests drive it through [`build_router`].

pub mod api;
pub mod config;
pub mod discovery;
pub mod error;
pub mod models;
pub mod services;
pub mod sources;
pub mod types;

pub use crate::error::{AcquireError, AcquireResult, ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use services::ContentBundleAssembler;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use types::ContentBundle;
use uuid::Uuid;

/// Default age after which a held bundle is released
pub const DEFAULT_HELD_BUNDLE_TTL: Duration = Duration::from_secs(3600);

/// Default number of bundles held at once
pub const DEFAULT_MAX_HELD_BUNDLES: usize = 32;

/// Retention bounds for bundles awaiting release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeldBundleLimits {
    pub ttl: Duration,
    pub max_bundles: usize,
}

impl Default for HeldBundleLimits {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_HELD_BUNDLE_TTL,
            max_bundles: DEFAULT_MAX_HELD_BUNDLES,
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub assembler: Arc<ContentBundleAssembler>,
    /// Bundles awaiting publication or release, keyed by bundle id
    pub bundles: Arc<RwLock<HashMap<Uuid, ContentBundle>>>,
    pub limits: HeldBundleLimits,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last acquisition error, for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(assembler: ContentBundleAssembler) -> Self {
        Self {
            assembler: Arc::new(assembler),
            bundles: Arc::new(RwLock::new(HashMap::new())),
            limits: HeldBundleLimits::default(),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_limits(mut self, limits: HeldBundleLimits) -> Self {
        self.limits = HeldBundleLimits {
            ttl: limits.ttl,
            max_bundles: limits.max_bundles.max(1),
        };
        self
    }

    /// Hold a bundle until release, evicting the oldest ones over the cap
    pub async fn hold(&self, bundle: ContentBundle) {
        let evicted: Vec<ContentBundle> = {
            let mut bundles = self.bundles.write().await;
            let mut evicted = Vec::new();
            while bundles.len() >= self.limits.max_bundles {
                let Some(oldest) = bundles.values().min_by_key(|b| b.created_at).map(|b| b.id) else {
                    break;
                };
                evicted.extend(bundles.remove(&oldest));
            }
            bundles.insert(bundle.id, bundle);
            evicted
        };

        for bundle in &evicted {
            warn!(
                bundle_id = %bundle.id,
                max_bundles = self.limits.max_bundles,
                "Held bundle limit reached, releasing oldest"
            );
        }
        self.release_bundles(evicted).await;
    }

    /// Release bundles held longer than the TTL; returns how many were removed
    pub async fn sweep_expired(&self) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(self.limits.ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_sub_signed(ttl))
        else {
            return 0;
        };

        let expired: Vec<ContentBundle> = {
            let mut bundles = self.bundles.write().await;
            let ids: Vec<Uuid> = bundles
                .values()
                .filter(|b| b.created_at <= cutoff)
                .map(|b| b.id)
                .collect();
            ids.iter().filter_map(|id| bundles.remove(id)).collect()
        };

        if expired.is_empty() {
            return 0;
        }
        let released = self.release_bundles(expired).await;
        info!(released, "Released expired bundles");
        released
    }

    /// Periodically release expired bundles until the runtime shuts down
    pub fn spawn_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let state = self.clone();
        let period = (self.limits.ttl / 4).clamp(Duration::from_secs(1), Duration::from_secs(60));

        tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            loop {
                tick.tick().await;
                state.sweep_expired().await;
            }
        })
    }

    /// Release every held bundle; returns how many directories were removed
    pub async fn release_all(&self) -> usize {
        let drained: Vec<ContentBundle> = {
            let mut bundles = self.bundles.write().await;
            bundles.drain().map(|(_, bundle)| bundle).collect()
        };

        let released = self.release_bundles(drained).await;
        info!(released, "Released held bundles");
        released
    }

    async fn release_bundles(&self, bundles: Vec<ContentBundle>) -> usize {
        let mut released = 0;
        for mut bundle in bundles {
            match self.assembler.release(&mut bundle).await {
                Ok(true) => released += 1,
                Ok(false) => {}
                Err(e) => warn!(bundle_id = %bundle.id, error = %e, "Failed to release bundle"),
            }
        }
        released
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::bundle_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
