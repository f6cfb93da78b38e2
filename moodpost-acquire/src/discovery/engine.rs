//! Tiered track discovery
//!
//! Runs tiers strictly in order. Within a tier every provider is queried
//! concurrently under a per-call timeout; results are merged in provider
//! declaration order and deduplicated by identity key, then the quota is
//! checked once for the whole tier. Provider errors and timeouts are logged
//! and count as "contributed nothing".
//!
//! When every tier came up empty the static list is used. A shortfall
//! (fewer unique candidates than required) is resolved by the configured
//! [`SingleTrackPolicy`].

use super::tiers::Tier;
use crate::error::{AcquireError, AcquireResult};
use crate::sources::{builtin_static_tracks, static_candidates};
use crate::types::{Candidate, CandidatePool, Constraints, ContentRequest, SourceAdapter, TierId};
use futures::future::join_all;
use moodpost_common::config::{SingleTrackPolicy, StaticTrack};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default per-provider deadline
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(20);

/// Result of one discovery run
#[derive(Debug, Clone)]
pub struct DiscoveryOutcome {
    /// Unique candidates, at most `required`, in discovery order
    pub candidates: Vec<Candidate>,
    /// Further unique candidates, used to replace failed downloads
    pub reserve: Vec<Candidate>,
    /// Fewer unique candidates than required
    pub degraded: bool,
    /// Tiers actually queried, in order
    pub tiers_consulted: Vec<TierId>,
    /// The static list supplied the candidates
    pub used_static: bool,
}

/// Drives the tier list over the configured providers
pub struct TrackDiscoveryEngine {
    tiers: Vec<Tier>,
    static_tracks: Vec<StaticTrack>,
    policy: SingleTrackPolicy,
    provider_timeout: Duration,
}

impl TrackDiscoveryEngine {
    /// Engine over `tiers`; an empty `static_tracks` selects the built-in list
    pub fn new(tiers: Vec<Tier>, static_tracks: Vec<StaticTrack>) -> Self {
        let static_tracks = if static_tracks.is_empty() {
            builtin_static_tracks()
        } else {
            static_tracks
        };

        Self {
            tiers,
            static_tracks,
            policy: SingleTrackPolicy::default(),
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    pub fn with_policy(mut self, policy: SingleTrackPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn policy(&self) -> SingleTrackPolicy {
        self.policy
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Find up to `required` unique track candidates for the request
    ///
    /// # Errors
    /// `InsufficientContent` when nothing was found even in the static list,
    /// or on a shortfall under [`SingleTrackPolicy::Abort`].
    pub async fn discover(&self, request: &ContentRequest, required: usize) -> AcquireResult<DiscoveryOutcome> {
        let required = required.max(1);
        let mut pool = CandidatePool::new();
        let mut tiers_consulted = Vec::new();

        for tier in &self.tiers {
            let missing = required - pool.len();
            let constraints = tier.constraints(request, missing);
            tiers_consulted.push(tier.id);

            debug!(
                tier = %tier.id,
                providers = tier.providers.len(),
                missing,
                "Querying tier"
            );

            let results = join_all(
                tier.providers
                    .iter()
                    .map(|provider| self.query_provider(provider, &constraints)),
            )
            .await;

            let mut added = 0;
            for candidates in results {
                added += pool.extend(candidates);
            }

            info!(tier = %tier.id, added, total = pool.len(), "Tier complete");

            if pool.len() >= required {
                break;
            }
        }

        let mut used_static = false;
        if pool.is_empty() {
            let fallback = self.static_pool_entries();
            warn!(
                genre = %request.genre,
                language = %request.language,
                entries = fallback.len(),
                "All tiers empty, using static track list"
            );
            pool.extend(fallback);
            used_static = true;
        }

        if pool.is_empty() {
            return Err(AcquireError::InsufficientContent(format!(
                "no tracks found for genre '{}' / language '{}' and the static list is empty",
                request.genre, request.language
            )));
        }

        let mut candidates = pool.into_vec();
        let mut reserve = if candidates.len() > required {
            candidates.split_off(required)
        } else {
            Vec::new()
        };

        if !used_static {
            let mut seen = CandidatePool::new();
            seen.extend(candidates.iter().chain(reserve.iter()).cloned());
            reserve.extend(
                self.static_pool_entries()
                    .into_iter()
                    .filter(|c| seen.insert(c.clone())),
            );
        }

        let degraded = candidates.len() < required;
        if degraded && self.policy == SingleTrackPolicy::Abort {
            warn!(found = candidates.len(), required, "Track shortfall, aborting");
            return Err(AcquireError::InsufficientContent(format!(
                "only {} of {} tracks found",
                candidates.len(),
                required
            )));
        }

        info!(
            selected = candidates.len(),
            reserve = reserve.len(),
            degraded,
            used_static,
            "Discovery complete"
        );

        Ok(DiscoveryOutcome {
            candidates,
            reserve,
            degraded,
            tiers_consulted,
            used_static,
        })
    }

    async fn query_provider(&self, provider: &Arc<dyn SourceAdapter>, constraints: &Constraints) -> Vec<Candidate> {
        let fetched = tokio::time::timeout(self.provider_timeout, provider.fetch(constraints)).await;

        let candidates = match fetched {
            Ok(Ok(candidates)) => candidates,
            Ok(Err(e)) => {
                warn!(provider = %provider.id(), tier = %constraints.tier, error = %e, "Provider failed");
                return Vec::new();
            }
            Err(_) => {
                warn!(
                    provider = %provider.id(),
                    tier = %constraints.tier,
                    timeout_secs = self.provider_timeout.as_secs_f64(),
                    "Provider timed out"
                );
                return Vec::new();
            }
        };

        let total = candidates.len();
        let accepted: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| !c.asset_url.trim().is_empty())
            .map(|mut c| {
                c.tier_id = Some(constraints.tier);
                c
            })
            .collect();

        if accepted.len() < total {
            debug!(
                provider = %provider.id(),
                dropped = total - accepted.len(),
                "Dropped candidates without asset URL"
            );
        }

        accepted
    }

    fn static_pool_entries(&self) -> Vec<Candidate> {
        static_candidates(&self.static_tracks)
            .into_iter()
            .map(|mut c| {
                c.tier_id = Some(TierId::BestEffort);
                c
            })
            .collect()
    }
}
