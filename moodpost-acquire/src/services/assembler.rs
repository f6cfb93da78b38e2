//! Content bundle assembler
//!
//! Top-level orchestrator for one acquisition:
//! 1. IDLE → ACQUIRING, open the acquisition's resource scope
//! 2. Track discovery, image lookup and quote composition run concurrently
//! 3. Download the selected tracks; a failed download is replaced by the
//!    next reserve candidate
//! 4. Apply the single-track policy to a shortfall
//! 5. Download the image (provider URL, then the fallback URL)
//! 6. READY with the bundle, or FAILED after the scope was released
//!
//! Only terminal errors (`InsufficientContent`, `ResourceFatal`) leave this
//! module; recoverable ones are logged and turned into "try next" here.

use crate::discovery::{DiscoveryOutcome, TrackDiscoveryEngine};
use crate::error::{AcquireError, AcquireResult};
use crate::models::{AcquisitionContext, AcquisitionState};
use crate::services::downloader::AssetDownloader;
use crate::services::lifecycle::{ResourceLifecycleManager, ResourceScope};
use crate::services::quote::QuoteComposer;
use crate::types::{
    AssetKind, ContentBundle, ContentRequest, DownloadedAsset, ImageSource, NoImageSource, TrackAsset,
};
use moodpost_common::config::{SingleTrackPolicy, DEFAULT_FALLBACK_IMAGE_URL};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Default number of tracks per bundle
pub const DEFAULT_REQUIRED_TRACKS: usize = 2;

/// Default deadline for the image URL lookup
pub const DEFAULT_IMAGE_LOOKUP_TIMEOUT: Duration = Duration::from_secs(20);

/// Composes discovery, downloads and quote into a [`ContentBundle`]
pub struct ContentBundleAssembler {
    lifecycle: ResourceLifecycleManager,
    discovery: TrackDiscoveryEngine,
    downloader: AssetDownloader,
    quotes: QuoteComposer,
    image_source: Arc<dyn ImageSource>,
    fallback_image_url: String,
    required_tracks: usize,
    image_lookup_timeout: Duration,
}

impl ContentBundleAssembler {
    pub fn new(
        lifecycle: ResourceLifecycleManager,
        discovery: TrackDiscoveryEngine,
        downloader: AssetDownloader,
        quotes: QuoteComposer,
    ) -> Self {
        Self {
            lifecycle,
            discovery,
            downloader,
            quotes,
            image_source: Arc::new(NoImageSource),
            fallback_image_url: DEFAULT_FALLBACK_IMAGE_URL.to_string(),
            required_tracks: DEFAULT_REQUIRED_TRACKS,
            image_lookup_timeout: DEFAULT_IMAGE_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_image_source(mut self, image_source: Arc<dyn ImageSource>) -> Self {
        self.image_source = image_source;
        self
    }

    pub fn with_fallback_image_url(mut self, url: impl Into<String>) -> Self {
        self.fallback_image_url = url.into();
        self
    }

    pub fn with_required_tracks(mut self, required: usize) -> Self {
        self.required_tracks = required.max(1);
        self
    }

    pub fn with_image_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.image_lookup_timeout = timeout;
        self
    }

    pub fn required_tracks(&self) -> usize {
        self.required_tracks
    }

    pub fn lifecycle(&self) -> &ResourceLifecycleManager {
        &self.lifecycle
    }

    /// Acquire a bundle for the request
    pub async fn acquire(&self, request: ContentRequest) -> AcquireResult<ContentBundle> {
        let mut context = AcquisitionContext::new(request);
        self.acquire_with_context(&mut context).await
    }

    /// Acquire a bundle, recording state transitions in `context`
    ///
    /// # Errors
    /// `InsufficientContent` when no track or no image could be obtained (or
    /// on a shortfall under the abort policy), `ResourceFatal` when the temp
    /// directory cannot be managed. Nothing written by the attempt survives
    /// an error.
    pub async fn acquire_with_context(&self, context: &mut AcquisitionContext) -> AcquireResult<ContentBundle> {
        context.transition_to(AcquisitionState::Acquiring);
        info!(
            acquisition_id = %context.acquisition_id,
            genre = %context.request.genre,
            language = %context.request.language,
            "Acquisition started"
        );

        let mut scope = match self.lifecycle.open_scope().await {
            Ok(scope) => scope,
            Err(e) => {
                error!(acquisition_id = %context.acquisition_id, error = %e, "Cannot open resource scope");
                context.fail(e.to_string());
                return Err(e);
            }
        };

        let request = context.request.clone();
        match self.assemble(&request, &mut scope).await {
            Ok(parts) => {
                let bundle = ContentBundle::new(
                    request,
                    parts.quote,
                    parts.image,
                    parts.tracks,
                    parts.degraded,
                    scope,
                );
                context.complete(bundle.id);

                info!(
                    acquisition_id = %context.acquisition_id,
                    bundle_id = %bundle.id,
                    tracks = bundle.track_assets.len(),
                    degraded = bundle.degraded,
                    elapsed_ms = context.elapsed_ms(),
                    "Acquisition ready"
                );
                Ok(bundle)
            }
            Err(e) => {
                if let Err(release_error) = scope.release().await {
                    warn!(
                        acquisition_id = %context.acquisition_id,
                        error = %release_error,
                        "Rollback could not remove scope directory"
                    );
                }
                context.fail(e.to_string());

                error!(
                    acquisition_id = %context.acquisition_id,
                    error = %e,
                    elapsed_ms = context.elapsed_ms(),
                    "Acquisition failed"
                );
                Err(e)
            }
        }
    }

    /// Release a bundle's files; idempotent
    pub async fn release(&self, bundle: &mut ContentBundle) -> AcquireResult<bool> {
        let released = bundle.release().await?;
        if released {
            info!(bundle_id = %bundle.id, "Bundle released");
        } else {
            debug!(bundle_id = %bundle.id, "Bundle already released");
        }
        Ok(released)
    }

    async fn assemble(&self, request: &ContentRequest, scope: &mut ResourceScope) -> AcquireResult<BundleParts> {
        let (discovered, image_url, quote) = tokio::join!(
            self.discovery.discover(request, self.required_tracks),
            self.lookup_image(&request.genre),
            self.quotes.compose(&request.language),
        );

        let outcome = discovered?;
        let (tracks, degraded) = self.download_tracks(outcome, scope).await?;
        let image = self.download_image(image_url, scope).await?;

        Ok(BundleParts {
            quote,
            image,
            tracks,
            degraded,
        })
    }

    async fn lookup_image(&self, genre: &str) -> Option<String> {
        match tokio::time::timeout(self.image_lookup_timeout, self.image_source.image_url(genre)).await {
            Ok(Ok(url)) => url,
            Ok(Err(e)) => {
                warn!(source = %self.image_source.id(), error = %e, "Image lookup failed");
                None
            }
            Err(_) => {
                warn!(source = %self.image_source.id(), "Image lookup timed out");
                None
            }
        }
    }

    async fn download_tracks(
        &self,
        outcome: DiscoveryOutcome,
        scope: &mut ResourceScope,
    ) -> AcquireResult<(Vec<TrackAsset>, bool)> {
        let required = self.required_tracks;
        debug!(
            tiers = ?outcome.tiers_consulted,
            used_static = outcome.used_static,
            selected = outcome.candidates.len(),
            reserve = outcome.reserve.len(),
            "Downloading discovered tracks"
        );
        let mut reserve = outcome.reserve.into_iter();
        let mut tracks = Vec::with_capacity(required);

        for selected in outcome.candidates {
            let mut next = Some(selected);
            while let Some(candidate) = next.take() {
                match self.downloader.download(&candidate.asset_url, AssetKind::Audio, scope).await {
                    Ok(asset) => tracks.push(TrackAsset { candidate, asset }),
                    Err(e) if e.is_recoverable() => {
                        next = reserve.next();
                        warn!(
                            title = %candidate.title,
                            provider = %candidate.provider_id,
                            error = %e,
                            replacement = next.as_ref().map(|c| c.title.as_str()).unwrap_or("none"),
                            "Track download failed"
                        );
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        if tracks.is_empty() {
            return Err(AcquireError::InsufficientContent(
                "no track could be downloaded".to_string(),
            ));
        }

        let distinct = tracks.len();
        if distinct < required {
            match self.discovery.policy() {
                SingleTrackPolicy::Abort => {
                    return Err(AcquireError::InsufficientContent(format!(
                        "only {} of {} tracks downloaded",
                        distinct, required
                    )));
                }
                SingleTrackPolicy::DuplicateToFill => {
                    let sources: Vec<TrackAsset> = tracks.iter().cycle().take(required - distinct).cloned().collect();

                    for source in sources {
                        let (local_path, byte_size) = scope.duplicate(&source.asset.local_path, AssetKind::Audio).await?;
                        debug!(title = %source.candidate.title, path = %local_path.display(), "Track duplicated to fill");
                        tracks.push(TrackAsset {
                            candidate: source.candidate,
                            asset: DownloadedAsset {
                                local_path,
                                byte_size,
                                ..source.asset
                            },
                        });
                    }
                }
                SingleTrackPolicy::ReturnDegraded => {}
            }
        }

        Ok((tracks, distinct < required))
    }

    async fn download_image(
        &self,
        provider_url: Option<String>,
        scope: &mut ResourceScope,
    ) -> AcquireResult<DownloadedAsset> {
        let mut attempts: Vec<String> = provider_url.into_iter().collect();
        if !attempts.iter().any(|u| u == &self.fallback_image_url) {
            attempts.push(self.fallback_image_url.clone());
        }

        for url in &attempts {
            match self.downloader.download(url, AssetKind::Image, scope).await {
                Ok(asset) => return Ok(asset),
                Err(e) if e.is_recoverable() => {
                    warn!(url = %url, error = %e, "Image download failed");
                }
                Err(e) => return Err(e),
            }
        }

        Err(AcquireError::InsufficientContent(
            "no cover image could be downloaded".to_string(),
        ))
    }
}

struct BundleParts {
    quote: String,
    image: DownloadedAsset,
    tracks: Vec<TrackAsset>,
    degraded: bool,
}
