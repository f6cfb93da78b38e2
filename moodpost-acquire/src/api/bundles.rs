//! Bundle API handlers
//!
//! POST /bundles, GET /bundles/:id, DELETE /bundles/:id

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    types::{ContentBundle, ContentRequest, DownloadedAsset},
    AppState,
};

/// POST /bundles request
#[derive(Debug, Deserialize)]
pub struct AcquireRequest {
    pub genre: String,
    pub language: String,
}

/// Downloaded file in a bundle summary
#[derive(Debug, Serialize)]
pub struct AssetSummary {
    pub path: String,
    pub bytes: u64,
    pub source_url: String,
}

impl From<&DownloadedAsset> for AssetSummary {
    fn from(asset: &DownloadedAsset) -> Self {
        Self {
            path: asset.local_path.display().to_string(),
            bytes: asset.byte_size,
            source_url: asset.source_url.clone(),
        }
    }
}

/// Track in a bundle summary
#[derive(Debug, Serialize)]
pub struct TrackSummary {
    pub title: String,
    pub artist: String,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    pub path: String,
    pub bytes: u64,
}

/// Bundle as reported over HTTP
#[derive(Debug, Serialize)]
pub struct BundleSummary {
    pub id: Uuid,
    pub genre: String,
    pub language: String,
    pub quote: String,
    pub image: AssetSummary,
    pub tracks: Vec<TrackSummary>,
    pub degraded: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&ContentBundle> for BundleSummary {
    fn from(bundle: &ContentBundle) -> Self {
        Self {
            id: bundle.id,
            genre: bundle.request.genre.clone(),
            language: bundle.request.language.clone(),
            quote: bundle.quote_text.clone(),
            image: AssetSummary::from(&bundle.image_asset),
            tracks: bundle
                .track_assets
                .iter()
                .map(|track| TrackSummary {
                    title: track.candidate.title.clone(),
                    artist: track.candidate.artist.clone(),
                    provider: track.candidate.provider_id.clone(),
                    tier: track.candidate.tier_id.map(|t| t.as_str().to_string()),
                    path: track.asset.local_path.display().to_string(),
                    bytes: track.asset.byte_size,
                })
                .collect(),
            degraded: bundle.degraded,
            created_at: bundle.created_at,
        }
    }
}

/// DELETE /bundles/:id response
#[derive(Debug, Serialize)]
pub struct ReleaseResponse {
    pub id: Uuid,
    pub released: bool,
}

/// POST /bundles
///
/// Runs one acquisition and holds the bundle until it is released, it
/// expires, or the held-bundle cap evicts it. Returns 201 Created with the
/// bundle summary.
pub async fn create_bundle(
    State(state): State<AppState>,
    Json(request): Json<AcquireRequest>,
) -> ApiResult<(StatusCode, Json<BundleSummary>)> {
    let request = ContentRequest::new(request.genre, request.language)?;
    state.sweep_expired().await;

    let bundle = match state.assembler.acquire(request).await {
        Ok(bundle) => bundle,
        Err(e) => {
            *state.last_error.write().await = Some(e.to_string());
            return Err(e.into());
        }
    };

    let summary = BundleSummary::from(&bundle);
    state.hold(bundle).await;

    Ok((StatusCode::CREATED, Json(summary)))
}

/// GET /bundles/:id
pub async fn get_bundle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<BundleSummary>> {
    let bundles = state.bundles.read().await;
    let bundle = bundles
        .get(&id)
        .ok_or_else(|| ApiError::NotFound(format!("Bundle {}", id)))?;

    Ok(Json(BundleSummary::from(bundle)))
}

/// DELETE /bundles/:id
///
/// Idempotent: unknown or already released ids answer `released: false`.
pub async fn release_bundle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ReleaseResponse>> {
    let removed = state.bundles.write().await.remove(&id);

    let released = match removed {
        Some(mut bundle) => state.assembler.release(&mut bundle).await?,
        None => false,
    };

    info!(bundle_id = %id, released, "Release requested");
    Ok(Json(ReleaseResponse { id, released }))
}

/// Build bundle routes
pub fn bundle_routes() -> Router<AppState> {
    Router::new()
        .route("/bundles", post(create_bundle))
        .route("/bundles/:id", get(get_bundle).delete(release_bundle))
}
