//! Application state and sub-state extractors.
//!
//! Handlers extract only the sub-state they need through Axum's `FromRef`.

use axum::extract::FromRef;
use sqlx::PgPool;
use std::sync::Arc;
use vidrelay_processing::{ResumableUploadService, VideoService, WebhookReceiver};
use vidrelay_storage::Storage;

/// Resumable chunk upload endpoint.
#[derive(Clone)]
pub struct UploadState {
    pub service: ResumableUploadService,
}

/// Processing webhook endpoint.
#[derive(Clone)]
pub struct WebhookState {
    pub receiver: WebhookReceiver,
}

/// Video CRUD, signed URLs and rendition status.
#[derive(Clone)]
pub struct VideoState {
    pub service: Arc<VideoService>,
}

/// Dependencies probed by the readiness check.
#[derive(Clone)]
pub struct HealthState {
    /// Absent when the stores are not database backed.
    pub pool: Option<PgPool>,
    pub storage: Arc<dyn Storage>,
}

pub struct AppState {
    pub uploads: UploadState,
    pub webhooks: WebhookState,
    pub videos: VideoState,
    pub health: HealthState,
}

impl FromRef<Arc<AppState>> for UploadState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.uploads.clone()
    }
}

impl FromRef<Arc<AppState>> for WebhookState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.webhooks.clone()
    }
}

impl FromRef<Arc<AppState>> for VideoState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.videos.clone()
    }
}

impl FromRef<Arc<AppState>> for HealthState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.health.clone()
    }
}
