//! Service initialization
//!
//! Wires stores, storage and the job dispatcher into the upload, webhook and video
//! services. `build_state` takes every dependency explicitly so tests can run the
//! router over in-memory stores.

use crate::state::{AppState, HealthState, UploadState, VideoState, WebhookState};
use anyhow::{Context, Result};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use vidrelay_core::Config;
use vidrelay_db::{ProcessingRequestRepository, ProcessingRequestStore, VideoRepository, VideoStore};
use vidrelay_processing::{
    ChunkAssembler, HttpJobDispatcher, JobDispatcher, JobSettings, PersistentPublisher,
    ResumableUploadService, UploadPolicy, VideoService, WebhookReceiver,
};
use vidrelay_storage::Storage;

/// Everything the services are built from besides configuration.
pub struct StateDeps {
    pub storage: Arc<dyn Storage>,
    pub chunk_storage: Arc<dyn Storage>,
    pub requests: Arc<dyn ProcessingRequestStore>,
    pub videos: Arc<dyn VideoStore>,
    pub dispatcher: Arc<dyn JobDispatcher>,
    pub pool: Option<PgPool>,
}

/// Build services backed by PostgreSQL and the HTTP job dispatcher.
pub fn initialize_services(
    config: &Config,
    pool: PgPool,
    storage: Arc<dyn Storage>,
    chunk_storage: Arc<dyn Storage>,
) -> Result<Arc<AppState>> {
    let dispatcher = HttpJobDispatcher::new(config.processing())
        .context("Failed to create job dispatcher")?;

    let deps = StateDeps {
        storage,
        chunk_storage,
        requests: Arc::new(ProcessingRequestRepository::new(pool.clone())),
        videos: Arc::new(VideoRepository::new(pool.clone())),
        dispatcher: Arc::new(dispatcher),
        pool: Some(pool),
    };

    let state = build_state(config, deps);
    tracing::info!(
        qualities = ?config.processing().qualities,
        upload_to = %config.upload().upload_to,
        "Services initialized"
    );
    Ok(Arc::new(state))
}

pub fn build_state(config: &Config, deps: StateDeps) -> AppState {
    let upload = config.upload();
    let processing = config.processing();

    let publisher = PersistentPublisher::new(
        ChunkAssembler::new(deps.chunk_storage),
        deps.storage.clone(),
        upload.upload_to.clone(),
    );
    let uploads = ResumableUploadService::new(Arc::new(publisher), UploadPolicy::from_config(upload));

    let receiver = WebhookReceiver::new(
        deps.requests.clone(),
        deps.videos.clone(),
        processing.access_token.clone(),
        processing.original_resolution,
    );

    let videos = VideoService::new(
        deps.videos,
        deps.requests,
        deps.storage.clone(),
        deps.dispatcher,
        JobSettings::from_config(config),
        Duration::from_secs(config.signed_url_expiry_secs()),
    );

    AppState {
        uploads: UploadState { service: uploads },
        webhooks: WebhookState { receiver },
        videos: VideoState {
            service: Arc::new(videos),
        },
        health: HealthState {
            pool: deps.pool,
            storage: deps.storage,
        },
    }
}
