//! Repository trait abstractions
//!
//! The processing and webhook services depend on these traits rather than on
//! Postgres directly, so they can be exercised against in-memory doubles.

use async_trait::async_trait;
use uuid::Uuid;
use vidrelay_core::models::{NewProcessingRequest, ProcessingRequest, Quality, Video};
use vidrelay_core::AppError;

/// Persistence of remote transcoding jobs
#[async_trait]
pub trait ProcessingRequestStore: Send + Sync {
    /// Insert a request in `pending` state
    async fn create(&self, request: NewProcessingRequest) -> Result<ProcessingRequest, AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<ProcessingRequest>, AppError>;

    /// Look up a request by the processing service's job identifier
    async fn find_by_uuid(&self, uuid: &str) -> Result<Option<ProcessingRequest>, AppError>;

    /// Record the job identifier. Only writes when none is set yet; returns whether it did.
    async fn assign_uuid(&self, id: Uuid, uuid: &str) -> Result<bool, AppError>;

    /// Persist status, history, metadata, output size and duration of `request`
    async fn save_transition(&self, request: &ProcessingRequest) -> Result<(), AppError>;

    /// All requests of a video, newest first
    async fn list_for_video(&self, video_id: Uuid) -> Result<Vec<ProcessingRequest>, AppError>;
}

/// Persistence of video entities
///
/// None of these writes start processing; that is the lifecycle service's job.
#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn create(&self, video: Video) -> Result<Video, AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<Video>, AppError>;

    /// Write the storage key held in one slot. Returns the updated video, if it exists.
    async fn set_slot(
        &self,
        id: Uuid,
        quality: Quality,
        key: Option<String>,
    ) -> Result<Option<Video>, AppError>;
}
