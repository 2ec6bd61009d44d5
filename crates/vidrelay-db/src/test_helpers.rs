//! In-memory store implementations for testing
//!
//! These let the processing services and HTTP handlers run without a database.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;
use vidrelay_core::models::{NewProcessingRequest, ProcessingRequest, Quality, Video};
use vidrelay_core::AppError;

use crate::traits::{ProcessingRequestStore, VideoStore};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory processing request store
#[derive(Clone, Default)]
pub struct InMemoryProcessingRequestStore {
    requests: Arc<Mutex<HashMap<Uuid, ProcessingRequest>>>,
}

impl InMemoryProcessingRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a request as-is, bypassing `create`.
    pub fn insert(&self, request: ProcessingRequest) {
        lock(&self.requests).insert(request.id, request);
    }

    pub fn all(&self) -> Vec<ProcessingRequest> {
        let mut requests: Vec<_> = lock(&self.requests).values().cloned().collect();
        requests.sort_by_key(|r| r.created_at);
        requests
    }
}

#[async_trait]
impl ProcessingRequestStore for InMemoryProcessingRequestStore {
    async fn create(&self, request: NewProcessingRequest) -> Result<ProcessingRequest, AppError> {
        let created = request.into_request(Utc::now());
        lock(&self.requests).insert(created.id, created.clone());
        Ok(created)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ProcessingRequest>, AppError> {
        Ok(lock(&self.requests).get(&id).cloned())
    }

    async fn find_by_uuid(&self, uuid: &str) -> Result<Option<ProcessingRequest>, AppError> {
        Ok(lock(&self.requests)
            .values()
            .find(|r| r.uuid.as_deref() == Some(uuid))
            .cloned())
    }

    async fn assign_uuid(&self, id: Uuid, uuid: &str) -> Result<bool, AppError> {
        let mut requests = lock(&self.requests);
        match requests.get_mut(&id) {
            Some(request) if request.uuid.is_none() => {
                request.uuid = Some(uuid.to_string());
                request.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn save_transition(&self, request: &ProcessingRequest) -> Result<(), AppError> {
        let mut requests = lock(&self.requests);
        let stored = requests.get_mut(&request.id).ok_or_else(|| {
            AppError::NotFound(format!("Processing request {} not found", request.id))
        })?;
        stored.status = request.status.clone();
        stored.history = request.history.clone();
        stored.metadata = request.metadata.clone();
        stored.output_file_size_mb = request.output_file_size_mb;
        stored.video_duration = request.video_duration;
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn list_for_video(&self, video_id: Uuid) -> Result<Vec<ProcessingRequest>, AppError> {
        let mut requests: Vec<_> = lock(&self.requests)
            .values()
            .filter(|r| r.video_id == video_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }
}

/// In-memory video store
#[derive(Clone, Default)]
pub struct InMemoryVideoStore {
    videos: Arc<Mutex<HashMap<Uuid, Video>>>,
}

impl InMemoryVideoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, id: Uuid) -> Option<Video> {
        lock(&self.videos).get(&id).cloned()
    }
}

#[async_trait]
impl VideoStore for InMemoryVideoStore {
    async fn create(&self, video: Video) -> Result<Video, AppError> {
        lock(&self.videos).insert(video.id, video.clone());
        Ok(video)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Video>, AppError> {
        Ok(lock(&self.videos).get(&id).cloned())
    }

    async fn set_slot(
        &self,
        id: Uuid,
        quality: Quality,
        key: Option<String>,
    ) -> Result<Option<Video>, AppError> {
        let mut videos = lock(&self.videos);
        Ok(videos.get_mut(&id).map(|video| {
            video.set_slot(quality, key);
            video.updated_at = Utc::now();
            video.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidrelay_core::models::Resolution;

    fn new_request(video_id: Uuid) -> NewProcessingRequest {
        NewProcessingRequest {
            video_id,
            resolution: Resolution::P1080,
            download_url: "https://b.s3.eu-west-1.amazonaws.com/videos/original/a.mp4".to_string(),
            upload_url: "https://b.s3.eu-west-1.amazonaws.com/videos/original/a.mp4".to_string(),
            webhook_url: "https://app.test/api/v0/webhooks/processing".to_string(),
            download_provider: "aws".to_string(),
            upload_provider: "aws".to_string(),
        }
    }

    #[tokio::test]
    async fn uuid_is_assigned_only_once() {
        let store = InMemoryProcessingRequestStore::new();
        let request = store.create(new_request(Uuid::new_v4())).await.unwrap();

        assert!(store.assign_uuid(request.id, "job-1").await.unwrap());
        assert!(!store.assign_uuid(request.id, "job-2").await.unwrap());

        let found = store.find_by_uuid("job-1").await.unwrap().unwrap();
        assert_eq!(found.id, request.id);
        assert!(store.find_by_uuid("job-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_transition_of_unknown_request_fails() {
        let store = InMemoryProcessingRequestStore::new();
        let orphan = new_request(Uuid::new_v4()).into_request(Utc::now());
        assert!(matches!(
            store.save_transition(&orphan).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn set_slot_updates_only_that_slot() {
        let store = InMemoryVideoStore::new();
        let video = store
            .create(Video::new("clip".to_string(), Some("videos/original/a.mp4".to_string())))
            .await
            .unwrap();

        let updated = store
            .set_slot(
                video.id,
                Quality::Scaled(Resolution::P720),
                Some("videos/720p/a.mp4".to_string()),
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.video.as_deref(), Some("videos/original/a.mp4"));
        assert_eq!(updated.video_720p.as_deref(), Some("videos/720p/a.mp4"));
        assert!(store
            .set_slot(Uuid::new_v4(), Quality::Original, None)
            .await
            .unwrap()
            .is_none());
    }
}
