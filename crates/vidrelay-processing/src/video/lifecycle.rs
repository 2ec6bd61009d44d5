//! Video lifecycle
//!
//! Creating a video with a file, or replacing its file, starts one processing
//! request per configured quality. Slot writes made by the webhook go straight to
//! the store and never come through here.

use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use vidrelay_core::constants::{ORIGINAL_QUALITY, RENDITION_EXTENSION};
use vidrelay_core::models::{
    CreateVideoRequest, NewProcessingRequest, ProcessingRequest, Quality, RenditionStatus,
    ReplaceVideoFileRequest, Resolution, SignedUrlResponse, Video,
};
use vidrelay_core::{AppError, Config};
use vidrelay_db::{ProcessingRequestStore, VideoStore};
use vidrelay_storage::{Storage, StorageBackend};

use super::dispatcher::{JobDispatcher, TranscodeJob};

/// Everything a transcoding job needs besides the two URLs.
#[derive(Clone)]
pub struct JobSettings {
    pub qualities: Vec<Quality>,
    pub original_resolution: Resolution,
    pub download_provider: String,
    pub upload_provider: String,
    pub crf: String,
    pub preset: String,
    pub optimise_for_web: bool,
    pub webhook_url: String,
    pub storage_access_key: String,
    pub storage_access_secret: String,
}

impl JobSettings {
    pub fn from_config(config: &Config) -> Self {
        let processing = config.processing();
        Self {
            qualities: processing.qualities.clone(),
            original_resolution: processing.original_resolution,
            download_provider: processing.download_provider.clone(),
            upload_provider: processing.upload_provider.clone(),
            crf: processing.crf.clone(),
            preset: processing.preset.clone(),
            optimise_for_web: processing.optimise_for_web,
            webhook_url: processing.webhook_url.clone(),
            storage_access_key: config.aws_access_key_id().unwrap_or_default().to_string(),
            storage_access_secret: config
                .aws_secret_access_key()
                .unwrap_or_default()
                .to_string(),
        }
    }

    fn job(&self, request: &ProcessingRequest) -> TranscodeJob {
        TranscodeJob {
            download_provider: request.download_provider.clone(),
            upload_provider: request.upload_provider.clone(),
            download_url: request.download_url.clone(),
            upload_url: request.upload_url.clone(),
            webhook_url: request.webhook_url.clone(),
            crf: self.crf.clone(),
            preset: self.preset.clone(),
            optimise_for_web: self.optimise_for_web,
            download_access_key: self.storage_access_key.clone(),
            download_access_secret: self.storage_access_secret.clone(),
            upload_access_key: self.storage_access_key.clone(),
            upload_access_secret: self.storage_access_secret.clone(),
            resolution: Some(request.resolution.to_string()),
        }
    }
}

pub struct VideoService {
    videos: Arc<dyn VideoStore>,
    requests: Arc<dyn ProcessingRequestStore>,
    storage: Arc<dyn Storage>,
    dispatcher: Arc<dyn JobDispatcher>,
    settings: JobSettings,
    signed_url_expiry: Duration,
}

impl VideoService {
    pub fn new(
        videos: Arc<dyn VideoStore>,
        requests: Arc<dyn ProcessingRequestStore>,
        storage: Arc<dyn Storage>,
        dispatcher: Arc<dyn JobDispatcher>,
        settings: JobSettings,
        signed_url_expiry: Duration,
    ) -> Self {
        Self {
            videos,
            requests,
            storage,
            dispatcher,
            settings,
            signed_url_expiry,
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Video, AppError> {
        self.videos
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Video {} not found", id)))
    }

    #[tracing::instrument(skip(self, request), fields(title = %request.title))]
    pub async fn create(&self, request: CreateVideoRequest) -> Result<Video, AppError> {
        let title = request.title.trim();
        if title.is_empty() {
            return Err(AppError::InvalidInput("Title must not be empty".to_string()));
        }
        if let Some(key) = &request.video {
            self.ensure_uploaded(key).await?;
        }

        let video = self
            .videos
            .create(Video::new(title.to_string(), request.video))
            .await?;
        if let Some(key) = &video.video {
            self.start_processing(&video, key).await?;
        }
        Ok(video)
    }

    #[tracing::instrument(skip(self, request), fields(video_id = %id))]
    pub async fn replace_file(
        &self,
        id: Uuid,
        request: ReplaceVideoFileRequest,
    ) -> Result<Video, AppError> {
        self.get(id).await?;
        self.ensure_uploaded(&request.video).await?;

        let video = self
            .videos
            .set_slot(id, Quality::Original, Some(request.video.clone()))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Video {} not found", id)))?;
        self.start_processing(&video, &request.video).await?;
        Ok(video)
    }

    async fn ensure_uploaded(&self, key: &str) -> Result<(), AppError> {
        if !self.storage.exists(key).await? {
            return Err(AppError::InvalidInput(format!(
                "No uploaded file at {}",
                key
            )));
        }
        Ok(())
    }

    /// Create and dispatch one processing request per configured quality.
    ///
    /// A failed dispatch is logged and leaves that request without a job uuid.
    async fn start_processing(
        &self,
        video: &Video,
        key: &str,
    ) -> Result<Vec<ProcessingRequest>, AppError> {
        let download_url = self.storage.public_url(key);
        let mut started = Vec::with_capacity(self.settings.qualities.len());

        for quality in &self.settings.qualities {
            let (resolution, upload_url) = match quality {
                Quality::Original => (self.settings.original_resolution, download_url.clone()),
                Quality::Scaled(resolution) => (
                    *resolution,
                    download_url.replace(ORIGINAL_QUALITY, resolution.as_str()),
                ),
            };
            let upload_url = with_extension(&upload_url, RENDITION_EXTENSION)?;

            let mut request = self
                .requests
                .create(NewProcessingRequest {
                    video_id: video.id,
                    resolution,
                    download_url: download_url.clone(),
                    upload_url,
                    webhook_url: self.settings.webhook_url.clone(),
                    download_provider: self.settings.download_provider.clone(),
                    upload_provider: self.settings.upload_provider.clone(),
                })
                .await?;

            match self.dispatcher.dispatch(&self.settings.job(&request)).await {
                Ok(accepted) => {
                    if self.requests.assign_uuid(request.id, &accepted.id).await? {
                        request.uuid = Some(accepted.id);
                    }
                }
                Err(e) => tracing::warn!(
                    video_id = %video.id,
                    request_id = %request.id,
                    resolution = %resolution,
                    error = %e,
                    "Failed to dispatch processing job"
                ),
            }
            started.push(request);
        }

        tracing::info!(
            video_id = %video.id,
            requests = started.len(),
            dispatched = started.iter().filter(|r| r.uuid.is_some()).count(),
            "Processing started"
        );
        Ok(started)
    }

    /// URL for one rendition of a video. Presigned on S3, public otherwise.
    pub async fn signed_url(&self, id: Uuid, quality: Quality) -> Result<SignedUrlResponse, AppError> {
        let video = self.get(id).await?;
        let key = video.slot(quality).ok_or_else(|| {
            AppError::NotFound(format!("Video {} has no {} rendition", id, quality))
        })?;

        let (url, expires_in_secs) = match self.storage.backend_type() {
            StorageBackend::S3 => (
                self.storage
                    .get_presigned_url(key, self.signed_url_expiry)
                    .await?,
                Some(self.signed_url_expiry.as_secs()),
            ),
            StorageBackend::Local => (self.storage.public_url(key), None),
        };

        Ok(SignedUrlResponse {
            quality: quality.to_string(),
            url,
            expires_in_secs,
        })
    }

    /// Latest processing state per resolution.
    pub async fn renditions(&self, id: Uuid) -> Result<Vec<RenditionStatus>, AppError> {
        let video = self.get(id).await?;
        let requests = self.requests.list_for_video(id).await?;

        Ok(Resolution::ALL
            .into_iter()
            .map(|resolution| {
                // Newest first, so the first match is the latest request.
                let latest = requests.iter().find(|r| r.resolution == resolution);
                let quality = Quality::for_output(resolution, self.settings.original_resolution);
                RenditionStatus {
                    resolution,
                    status: latest.map(|r| r.status.clone()),
                    output_file_size_mb: latest.and_then(|r| r.output_file_size_mb),
                    available: video.slot(quality).is_some(),
                }
            })
            .collect())
    }
}

/// Replace the extension of the last path segment of `url`.
fn with_extension(url: &str, extension: &str) -> Result<String, AppError> {
    let mut parsed = reqwest::Url::parse(url)
        .map_err(|e| AppError::Internal(format!("Invalid storage URL {}: {}", url, e)))?;
    let path = parsed.path().to_string();
    let (dir, file) = path.rsplit_once('/').unwrap_or(("", path.as_str()));
    let stem = match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file,
    };
    parsed.set_path(&format!("{}/{}.{}", dir, stem, extension));
    Ok(parsed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::DispatchedJob;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use vidrelay_db::test_helpers::{InMemoryProcessingRequestStore, InMemoryVideoStore};
    use vidrelay_storage::LocalStorage;

    #[derive(Default)]
    struct RecordingDispatcher {
        jobs: Mutex<Vec<TranscodeJob>>,
        fail: bool,
    }

    #[async_trait]
    impl JobDispatcher for RecordingDispatcher {
        async fn dispatch(&self, job: &TranscodeJob) -> Result<DispatchedJob, AppError> {
            let mut jobs = self.jobs.lock().unwrap();
            jobs.push(job.clone());
            if self.fail {
                return Err(AppError::Dispatch("processing API down".to_string()));
            }
            Ok(DispatchedJob {
                id: format!("job-{}", jobs.len()),
                status: "queued".to_string(),
            })
        }
    }

    struct Fixture {
        service: VideoService,
        requests: InMemoryProcessingRequestStore,
        dispatcher: Arc<RecordingDispatcher>,
        _dir: TempDir,
    }

    fn settings(qualities: Vec<Quality>) -> JobSettings {
        JobSettings {
            qualities,
            original_resolution: Resolution::P1080,
            download_provider: "aws".to_string(),
            upload_provider: "aws".to_string(),
            crf: "30".to_string(),
            preset: "ultrafast".to_string(),
            optimise_for_web: true,
            webhook_url: "https://app.test/api/v0/webhooks/processing".to_string(),
            storage_access_key: "AKIA".to_string(),
            storage_access_secret: "s3-secret".to_string(),
        }
    }

    async fn fixture(qualities: Vec<Quality>, fail: bool) -> Fixture {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://media.test".to_string())
            .await
            .unwrap();
        storage
            .upload_with_key(
                "videos/original/3_clip.mov",
                Bytes::from_static(b"abc"),
                "video/quicktime",
            )
            .await
            .unwrap();

        let requests = InMemoryProcessingRequestStore::new();
        let dispatcher = Arc::new(RecordingDispatcher {
            fail,
            ..Default::default()
        });
        let service = VideoService::new(
            Arc::new(InMemoryVideoStore::new()),
            Arc::new(requests.clone()),
            Arc::new(storage),
            dispatcher.clone(),
            settings(qualities),
            Duration::from_secs(3600),
        );
        Fixture {
            service,
            requests,
            dispatcher,
            _dir: dir,
        }
    }

    fn create_request() -> CreateVideoRequest {
        CreateVideoRequest {
            title: "clip".to_string(),
            video: Some("videos/original/3_clip.mov".to_string()),
        }
    }

    #[tokio::test]
    async fn creating_a_video_dispatches_one_job_per_quality() {
        let f = fixture(
            vec![Quality::Original, Quality::Scaled(Resolution::P720)],
            false,
        )
        .await;

        let video = f.service.create(create_request()).await.unwrap();

        let requests = f.requests.all();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.video_id == video.id));
        assert!(requests.iter().all(|r| r.uuid.is_some()));

        let original = requests
            .iter()
            .find(|r| r.resolution == Resolution::P1080)
            .unwrap();
        assert_eq!(
            original.download_url,
            "http://media.test/videos/original/3_clip.mov"
        );
        assert_eq!(
            original.upload_url,
            "http://media.test/videos/original/3_clip.mp4"
        );

        let scaled = requests
            .iter()
            .find(|r| r.resolution == Resolution::P720)
            .unwrap();
        assert_eq!(scaled.upload_url, "http://media.test/videos/720p/3_clip.mp4");

        let jobs = f.dispatcher.jobs.lock().unwrap();
        assert_eq!(jobs.len(), 2);
        assert!(jobs
            .iter()
            .all(|j| j.webhook_url == "https://app.test/api/v0/webhooks/processing"));
        assert!(jobs.iter().any(|j| j.resolution.as_deref() == Some("720p")));
    }

    #[tokio::test]
    async fn failed_dispatch_leaves_uuid_empty() {
        let f = fixture(vec![Quality::Original], true).await;

        f.service.create(create_request()).await.unwrap();

        let requests = f.requests.all();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].uuid.is_none());
        assert_eq!(requests[0].status, "pending");
        assert_eq!(f.dispatcher.jobs.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn video_without_file_starts_nothing() {
        let f = fixture(vec![Quality::Original], false).await;

        f.service
            .create(CreateVideoRequest {
                title: "draft".to_string(),
                video: None,
            })
            .await
            .unwrap();
        assert!(f.requests.all().is_empty());
    }

    #[tokio::test]
    async fn rejects_missing_upload_and_blank_title() {
        let f = fixture(vec![Quality::Original], false).await;

        assert!(matches!(
            f.service
                .create(CreateVideoRequest {
                    title: "clip".to_string(),
                    video: Some("videos/original/missing.mp4".to_string()),
                })
                .await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            f.service
                .create(CreateVideoRequest {
                    title: "  ".to_string(),
                    video: None,
                })
                .await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn replacing_the_file_restarts_processing() {
        let f = fixture(vec![Quality::Original], false).await;
        let video = f.service.create(create_request()).await.unwrap();

        let replaced = f
            .service
            .replace_file(
                video.id,
                ReplaceVideoFileRequest {
                    video: "videos/original/3_clip.mov".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(replaced.video.as_deref(), Some("videos/original/3_clip.mov"));
        assert_eq!(f.requests.all().len(), 2);
        assert!(matches!(
            f.service
                .replace_file(
                    Uuid::new_v4(),
                    ReplaceVideoFileRequest {
                        video: "videos/original/3_clip.mov".to_string(),
                    },
                )
                .await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn signed_url_requires_a_filled_slot() {
        let f = fixture(vec![Quality::Original], false).await;
        let video = f.service.create(create_request()).await.unwrap();

        let url = f
            .service
            .signed_url(video.id, Quality::Original)
            .await
            .unwrap();
        assert_eq!(url.url, "http://media.test/videos/original/3_clip.mov");
        assert_eq!(url.quality, "original");
        assert!(url.expires_in_secs.is_none());

        assert!(matches!(
            f.service
                .signed_url(video.id, Quality::Scaled(Resolution::P480))
                .await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn renditions_report_latest_request_per_resolution() {
        let f = fixture(
            vec![Quality::Original, Quality::Scaled(Resolution::P480)],
            false,
        )
        .await;
        let video = f.service.create(create_request()).await.unwrap();

        let renditions = f.service.renditions(video.id).await.unwrap();
        assert_eq!(renditions.len(), Resolution::ALL.len());

        let p480 = renditions
            .iter()
            .find(|r| r.resolution == Resolution::P480)
            .unwrap();
        assert_eq!(p480.status.as_deref(), Some("pending"));
        assert!(!p480.available);

        let p2160 = renditions
            .iter()
            .find(|r| r.resolution == Resolution::P2160)
            .unwrap();
        assert!(p2160.status.is_none());
    }

    #[test]
    fn extension_is_replaced_in_last_segment_only() {
        assert_eq!(
            with_extension("https://b.s3.amazonaws.com/videos/original/a.b.mov", "mp4").unwrap(),
            "https://b.s3.amazonaws.com/videos/original/a.b.mp4"
        );
        assert_eq!(
            with_extension("https://b.s3.amazonaws.com/v1.0/videos/clip", "mp4").unwrap(),
            "https://b.s3.amazonaws.com/v1.0/videos/clip.mp4"
        );
    }
}
