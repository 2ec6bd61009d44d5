//! Test helpers: build the real router over in-memory stores and local storage.
//!
//! Run from workspace root: `cargo test -p vidrelay-api`. No database is needed.

#![allow(dead_code)]

use async_trait::async_trait;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestResponse, TestServer};
use serde_json::{json, Value as JsonValue};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use vidrelay_api::setup::{routes, services};
use vidrelay_core::models::{Quality, Resolution};
use vidrelay_core::{
    AppError, BaseConfig, Config, ProcessingConfig, StorageBackend, UploadConfig,
    VideoProcessorConfig,
};
use vidrelay_db::test_helpers::{InMemoryProcessingRequestStore, InMemoryVideoStore};
use vidrelay_processing::video::{DispatchedJob, JobDispatcher, TranscodeJob};
use vidrelay_processing::webhook::signature;
use vidrelay_storage::{LocalStorage, Storage};

pub const WEBHOOK_SECRET: &str = "test-processing-token";
pub const MEDIA_BASE_URL: &str = "http://media.test";
pub const UPLOAD_PATH: &str = "/api/v0/uploads/chunk";
pub const WEBHOOK_PATH: &str = "/api/v0/webhooks/processing";

/// Dispatcher that records every job and answers with sequential ids.
#[derive(Default)]
pub struct RecordingDispatcher {
    jobs: Mutex<Vec<TranscodeJob>>,
    fail: bool,
}

impl RecordingDispatcher {
    pub fn failing() -> Self {
        Self {
            jobs: Mutex::default(),
            fail: true,
        }
    }

    pub fn jobs(&self) -> Vec<TranscodeJob> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobDispatcher for RecordingDispatcher {
    async fn dispatch(&self, job: &TranscodeJob) -> Result<DispatchedJob, AppError> {
        let mut jobs = self.jobs.lock().unwrap();
        jobs.push(job.clone());
        if self.fail {
            return Err(AppError::Dispatch("processing API unavailable".to_string()));
        }
        Ok(DispatchedJob {
            id: format!("job-{}", jobs.len()),
            status: "queued".to_string(),
        })
    }
}

/// Options that differ between test files.
pub struct TestOptions {
    pub qualities: Vec<Quality>,
    pub max_size_bytes: u64,
    pub allowed_extensions: Vec<String>,
    pub max_chunk_size_bytes: usize,
    pub dispatcher: RecordingDispatcher,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            qualities: vec![Quality::Original, Quality::Scaled(Resolution::P720)],
            max_size_bytes: 10 * 1024 * 1024,
            allowed_extensions: vec![],
            max_chunk_size_bytes: 1024 * 1024,
            dispatcher: RecordingDispatcher::default(),
        }
    }
}

/// Test application: server plus handles on every collaborator.
pub struct TestApp {
    pub server: TestServer,
    pub requests: InMemoryProcessingRequestStore,
    pub videos: InMemoryVideoStore,
    pub storage: Arc<LocalStorage>,
    pub dispatcher: Arc<RecordingDispatcher>,
    _storage_dir: TempDir,
    _chunk_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn chunk_dir(&self) -> &std::path::Path {
        self._chunk_dir.path()
    }
}

pub fn create_test_config(options: &TestOptions, storage_dir: &TempDir, chunk_dir: &TempDir) -> Config {
    Config(Box::new(VideoProcessorConfig {
        base: BaseConfig {
            server_port: 0,
            cors_origins: vec!["*".to_string()],
            db_max_connections: 1,
            db_timeout_seconds: 5,
            request_timeout_secs: 30,
            environment: "test".to_string(),
        },
        database_url: "postgres://unused/vidrelay".to_string(),
        storage_backend: Some(StorageBackend::Local),
        s3_bucket: None,
        s3_region: None,
        s3_endpoint: None,
        aws_region: None,
        aws_access_key_id: Some("AKIATEST".to_string()),
        aws_secret_access_key: Some("s3-secret".to_string()),
        local_storage_path: Some(storage_dir.path().display().to_string()),
        local_storage_base_url: Some(MEDIA_BASE_URL.to_string()),
        signed_url_expiry_secs: 600,
        upload: UploadConfig {
            chunk_storage_path: chunk_dir.path().to_path_buf(),
            upload_to: "videos/original".to_string(),
            max_size_bytes: options.max_size_bytes,
            allowed_extensions: options.allowed_extensions.clone(),
            max_chunk_size_bytes: options.max_chunk_size_bytes,
        },
        processing: ProcessingConfig {
            api_url: "http://processing.test/api/process-video/".to_string(),
            access_key: "processing-key".to_string(),
            access_token: WEBHOOK_SECRET.to_string(),
            download_provider: "aws".to_string(),
            upload_provider: "aws".to_string(),
            crf: "30".to_string(),
            preset: "ultrafast".to_string(),
            optimise_for_web: true,
            qualities: options.qualities.clone(),
            original_resolution: Resolution::P1080,
            webhook_url: format!("https://app.test{}", WEBHOOK_PATH),
        },
    }))
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(TestOptions::default()).await
}

pub async fn setup_test_app_with(options: TestOptions) -> TestApp {
    let storage_dir = tempfile::tempdir().expect("Failed to create storage directory");
    let chunk_dir = tempfile::tempdir().expect("Failed to create chunk directory");
    let config = create_test_config(&options, &storage_dir, &chunk_dir);

    let storage = Arc::new(
        LocalStorage::new(storage_dir.path(), MEDIA_BASE_URL.to_string())
            .await
            .expect("Failed to create local storage"),
    );
    let chunk_storage = Arc::new(
        LocalStorage::new(chunk_dir.path(), "file:///chunks".to_string())
            .await
            .expect("Failed to create chunk storage"),
    );
    let requests = InMemoryProcessingRequestStore::new();
    let videos = InMemoryVideoStore::new();
    let dispatcher = Arc::new(options.dispatcher);

    let state = services::build_state(
        &config,
        services::StateDeps {
            storage: storage.clone(),
            chunk_storage,
            requests: Arc::new(requests.clone()),
            videos: Arc::new(videos.clone()),
            dispatcher: dispatcher.clone(),
            pool: None,
        },
    );
    let router = routes::setup_routes(&config, Arc::new(state)).expect("Failed to build router");
    let server = TestServer::new(router).expect("Failed to start test server");

    TestApp {
        server,
        requests,
        videos,
        storage,
        dispatcher,
        _storage_dir: storage_dir,
        _chunk_dir: chunk_dir,
    }
}

/// Multipart body of one Resumable.js chunk POST.
pub fn chunk_form(filename: &str, total_size: usize, number: u32, data: &[u8]) -> MultipartForm {
    MultipartForm::new()
        .add_text("resumableFilename", filename)
        .add_text("resumableTotalSize", total_size.to_string())
        .add_text("resumableChunkNumber", number.to_string())
        .add_text("resumableCurrentChunkSize", data.len().to_string())
        .add_part(
            "file",
            Part::bytes(data.to_vec())
                .file_name("blob")
                .mime_type("application/octet-stream"),
        )
}

/// Send every chunk of `content` in order, returning the last response.
pub async fn upload_in_chunks(
    server: &TestServer,
    filename: &str,
    content: &[u8],
    chunk_size: usize,
) -> TestResponse {
    let mut last = None;
    for (i, chunk) in content.chunks(chunk_size).enumerate() {
        let response = server
            .post(UPLOAD_PATH)
            .multipart(chunk_form(filename, content.len(), i as u32 + 1, chunk))
            .await;
        last = Some(response);
    }
    last.expect("content must not be empty")
}

/// Signed webhook body for `data`.
pub fn signed_webhook(data: JsonValue) -> JsonValue {
    let signature = signature::sign(WEBHOOK_SECRET, &data).expect("Failed to sign payload");
    json!({ "data": data, "signature": signature })
}

pub async fn store_object(storage: &LocalStorage, key: &str, content: &[u8]) {
    storage
        .upload_with_key(key, bytes::Bytes::copy_from_slice(content), "video/mp4")
        .await
        .expect("Failed to store object");
}
