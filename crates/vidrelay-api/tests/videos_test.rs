//! Video lifecycle, signed URL and health integration tests.
//!
//! Run with: `cargo test -p vidrelay-api --test videos_test`

mod helpers;

use helpers::{
    setup_test_app, setup_test_app_with, store_object, RecordingDispatcher, TestApp, TestOptions,
    MEDIA_BASE_URL,
};
use serde_json::{json, Value as JsonValue};

async fn create(app: &TestApp, body: JsonValue) -> axum_test::TestResponse {
    app.client().post("/api/v0/videos").json(&body).await
}

#[tokio::test]
async fn test_create_video_dispatches_one_job_per_quality() {
    let app = setup_test_app().await;
    store_object(&app.storage, "videos/original/10_clip.mp4", b"0123456789").await;

    let response = create(&app, json!({"title": "Clip", "video": "videos/original/10_clip.mp4"})).await;
    assert_eq!(response.status_code(), 201);

    let jobs = app.dispatcher.jobs();
    assert_eq!(jobs.len(), 2);

    let source = format!("{}/videos/original/10_clip.mp4", MEDIA_BASE_URL);
    assert_eq!(jobs[0].download_url, source);
    assert_eq!(jobs[0].upload_url, source);
    assert_eq!(jobs[0].resolution.as_deref(), Some("1080p"));

    assert_eq!(jobs[1].download_url, source);
    assert_eq!(
        jobs[1].upload_url,
        format!("{}/videos/720p/10_clip.mp4", MEDIA_BASE_URL)
    );
    assert_eq!(jobs[1].resolution.as_deref(), Some("720p"));
    assert_eq!(jobs[1].webhook_url, "https://app.test/api/v0/webhooks/processing");
    assert_eq!(jobs[1].upload_access_secret, "s3-secret");

    let uuids: Vec<_> = app.requests.all().into_iter().filter_map(|r| r.uuid).collect();
    assert_eq!(uuids.len(), 2);
    assert!(uuids.contains(&"job-1".to_string()));
    assert!(uuids.contains(&"job-2".to_string()));
}

#[tokio::test]
async fn test_rendition_urls_use_mp4_extension() {
    let app = setup_test_app().await;
    store_object(&app.storage, "videos/original/10_clip.mov", b"0123456789").await;

    let response = create(&app, json!({"title": "Clip", "video": "videos/original/10_clip.mov"})).await;
    assert_eq!(response.status_code(), 201);

    let jobs = app.dispatcher.jobs();
    assert_eq!(
        jobs[0].upload_url,
        format!("{}/videos/original/10_clip.mp4", MEDIA_BASE_URL)
    );
    assert_eq!(
        jobs[1].upload_url,
        format!("{}/videos/720p/10_clip.mp4", MEDIA_BASE_URL)
    );
}

#[tokio::test]
async fn test_create_without_file_starts_nothing() {
    let app = setup_test_app().await;

    let response = create(&app, json!({"title": "Draft"})).await;
    assert_eq!(response.status_code(), 201);
    let body: JsonValue = response.json();
    assert_eq!(body["title"], "Draft");
    assert!(body["video"].is_null());
    assert!(app.dispatcher.jobs().is_empty());
}

#[tokio::test]
async fn test_create_rejects_invalid_input() {
    let app = setup_test_app().await;

    let response = create(&app, json!({"title": "  "})).await;
    assert_eq!(response.status_code(), 400);

    let response = create(&app, json!({"title": "Clip", "video": "videos/original/missing.mp4"})).await;
    assert_eq!(response.status_code(), 400);
    let body: JsonValue = response.json();
    assert_eq!(body["code"], "INVALID_INPUT");

    let response = create(&app, json!({"video": 42})).await;
    assert_eq!(response.status_code(), 400);

    assert!(app.requests.all().is_empty());
}

#[tokio::test]
async fn test_failed_dispatch_still_creates_video() {
    let app = setup_test_app_with(TestOptions {
        dispatcher: RecordingDispatcher::failing(),
        ..TestOptions::default()
    })
    .await;
    store_object(&app.storage, "videos/original/10_clip.mp4", b"0123456789").await;

    let response = create(&app, json!({"title": "Clip", "video": "videos/original/10_clip.mp4"})).await;
    assert_eq!(response.status_code(), 201);

    let requests = app.requests.all();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.uuid.is_none()));
}

#[tokio::test]
async fn test_get_video() {
    let app = setup_test_app().await;
    let created: JsonValue = create(&app, json!({"title": "Clip"})).await.json();
    let id = created["id"].as_str().unwrap();

    let response = app.client().get(&format!("/api/v0/videos/{}", id)).await;
    assert_eq!(response.status_code(), 200);
    let body: JsonValue = response.json();
    assert_eq!(body["id"], created["id"]);

    let response = app
        .client()
        .get(&format!("/api/v0/videos/{}", uuid::Uuid::new_v4()))
        .await;
    assert_eq!(response.status_code(), 404);
    let body: JsonValue = response.json();
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_replace_file_reprocesses() {
    let app = setup_test_app().await;
    let created: JsonValue = create(&app, json!({"title": "Clip"})).await.json();
    let id = created["id"].as_str().unwrap();
    store_object(&app.storage, "videos/original/4_new.mp4", b"0123").await;

    let response = app
        .client()
        .put(&format!("/api/v0/videos/{}/file", id))
        .json(&json!({"video": "videos/original/4_new.mp4"}))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: JsonValue = response.json();
    assert_eq!(body["video"], "videos/original/4_new.mp4");
    assert_eq!(app.dispatcher.jobs().len(), 2);

    let response = app
        .client()
        .put(&format!("/api/v0/videos/{}/file", uuid::Uuid::new_v4()))
        .json(&json!({"video": "videos/original/4_new.mp4"}))
        .await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_signed_url_per_quality() {
    let app = setup_test_app().await;
    store_object(&app.storage, "videos/original/10_clip.mp4", b"0123456789").await;
    let created: JsonValue = create(&app, json!({"title": "Clip", "video": "videos/original/10_clip.mp4"}))
        .await
        .json();
    let id = created["id"].as_str().unwrap();

    let response = app
        .client()
        .get(&format!("/api/v0/videos/{}/url/original", id))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: JsonValue = response.json();
    assert_eq!(body["quality"], "original");
    assert_eq!(
        body["url"],
        format!("{}/videos/original/10_clip.mp4", MEDIA_BASE_URL)
    );
    assert!(body["expires_in_secs"].is_null());

    // Not produced yet
    let response = app
        .client()
        .get(&format!("/api/v0/videos/{}/url/720p", id))
        .await;
    assert_eq!(response.status_code(), 404);

    let response = app
        .client()
        .get(&format!("/api/v0/videos/{}/url/8k", id))
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_renditions_of_unprocessed_video() {
    let app = setup_test_app().await;
    let created: JsonValue = create(&app, json!({"title": "Clip"})).await.json();
    let id = created["id"].as_str().unwrap();

    let response = app
        .client()
        .get(&format!("/api/v0/videos/{}/renditions", id))
        .await;
    assert_eq!(response.status_code(), 200);
    let renditions: Vec<JsonValue> = response.json();
    assert_eq!(renditions.len(), 5);
    assert!(renditions.iter().all(|r| r["status"].is_null() && r["available"] == false));
}

#[tokio::test]
async fn test_health_probes() {
    let app = setup_test_app().await;

    let response = app.client().get("/health").await;
    assert_eq!(response.status_code(), 200);
    let body: JsonValue = response.json();
    assert_eq!(body["status"], "alive");

    let response = app.client().get("/health/ready").await;
    assert_eq!(response.status_code(), 200);
    let body: JsonValue = response.json();
    assert_eq!(body["status"], "ready");
    assert_eq!(body["storage"], "healthy");
    assert!(body.get("database").is_none());
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = setup_test_app().await;

    let response = app.client().get("/api/openapi.json").await;
    assert_eq!(response.status_code(), 200);
    let body: JsonValue = response.json();
    assert!(body["paths"]["/api/v0/uploads/chunk"].is_object());
    assert!(body["paths"]["/api/v0/webhooks/processing"].is_object());
}
