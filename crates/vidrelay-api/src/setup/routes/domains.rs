//! Domain route groups (uploads, webhooks, videos, health).

use crate::constants::{API_PREFIX, MULTIPART_OVERHEAD_BYTES, WEBHOOK_ROUTE};
use crate::handlers;
use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;
use std::sync::Arc;

pub fn upload_routes(max_chunk_size_bytes: usize) -> Router<Arc<AppState>> {
    let body_limit = max_chunk_size_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES);
    Router::new()
        .route(
            &format!("{}/uploads/chunk", API_PREFIX),
            post(handlers::chunked_upload::upload_chunk)
                .get(handlers::chunked_upload::probe_chunk),
        )
        .layer(DefaultBodyLimit::max(body_limit))
}

pub fn webhook_routes() -> Router<Arc<AppState>> {
    Router::new().route(WEBHOOK_ROUTE, post(handlers::webhooks::processing_webhook))
}

pub fn video_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(&format!("{}/videos", API_PREFIX), post(handlers::videos::create_video))
        .route(&format!("{}/videos/{{id}}", API_PREFIX), get(handlers::videos::get_video))
        .route(
            &format!("{}/videos/{{id}}/file", API_PREFIX),
            put(handlers::videos::replace_video_file),
        )
        .route(
            &format!("{}/videos/{{id}}/url/{{quality}}", API_PREFIX),
            get(handlers::videos::get_signed_url),
        )
        .route(
            &format!("{}/videos/{{id}}/renditions", API_PREFIX),
            get(handlers::videos::get_renditions),
        )
}

pub fn health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health::liveness_check))
        .route("/health/ready", get(handlers::health::readiness_check))
}
