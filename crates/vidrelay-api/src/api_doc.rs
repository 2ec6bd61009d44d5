//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use vidrelay_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Vidrelay API",
        version = "0.1.0",
        description = "Resumable chunked video uploads and remote transcoding. Uploads are assembled from Resumable.js chunks, handed to the processing service, and its signed webhook callbacks fill in one rendition per resolution. All endpoints are versioned under /api/v0/."
    ),
    paths(
        // Uploads
        handlers::chunked_upload::upload_chunk,
        handlers::chunked_upload::probe_chunk,
        // Webhooks
        handlers::webhooks::processing_webhook,
        // Videos
        handlers::videos::create_video,
        handlers::videos::get_video,
        handlers::videos::replace_video_file,
        handlers::videos::get_signed_url,
        handlers::videos::get_renditions,
        // Health
        handlers::health::liveness_check,
        handlers::health::readiness_check,
    ),
    components(
        schemas(
            error::ErrorResponse,
            models::ResumableParams,
            models::Video,
            models::CreateVideoRequest,
            models::ReplaceVideoFileRequest,
            models::SignedUrlResponse,
            models::RenditionStatus,
            models::Resolution,
            models::WebhookEnvelope,
            models::WebhookSuccess,
            models::WebhookFailure,
            handlers::health::ReadinessResponse,
        )
    ),
    tags(
        (name = "uploads", description = "Resumable chunked uploads"),
        (name = "webhooks", description = "Processing service callbacks"),
        (name = "videos", description = "Videos and their renditions"),
        (name = "health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;
