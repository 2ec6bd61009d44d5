//! Video handlers: create, fetch, file replacement, signed URLs and rendition status.

use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::VideoState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use vidrelay_core::models::{
    CreateVideoRequest, Quality, RenditionStatus, ReplaceVideoFileRequest, SignedUrlResponse,
    Video,
};
use vidrelay_core::AppError;

/// Create a video from a published upload and start processing it
#[utoipa::path(
    post,
    path = "/api/v0/videos",
    tag = "videos",
    request_body = CreateVideoRequest,
    responses(
        (status = 201, description = "Video created", body = Video),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn create_video(
    State(videos): State<VideoState>,
    ValidatedJson(request): ValidatedJson<CreateVideoRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let video = videos.service.create(request).await?;
    Ok((StatusCode::CREATED, Json(video)))
}

#[utoipa::path(
    get,
    path = "/api/v0/videos/{id}",
    tag = "videos",
    params(
        ("id" = Uuid, Path, description = "Video ID")
    ),
    responses(
        (status = 200, description = "Video found", body = Video),
        (status = 404, description = "Video not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(video_id = %id, operation = "get_video"))]
pub async fn get_video(
    State(videos): State<VideoState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let video = videos.service.get(id).await?;
    Ok(Json(video))
}

/// Point the video at a new upload and reprocess it
#[utoipa::path(
    put,
    path = "/api/v0/videos/{id}/file",
    tag = "videos",
    params(
        ("id" = Uuid, Path, description = "Video ID")
    ),
    request_body = ReplaceVideoFileRequest,
    responses(
        (status = 200, description = "File replaced", body = Video),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "Video not found", body = ErrorResponse)
    )
)]
pub async fn replace_video_file(
    State(videos): State<VideoState>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<ReplaceVideoFileRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let video = videos.service.replace_file(id, request).await?;
    Ok(Json(video))
}

/// Fresh URL for one rendition
#[utoipa::path(
    get,
    path = "/api/v0/videos/{id}/url/{quality}",
    tag = "videos",
    params(
        ("id" = Uuid, Path, description = "Video ID"),
        ("quality" = String, Path, description = "`original` or a resolution such as `720p`")
    ),
    responses(
        (status = 200, description = "Signed URL", body = SignedUrlResponse),
        (status = 400, description = "Unknown quality", body = ErrorResponse),
        (status = 404, description = "Video or rendition not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(video_id = %id, quality = %quality))]
pub async fn get_signed_url(
    State(videos): State<VideoState>,
    Path((id, quality)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, HttpAppError> {
    let quality: Quality = quality
        .parse()
        .map_err(|e: anyhow::Error| AppError::InvalidInput(e.to_string()))?;
    let url = videos.service.signed_url(id, quality).await?;
    Ok(Json(url))
}

/// Processing state of every resolution
#[utoipa::path(
    get,
    path = "/api/v0/videos/{id}/renditions",
    tag = "videos",
    params(
        ("id" = Uuid, Path, description = "Video ID")
    ),
    responses(
        (status = 200, description = "Rendition status per resolution", body = Vec<RenditionStatus>),
        (status = 404, description = "Video not found", body = ErrorResponse)
    )
)]
pub async fn get_renditions(
    State(videos): State<VideoState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let renditions = videos.service.renditions(id).await?;
    Ok(Json(renditions))
}
