//! Resumable chunked upload handlers.
//!
//! Speaks the Resumable.js protocol: the client POSTs each chunk as multipart form
//! data and may probe with a GET before sending. Responses are plain text. A finished
//! upload answers with the storage key of the assembled object.

use crate::constants::{CHUNK_EXISTS, CHUNK_NOT_FOUND, CHUNK_UPLOADED};
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::UploadState;
use axum::{
    extract::{multipart::MultipartError, Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use vidrelay_core::models::ResumableParams;
use vidrelay_core::AppError;
use vidrelay_processing::{ChunkOutcome, ProbeOutcome};

/// Chunk body plus the resumable form fields of one POST.
struct ChunkForm {
    params: ResumableParams,
    data: Bytes,
}

fn multipart_error(e: MultipartError, context: &str) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::PayloadTooLarge("Chunk exceeds the maximum chunk size".to_string());
    }
    AppError::InvalidInput(format!("{}: {}", context, e))
}

/// Read the `file` part and the resumable form fields. Unknown fields are ignored.
async fn extract_chunk_form(mut multipart: Multipart) -> Result<ChunkForm, AppError> {
    let mut params = ResumableParams::default();
    let mut data: Option<Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, "Failed to read multipart"))?
    {
        let field_name = field.name().map(|s| s.to_string()).unwrap_or_default();

        if field_name == "file" {
            if data.is_some() {
                return Err(AppError::InvalidInput(
                    "Multiple file fields are not allowed; send exactly one field named 'file'"
                        .to_string(),
                ));
            }
            data = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(e, "Failed to read chunk data"))?,
            );
            continue;
        }

        let slot = match field_name.as_str() {
            "resumableFilename" => &mut params.resumable_filename,
            "resumableTotalSize" => &mut params.resumable_total_size,
            "resumableChunkNumber" => &mut params.resumable_chunk_number,
            "resumableCurrentChunkSize" => &mut params.resumable_current_chunk_size,
            _ => continue,
        };
        let value = field
            .text()
            .await
            .map_err(|e| multipart_error(e, "Failed to read form field"))?;
        *slot = Some(value);
    }

    let data = data.ok_or_else(|| AppError::InvalidInput("No file provided".to_string()))?;
    Ok(ChunkForm { params, data })
}

/// Upload one chunk
#[utoipa::path(
    post,
    path = "/api/v0/uploads/chunk",
    tag = "uploads",
    request_body(content_type = "multipart/form-data", description = "Field `file` with the chunk bytes plus resumableFilename, resumableTotalSize, resumableChunkNumber and resumableCurrentChunkSize"),
    responses(
        (status = 200, description = "`chunk uploaded`, or the storage key once the upload is complete", body = String),
        (status = 400, description = "Invalid or missing parameters", body = ErrorResponse),
        (status = 413, description = "Upload exceeds the size limit", body = ErrorResponse),
        (status = 500, description = "Assembled upload could not be stored", body = ErrorResponse)
    )
)]
pub async fn upload_chunk(
    State(uploads): State<UploadState>,
    multipart: Multipart,
) -> Result<Response, HttpAppError> {
    let form = extract_chunk_form(multipart).await?;

    match uploads.service.receive_chunk(&form.params, form.data).await {
        Ok(ChunkOutcome::Stored) => Ok(CHUNK_UPLOADED.into_response()),
        Ok(ChunkOutcome::Completed(published)) => Ok(published.key.into_response()),
        // Another request emptied the session between the check and the publish.
        Err(AppError::IncompleteUpload { .. }) => Ok(CHUNK_UPLOADED.into_response()),
        Err(e) => Err(e.into()),
    }
}

/// Probe for one chunk
#[utoipa::path(
    get,
    path = "/api/v0/uploads/chunk",
    tag = "uploads",
    params(ResumableParams),
    responses(
        (status = 200, description = "`chunk exists`, or the storage key once the upload is complete", body = String),
        (status = 404, description = "`chunk not found`", body = String),
        (status = 400, description = "Invalid or missing parameters", body = ErrorResponse)
    )
)]
pub async fn probe_chunk(
    State(uploads): State<UploadState>,
    Query(params): Query<ResumableParams>,
) -> Result<Response, HttpAppError> {
    match uploads.service.probe(&params).await {
        Ok(ProbeOutcome::Missing) => Ok((StatusCode::NOT_FOUND, CHUNK_NOT_FOUND).into_response()),
        Ok(ProbeOutcome::Present) => Ok(CHUNK_EXISTS.into_response()),
        Ok(ProbeOutcome::Completed(published)) => Ok(published.key.into_response()),
        Err(AppError::IncompleteUpload { .. }) => Ok(CHUNK_EXISTS.into_response()),
        Err(e) => Err(e.into()),
    }
}
