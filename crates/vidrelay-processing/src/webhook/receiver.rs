//! Webhook state machine
//!
//! Authenticates status callbacks from the processing service and applies them to
//! the matching processing request. A completed job publishes its output into the
//! owning video's rendition slot.

use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use vidrelay_core::constants::VIDEOS_PATH_SEGMENT;
use vidrelay_core::models::{
    ProcessingRequest, ProcessingStatus, Quality, Resolution, WebhookEnvelope,
    WebhookPayload, WebhookSuccess,
};
use vidrelay_core::AppError;
use vidrelay_db::{ProcessingRequestStore, VideoStore};

use super::signature;

pub const INVALID_JSON_MESSAGE: &str = "Invalid JSON";
pub const MISSING_FIELDS_MESSAGE: &str = "Missing data or signature";

#[derive(Clone)]
pub struct WebhookReceiver {
    requests: Arc<dyn ProcessingRequestStore>,
    videos: Arc<dyn VideoStore>,
    secret: String,
    original_resolution: Resolution,
}

impl WebhookReceiver {
    pub fn new(
        requests: Arc<dyn ProcessingRequestStore>,
        videos: Arc<dyn VideoStore>,
        secret: String,
        original_resolution: Resolution,
    ) -> Self {
        Self {
            requests,
            videos,
            secret,
            original_resolution,
        }
    }

    /// Handle one callback body.
    ///
    /// The signature is read from the body's `signature` member, falling back to
    /// `signature_header` when the body carries none.
    #[tracing::instrument(skip_all, fields(job_uuid, status))]
    pub async fn handle(
        &self,
        raw_body: &[u8],
        signature_header: Option<&str>,
    ) -> Result<WebhookSuccess, AppError> {
        let envelope: WebhookEnvelope = serde_json::from_slice(raw_body)
            .map_err(|_| AppError::MalformedPayload(INVALID_JSON_MESSAGE.to_string()))?;

        let data = envelope
            .data
            .filter(|data| !data.is_null() && data.as_object().map_or(true, |o| !o.is_empty()))
            .ok_or_else(|| AppError::MalformedPayload(MISSING_FIELDS_MESSAGE.to_string()))?;
        let supplied = envelope
            .signature
            .or_else(|| signature_header.map(str::to_string))
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::MalformedPayload(MISSING_FIELDS_MESSAGE.to_string()))?;

        let valid = signature::verify(&self.secret, &data, &supplied)?;
        tracing::debug!(signature_valid = valid, "Webhook signature checked");
        if !valid {
            return Err(AppError::InvalidSignature);
        }

        let payload: WebhookPayload = serde_json::from_value(data.clone())
            .map_err(|e| AppError::MalformedPayload(format!("Invalid webhook data: {}", e)))?;
        let span = tracing::Span::current();
        span.record("job_uuid", payload.uuid.as_str());
        span.record("status", payload.status.as_str());

        let mut request = self
            .requests
            .find_by_uuid(&payload.uuid)
            .await?
            .ok_or_else(|| AppError::UnknownRequest(payload.uuid.clone()))?;

        let completed = apply_transition(&mut request, &payload);
        self.requests.save_transition(&request).await?;

        if completed {
            self.publish_rendition(&request).await?;
        }

        tracing::info!(
            request_id = %request.id,
            current_status = %request.status,
            "Webhook applied"
        );

        Ok(WebhookSuccess::new(data))
    }

    /// Point the owning video's slot at the finished rendition. This write goes
    /// straight to the store and never starts new processing.
    async fn publish_rendition(&self, request: &ProcessingRequest) -> Result<(), AppError> {
        let key = rendition_key(&request.upload_url)?;
        let quality = Quality::for_output(request.resolution, self.original_resolution);

        self.videos
            .set_slot(request.video_id, quality, Some(key.clone()))
            .await?
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "Video {} of processing request {} not found",
                    request.video_id, request.id
                ))
            })?;

        tracing::info!(
            video_id = %request.video_id,
            slot = %quality,
            key = %key,
            "Rendition published"
        );
        Ok(())
    }
}

/// Apply a callback to a request. Returns true when it moved the request to `completed`.
///
/// Every callback is recorded in the history. A request that reached a terminal
/// status keeps it; later callbacks with a different status are recorded only.
fn apply_transition(request: &mut ProcessingRequest, payload: &WebhookPayload) -> bool {
    request
        .history
        .insert(payload.timestamp.clone(), payload.status.clone());

    if request.is_terminal() && request.status != payload.status {
        tracing::warn!(
            request_id = %request.id,
            current_status = %request.status,
            reported_status = %payload.status,
            "Ignoring status change of a finished processing request"
        );
        return false;
    }

    let completed = payload.status == ProcessingStatus::Completed.as_str();
    if completed {
        request.video_duration = Some(payload.video_duration.unwrap_or(0.0));
        request.output_file_size_mb = Some(payload.output_file_size_mb.unwrap_or(0.0));
        request.metadata = JsonValue::Object(payload.metadata.clone().unwrap_or_else(Map::new));
    }
    request.status = payload.status.clone();

    completed
}

/// Storage key of a rendition: its upload URL path from the first `videos/` on.
fn rendition_key(upload_url: &str) -> Result<String, AppError> {
    let url = reqwest::Url::parse(upload_url)
        .map_err(|e| AppError::Internal(format!("Invalid upload URL {}: {}", upload_url, e)))?;
    let path = url.path();
    let start = path.find(VIDEOS_PATH_SEGMENT).ok_or_else(|| {
        AppError::Internal(format!(
            "Upload URL {} has no {} segment",
            upload_url, VIDEOS_PATH_SEGMENT
        ))
    })?;
    Ok(path[start..].to_string())
}
