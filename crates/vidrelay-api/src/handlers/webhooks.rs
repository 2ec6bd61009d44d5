//! Processing webhook handler.
//!
//! The processing service reads `status` and `message` from every answer, so this
//! endpoint renders its own JSON shape instead of `ErrorResponse`.

use crate::constants::SIGNATURE_HEADER;
use crate::error::log_error;
use crate::state::WebhookState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use vidrelay_core::error::INVALID_SIGNATURE_MESSAGE;
use vidrelay_core::models::{WebhookEnvelope, WebhookFailure, WebhookSuccess};
use vidrelay_core::AppError;

const UNKNOWN_REQUEST_MESSAGE: &str = "Processing request not found";
const UNEXPECTED_ERROR_MESSAGE: &str = "Unexpected error";

fn failure_response(err: AppError) -> Response {
    let (status, message) = match &err {
        AppError::MalformedPayload(message) => (StatusCode::BAD_REQUEST, message.clone()),
        AppError::InvalidSignature => {
            (StatusCode::FORBIDDEN, INVALID_SIGNATURE_MESSAGE.to_string())
        }
        AppError::UnknownRequest(_) => (StatusCode::NOT_FOUND, UNKNOWN_REQUEST_MESSAGE.to_string()),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            UNEXPECTED_ERROR_MESSAGE.to_string(),
        ),
    };
    log_error(&err);
    (status, Json(WebhookFailure::new(message))).into_response()
}

/// Receive a processing status callback
#[utoipa::path(
    post,
    path = "/api/v0/webhooks/processing",
    tag = "webhooks",
    request_body = WebhookEnvelope,
    responses(
        (status = 200, description = "Callback applied", body = WebhookSuccess),
        (status = 400, description = "Invalid JSON, or missing data or signature", body = WebhookFailure),
        (status = 403, description = "Invalid signature", body = WebhookFailure),
        (status = 404, description = "Unknown processing request", body = WebhookFailure),
        (status = 500, description = "Unexpected error", body = WebhookFailure)
    )
)]
pub async fn processing_webhook(
    State(webhooks): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature_header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    match webhooks.receiver.handle(&body, signature_header).await {
        Ok(success) => (StatusCode::OK, Json(success)).into_response(),
        Err(err) => failure_response(err),
    }
}
