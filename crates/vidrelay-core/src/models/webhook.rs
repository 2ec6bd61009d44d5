use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use utoipa::ToSchema;

/// Signed callback body sent by the processing service.
///
/// Both fields are optional so that a missing one can be reported as a malformed
/// payload rather than a deserialization failure.
#[derive(Debug, Deserialize, ToSchema)]
pub struct WebhookEnvelope {
    #[schema(value_type = Object)]
    pub data: Option<JsonValue>,
    pub signature: Option<String>,
}

/// The authenticated `data` member of a callback.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct WebhookPayload {
    pub uuid: String,
    pub status: String,
    pub timestamp: String,
    #[serde(default)]
    pub video_duration: Option<f64>,
    #[serde(default)]
    pub output_file_size_mb: Option<f64>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Map<String, JsonValue>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookSuccess {
    pub status: String,
    pub message: String,
    #[schema(value_type = Object)]
    pub received_data: JsonValue,
}

impl WebhookSuccess {
    pub fn new(received_data: JsonValue) -> Self {
        WebhookSuccess {
            status: "success".to_string(),
            message: "Webhook processed successfully".to_string(),
            received_data,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookFailure {
    pub status: String,
    pub message: String,
}

impl WebhookFailure {
    pub fn new(message: impl Into<String>) -> Self {
        WebhookFailure {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}
