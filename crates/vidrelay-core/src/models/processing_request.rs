use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt::{Display, Formatter, Result as FmtResult};
use utoipa::ToSchema;
use uuid::Uuid;

use super::resolution::Resolution;

/// Conventional job states. The persisted `status` column is free-form text so a
/// remote system can report states this enum does not know about.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        }
    }

    pub fn parse(status: &str) -> Option<Self> {
        match status {
            "pending" => Some(ProcessingStatus::Pending),
            "processing" => Some(ProcessingStatus::Processing),
            "completed" => Some(ProcessingStatus::Completed),
            "failed" => Some(ProcessingStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Failed)
    }
}

impl Display for ProcessingStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Returns true for `completed` and `failed`.
pub fn is_terminal_status(status: &str) -> bool {
    ProcessingStatus::parse(status).is_some_and(|s| s.is_terminal())
}

/// One remote transcoding job for one resolution of one video.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProcessingRequest {
    pub id: Uuid,
    /// Identifier returned by the processing service; set once.
    pub uuid: Option<String>,
    pub video_id: Uuid,
    pub resolution: Resolution,
    pub download_url: String,
    pub upload_url: String,
    pub webhook_url: String,
    pub download_provider: String,
    pub upload_provider: String,
    pub status: String,
    /// timestamp -> status, in arrival order.
    #[schema(value_type = Object)]
    pub history: IndexMap<String, String>,
    #[schema(value_type = Object)]
    pub metadata: JsonValue,
    pub output_file_size_mb: Option<f64>,
    pub video_duration: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcessingRequest {
    pub fn is_terminal(&self) -> bool {
        is_terminal_status(&self.status)
    }
}

/// Fields needed to create a pending request.
#[derive(Debug, Clone)]
pub struct NewProcessingRequest {
    pub video_id: Uuid,
    pub resolution: Resolution,
    pub download_url: String,
    pub upload_url: String,
    pub webhook_url: String,
    pub download_provider: String,
    pub upload_provider: String,
}

impl NewProcessingRequest {
    pub fn into_request(self, now: DateTime<Utc>) -> ProcessingRequest {
        ProcessingRequest {
            id: Uuid::new_v4(),
            uuid: None,
            video_id: self.video_id,
            resolution: self.resolution,
            download_url: self.download_url,
            upload_url: self.upload_url,
            webhook_url: self.webhook_url,
            download_provider: self.download_provider,
            upload_provider: self.upload_provider,
            status: ProcessingStatus::Pending.to_string(),
            history: IndexMap::new(),
            metadata: JsonValue::Object(Default::default()),
            output_file_size_mb: None,
            video_duration: None,
            created_at: now,
            updated_at: now,
        }
    }
}
