use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::resolution::{Quality, Resolution};

/// A video entity with one storage slot per rendition.
///
/// Slots are declared up front for every supported resolution. A slot holds the
/// storage key of the object, not a URL.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Video {
    pub id: Uuid,
    pub title: String,
    pub video: Option<String>,
    pub video_2160p: Option<String>,
    pub video_1080p: Option<String>,
    pub video_720p: Option<String>,
    pub video_480p: Option<String>,
    pub video_360p: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Video {
    pub fn new(title: String, video: Option<String>) -> Self {
        let now = Utc::now();
        Video {
            id: Uuid::new_v4(),
            title,
            video,
            video_2160p: None,
            video_1080p: None,
            video_720p: None,
            video_480p: None,
            video_360p: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Storage key held by the slot for `quality`.
    pub fn slot(&self, quality: Quality) -> Option<&str> {
        match quality {
            Quality::Original => self.video.as_deref(),
            Quality::Scaled(Resolution::P2160) => self.video_2160p.as_deref(),
            Quality::Scaled(Resolution::P1080) => self.video_1080p.as_deref(),
            Quality::Scaled(Resolution::P720) => self.video_720p.as_deref(),
            Quality::Scaled(Resolution::P480) => self.video_480p.as_deref(),
            Quality::Scaled(Resolution::P360) => self.video_360p.as_deref(),
        }
    }

    pub fn set_slot(&mut self, quality: Quality, key: Option<String>) {
        let slot = match quality {
            Quality::Original => &mut self.video,
            Quality::Scaled(Resolution::P2160) => &mut self.video_2160p,
            Quality::Scaled(Resolution::P1080) => &mut self.video_1080p,
            Quality::Scaled(Resolution::P720) => &mut self.video_720p,
            Quality::Scaled(Resolution::P480) => &mut self.video_480p,
            Quality::Scaled(Resolution::P360) => &mut self.video_360p,
        };
        *slot = key;
    }
}

/// Column backing a slot.
pub fn slot_column(quality: Quality) -> &'static str {
    match quality {
        Quality::Original => "video",
        Quality::Scaled(Resolution::P2160) => "video_2160p",
        Quality::Scaled(Resolution::P1080) => "video_1080p",
        Quality::Scaled(Resolution::P720) => "video_720p",
        Quality::Scaled(Resolution::P480) => "video_480p",
        Quality::Scaled(Resolution::P360) => "video_360p",
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateVideoRequest {
    pub title: String,
    /// Storage key of a completed upload.
    pub video: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReplaceVideoFileRequest {
    /// Storage key of a completed upload.
    pub video: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SignedUrlResponse {
    pub quality: String,
    pub url: String,
    pub expires_in_secs: Option<u64>,
}

/// Latest processing state of one rendition.
#[derive(Debug, Serialize, ToSchema)]
pub struct RenditionStatus {
    pub resolution: Resolution,
    pub status: Option<String>,
    pub output_file_size_mb: Option<f64>,
    pub available: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_independent() {
        let mut video = Video::new("clip".to_string(), Some("videos/original/a.mp4".to_string()));
        video.set_slot(
            Quality::Scaled(Resolution::P720),
            Some("videos/720p/a.mp4".to_string()),
        );

        assert_eq!(video.slot(Quality::Original), Some("videos/original/a.mp4"));
        assert_eq!(
            video.slot(Quality::Scaled(Resolution::P720)),
            Some("videos/720p/a.mp4")
        );
        assert_eq!(video.slot(Quality::Scaled(Resolution::P480)), None);
    }

    #[test]
    fn slot_columns_follow_naming_convention() {
        assert_eq!(slot_column(Quality::Original), "video");
        for resolution in Resolution::ALL {
            assert_eq!(
                slot_column(Quality::Scaled(resolution)),
                format!("video_{}", resolution)
            );
        }
    }
}
