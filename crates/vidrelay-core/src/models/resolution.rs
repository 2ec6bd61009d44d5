use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;

use crate::constants::ORIGINAL_QUALITY;

/// Output resolution a transcoding job can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "video_resolution"))]
pub enum Resolution {
    #[serde(rename = "2160p")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "2160p"))]
    P2160,
    #[serde(rename = "1080p")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "1080p"))]
    P1080,
    #[serde(rename = "720p")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "720p"))]
    P720,
    #[serde(rename = "480p")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "480p"))]
    P480,
    #[serde(rename = "360p")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "360p"))]
    P360,
}

impl Resolution {
    /// Every resolution, highest first.
    pub const ALL: [Resolution; 5] = [
        Resolution::P2160,
        Resolution::P1080,
        Resolution::P720,
        Resolution::P480,
        Resolution::P360,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::P2160 => "2160p",
            Resolution::P1080 => "1080p",
            Resolution::P720 => "720p",
            Resolution::P480 => "480p",
            Resolution::P360 => "360p",
        }
    }
}

impl Display for Resolution {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resolution::ALL
            .into_iter()
            .find(|r| r.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| anyhow::anyhow!("Invalid resolution: {}", s))
    }
}

/// A requested rendition: the untouched original or a scaled resolution.
///
/// `Original` is what deployments list in `PROCESSING_RESOLUTIONS` to have the source
/// re-encoded in place; it is also the quality name used for the primary video slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quality {
    Original,
    Scaled(Resolution),
}

impl Quality {
    /// Maps a finished job's resolution onto the slot it fills.
    ///
    /// A job at the deployment's original resolution replaces the primary video; any
    /// other resolution lands in its own rendition slot.
    pub fn for_output(resolution: Resolution, original_resolution: Resolution) -> Self {
        if resolution == original_resolution {
            Quality::Original
        } else {
            Quality::Scaled(resolution)
        }
    }
}

impl Display for Quality {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Quality::Original => f.write_str(ORIGINAL_QUALITY),
            Quality::Scaled(resolution) => write!(f, "{}", resolution),
        }
    }
}

impl FromStr for Quality {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case(ORIGINAL_QUALITY) {
            return Ok(Quality::Original);
        }
        s.parse::<Resolution>()
            .map(Quality::Scaled)
            .map_err(|_| anyhow::anyhow!("Invalid quality: {}", s))
    }
}
