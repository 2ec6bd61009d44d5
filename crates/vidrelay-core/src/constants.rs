//! Shared constants.

/// Separator between a session key and the chunk index.
pub const CHUNK_SUFFIX: &str = "_part_";

/// Chunk indexes are zero-padded to this width so names sort in upload order.
pub const CHUNK_INDEX_WIDTH: usize = 4;

/// Largest chunk index that fits the padded width.
pub const MAX_CHUNK_INDEX: u32 = 9999;

/// Copy buffer used when concatenating chunks.
pub const MERGE_BUFFER_SIZE: usize = 8 * 1024 * 1024;

/// Quality name of the primary video slot.
pub const ORIGINAL_QUALITY: &str = "original";

/// Path segment that precedes the storage key in rendition upload URLs.
pub const VIDEOS_PATH_SEGMENT: &str = "videos/";

/// Content type used for assembled uploads and renditions.
pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// Extension every rendition is written with.
pub const RENDITION_EXTENSION: &str = "mp4";

pub const API_PREFIX: &str = "/api/v0";
pub const WEBHOOK_ROUTE: &str = "/api/v0/webhooks/processing";
