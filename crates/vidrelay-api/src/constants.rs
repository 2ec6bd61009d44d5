//! API constants

pub use vidrelay_core::constants::{API_PREFIX, WEBHOOK_ROUTE};

/// Header carrying the webhook signature when the body has none.
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// Served OpenAPI document.
pub const OPENAPI_PATH: &str = "/api/openapi.json";

/// Slack on top of the largest chunk for the multipart framing and form fields.
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub const HEALTH_CHECK_TIMEOUT_SECS: u64 = 5;

/// Plain-text acknowledgements understood by resumable upload clients.
pub const CHUNK_UPLOADED: &str = "chunk uploaded";
pub const CHUNK_EXISTS: &str = "chunk exists";
pub const CHUNK_NOT_FOUND: &str = "chunk not found";
