//! Error types module
//!
//! All failures of the upload assembler, the webhook state machine and the
//! surrounding services are unified under `AppError`. Each variant describes its
//! own HTTP presentation through `ErrorMetadata`.
//!
//! The `Database` variant wraps `sqlx::Error` when the `sqlx` feature is enabled and
//! falls back to a plain message otherwise.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "INVALID_SIGNATURE")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// Message rendered for every signature failure, whatever the cause.
pub const INVALID_SIGNATURE_MESSAGE: &str = "Invalid signature";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Missing or invalid parameter: {0}")]
    MissingParameter(String),

    #[error("Upload {session_key} incomplete: {stored} of {expected} bytes stored")]
    IncompleteUpload {
        session_key: String,
        stored: u64,
        expected: u64,
    },

    #[error("Chunk {index} size mismatch: declared {declared} bytes, received {received}")]
    ChunkSizeMismatch {
        index: u32,
        declared: u64,
        received: u64,
    },

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Unknown processing request: {0}")]
    UnknownRequest(String),

    #[error("Failed to persist {key}: {message}")]
    PersistFailure { key: String, message: String },

    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Job dispatch error: {0}")]
    Dispatch(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::MalformedPayload(format!("JSON parsing error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("UUID parsing error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
/// client_message stays per-variant for dynamic content.
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::InvalidFilename(_) => (
            400,
            "INVALID_FILENAME",
            false,
            Some("Remove path separators from the file name"),
            false,
            LogLevel::Debug,
        ),
        AppError::MissingParameter(_) => (
            400,
            "MISSING_PARAMETER",
            false,
            Some("Send every resumable upload parameter"),
            false,
            LogLevel::Debug,
        ),
        // Polling an unfinished upload is a normal state, not a failure.
        AppError::IncompleteUpload { .. } => (
            409,
            "INCOMPLETE_UPLOAD",
            true,
            Some("Upload the remaining chunks"),
            false,
            LogLevel::Debug,
        ),
        AppError::ChunkSizeMismatch { .. } => (
            400,
            "CHUNK_SIZE_MISMATCH",
            true,
            Some("Re-send the chunk"),
            false,
            LogLevel::Debug,
        ),
        AppError::MalformedPayload(_) => (
            400,
            "MALFORMED_PAYLOAD",
            false,
            Some("Check the request body format"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidSignature => (
            403,
            "INVALID_SIGNATURE",
            false,
            None,
            false,
            LogLevel::Warn,
        ),
        AppError::UnknownRequest(_) => (
            404,
            "UNKNOWN_REQUEST",
            false,
            Some("Verify the job identifier"),
            false,
            LogLevel::Debug,
        ),
        AppError::PersistFailure { .. } => (
            500,
            "PERSIST_FAILURE",
            true,
            Some("Retry the final chunk request"),
            true,
            LogLevel::Error,
        ),
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Dispatch(_) => (
            502,
            "DISPATCH_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the resource ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::PayloadTooLarge(_) => (
            413,
            "PAYLOAD_TOO_LARGE",
            false,
            Some("Reduce file size"),
            false,
            LogLevel::Debug,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::InvalidFilename(_) => "InvalidFilename",
            AppError::MissingParameter(_) => "MissingParameter",
            AppError::IncompleteUpload { .. } => "IncompleteUpload",
            AppError::ChunkSizeMismatch { .. } => "ChunkSizeMismatch",
            AppError::MalformedPayload(_) => "MalformedPayload",
            AppError::InvalidSignature => "InvalidSignature",
            AppError::UnknownRequest(_) => "UnknownRequest",
            AppError::PersistFailure { .. } => "PersistFailure",
            AppError::Database(_) => "Database",
            AppError::Storage(_) => "Storage",
            AppError::Dispatch(_) => "Dispatch",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::NotFound(_) => "NotFound",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::Internal(_) | AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::InvalidFilename(ref msg) => msg.clone(),
            AppError::MissingParameter(ref msg) => msg.clone(),
            AppError::IncompleteUpload {
                stored, expected, ..
            } => format!("Upload incomplete: {} of {} bytes received", stored, expected),
            AppError::ChunkSizeMismatch {
                index,
                declared,
                received,
            } => format!(
                "Chunk {} declared {} bytes but {} were received",
                index, declared, received
            ),
            AppError::MalformedPayload(ref msg) => msg.clone(),
            AppError::InvalidSignature => INVALID_SIGNATURE_MESSAGE.to_string(),
            AppError::UnknownRequest(_) => "Processing request not found".to_string(),
            AppError::PersistFailure { .. } => "Failed to store the assembled upload".to_string(),
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::Dispatch(_) => "Failed to submit processing job".to_string(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::PayloadTooLarge(ref msg) => msg.clone(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}
