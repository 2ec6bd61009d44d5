//! Storage abstraction trait
//!
//! Both the transient chunk namespace and the persistent store for assembled
//! uploads are reached through `Storage`.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncRead;
use vidrelay_core::AppError;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("Object not found: {}", key)),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Readable handle over a stored object.
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send + Unpin>>;

/// A listed object and its size in bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub size: u64,
}

/// Storage abstraction trait
///
/// Keys are `/`-separated relative paths. They must not contain `..` or start with `/`.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Check if an object exists
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Size in bytes of an object. Missing objects yield `StorageError::NotFound`.
    async fn content_length(&self, storage_key: &str) -> StorageResult<u64>;

    /// Every object whose key starts with `prefix`, sorted by key.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<StoredObject>>;

    /// Open an object for streaming reads.
    async fn open(&self, storage_key: &str) -> StorageResult<ObjectReader>;

    /// Write a small in-memory object, replacing any existing one.
    /// Backends with object metadata store `content_type` with it.
    /// Returns the public URL of the object.
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<String>;

    /// Write an object from a reader without buffering it whole, replacing any
    /// existing one. Repeating the write to the same key is safe; the last one wins.
    ///
    /// Returns the public URL of the object.
    async fn upload_stream(
        &self,
        storage_key: &str,
        content_type: &str,
        content_length: Option<u64>,
        reader: ObjectReader,
    ) -> StorageResult<String>;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Generate a temporary URL for direct access (GET)
    async fn get_presigned_url(
        &self,
        storage_key: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    /// Stable URL of an object, as handed to remote processing.
    fn public_url(&self, storage_key: &str) -> String;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
