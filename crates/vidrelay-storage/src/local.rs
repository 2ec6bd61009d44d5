use crate::keys::{join_key, split_prefix, validate_key};
use crate::traits::{ObjectReader, Storage, StorageError, StorageResult, StoredObject};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Local filesystem storage implementation
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "/var/lib/vidrelay/media")
    /// * `base_url` - Base URL for serving files (e.g., "http://localhost:4000/media")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        validate_key(storage_key)?;
        Ok(self.base_path.join(storage_key))
    }

    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Sibling path an object is staged at before being renamed into place.
    fn staging_path(path: &Path) -> PathBuf {
        let mut name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".{}.tmp", Uuid::new_v4()));
        path.with_file_name(name)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(storage_key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn content_length(&self, storage_key: &str) -> StorageResult<u64> {
        let path = self.key_to_path(storage_key)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(meta.len()),
            Ok(_) => Err(StorageError::NotFound(storage_key.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(storage_key.to_string()))
            }
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<StoredObject>> {
        let (dir, name_prefix) = split_prefix(prefix);
        let dir_path = if dir.is_empty() {
            self.base_path.clone()
        } else {
            self.key_to_path(dir)?
        };

        let mut entries = match fs::read_dir(&dir_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut objects = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            // Staged writes are not objects yet.
            if !name.starts_with(name_prefix) || name.ends_with(".tmp") {
                continue;
            }
            let meta = match entry.metadata().await {
                Ok(meta) => meta,
                // Removed by a concurrent delete between read_dir and stat.
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if !meta.is_file() {
                continue;
            }
            objects.push(StoredObject {
                key: join_key(dir, name),
                size: meta.len(),
            });
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn open(&self, storage_key: &str) -> StorageResult<ObjectReader> {
        let path = self.key_to_path(storage_key)?;
        match fs::File::open(&path).await {
            Ok(file) => Ok(Box::pin(file)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(storage_key.to_string()))
            }
            Err(e) => Err(StorageError::DownloadFailed(format!(
                "Failed to open file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Bytes,
        _content_type: &str,
    ) -> StorageResult<String> {
        let path = self.key_to_path(storage_key)?;
        let size = data.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::debug!(
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload_with_key successful"
        );

        Ok(self.generate_url(storage_key))
    }

    async fn upload_stream(
        &self,
        storage_key: &str,
        _content_type: &str,
        _content_length: Option<u64>,
        mut reader: ObjectReader,
    ) -> StorageResult<String> {
        let path = self.key_to_path(storage_key)?;
        let staging = Self::staging_path(&path);
        let start = std::time::Instant::now();

        self.ensure_parent_dir(&path).await?;

        let write_result: StorageResult<u64> = async {
            let mut file = fs::File::create(&staging).await.map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to create file {}: {}",
                    staging.display(),
                    e
                ))
            })?;

            let bytes_copied = tokio::io::copy(&mut reader, &mut file).await.map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to write stream to file {}: {}",
                    staging.display(),
                    e
                ))
            })?;

            file.sync_all().await.map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to sync file {}: {}",
                    staging.display(),
                    e
                ))
            })?;

            fs::rename(&staging, &path).await.map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to move {} into place: {}",
                    path.display(),
                    e
                ))
            })?;

            Ok(bytes_copied)
        }
        .await;

        let bytes_copied = match write_result {
            Ok(n) => n,
            Err(e) => {
                let _ = fs::remove_file(&staging).await;
                tracing::error!(
                    error = %e,
                    key = %storage_key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local storage stream upload failed"
                );
                return Err(e);
            }
        };

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            size_bytes = bytes_copied,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage stream upload successful"
        );

        Ok(self.generate_url(storage_key))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let path = self.key_to_path(storage_key)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(key = %storage_key, "Local storage delete successful");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to delete file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn get_presigned_url(
        &self,
        storage_key: &str,
        _expires_in: Duration,
    ) -> StorageResult<String> {
        self.key_to_path(storage_key)?;
        Ok(self.generate_url(storage_key))
    }

    fn public_url(&self, storage_key: &str) -> String {
        self.generate_url(storage_key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::io::AsyncReadExt;

    async fn storage(dir: &tempfile::TempDir) -> LocalStorage {
        LocalStorage::new(dir.path(), "http://localhost:4000/media".to_string())
            .await
            .unwrap()
    }

    async fn read_all(storage: &LocalStorage, key: &str) -> Vec<u8> {
        let mut reader = storage.open(key).await.unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn test_upload_and_open() {
        let dir = tempdir().unwrap();
        let storage = storage(&dir).await;

        let url = storage
            .upload_with_key("videos/a.txt", Bytes::from_static(b"test data"), "text/plain")
            .await
            .unwrap();

        assert_eq!(url, "http://localhost:4000/media/videos/a.txt");
        assert_eq!(read_all(&storage, "videos/a.txt").await, b"test data");
        assert_eq!(storage.content_length("videos/a.txt").await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = storage(&dir).await;

        let result = storage.open("../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.delete("../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.exists("/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let storage = storage(&dir).await;

        storage
            .upload_with_key("a.bin", Bytes::from_static(b"x"), "application/octet-stream")
            .await
            .unwrap();
        storage.delete("a.bin").await.unwrap();
        storage.delete("a.bin").await.unwrap();
        assert!(!storage.exists("a.bin").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_object_reports_not_found() {
        let dir = tempdir().unwrap();
        let storage = storage(&dir).await;

        assert!(matches!(
            storage.content_length("missing.bin").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.open("missing.bin").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_filters_by_prefix_and_sorts() {
        let dir = tempdir().unwrap();
        let storage = storage(&dir).await;

        for (key, body) in [
            ("6_b.mp4_part_0002", &b"def"[..]),
            ("6_b.mp4_part_0001", &b"abc"[..]),
            ("6_bb.mp4_part_0001", &b"zz"[..]),
            ("9_c.mp4_part_0001", &b"q"[..]),
        ] {
            storage
                .upload_with_key(key, Bytes::copy_from_slice(body), "application/octet-stream")
                .await
                .unwrap();
        }

        let listed = storage.list("6_b.mp4_part_").await.unwrap();
        assert_eq!(
            listed,
            vec![
                StoredObject {
                    key: "6_b.mp4_part_0001".to_string(),
                    size: 3
                },
                StoredObject {
                    key: "6_b.mp4_part_0002".to_string(),
                    size: 3
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_list_in_missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        let storage = storage(&dir).await;
        assert!(storage.list("nested/none_").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stream_upload_replaces_existing_object() {
        let dir = tempdir().unwrap();
        let storage = storage(&dir).await;

        for body in [&b"first version"[..], &b"second"[..]] {
            let reader: ObjectReader = Box::pin(std::io::Cursor::new(body.to_vec()));
            storage
                .upload_stream("videos/original/6_b.mp4", "video/mp4", None, reader)
                .await
                .unwrap();
        }

        assert_eq!(read_all(&storage, "videos/original/6_b.mp4").await, b"second");
        let listed = storage.list("videos/original/").await.unwrap();
        assert_eq!(listed.len(), 1, "staging files must not remain");
    }
}
