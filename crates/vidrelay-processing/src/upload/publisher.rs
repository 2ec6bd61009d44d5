//! Persistent publisher
//!
//! Moves a complete upload from the chunk namespace into the persistent store.
//! Chunks are removed only after the persistent write has succeeded, so a failed
//! publish can always be retried from the same chunks.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use vidrelay_core::constants::VIDEO_CONTENT_TYPE;
use vidrelay_core::AppError;
use vidrelay_storage::keys::join_key;
use vidrelay_storage::{Storage, StorageError};

use super::assembler::ChunkAssembler;
use super::session::UploadSession;

/// Where a finished upload ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedUpload {
    pub key: String,
    pub url: String,
    pub size: u64,
}

pub struct PersistentPublisher {
    assembler: ChunkAssembler,
    store: Arc<dyn Storage>,
    upload_to: String,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl PersistentPublisher {
    pub fn new(assembler: ChunkAssembler, store: Arc<dyn Storage>, upload_to: String) -> Self {
        Self {
            assembler,
            store,
            upload_to,
            locks: DashMap::new(),
        }
    }

    pub fn assembler(&self) -> &ChunkAssembler {
        &self.assembler
    }

    pub fn destination_key(&self, session: &UploadSession) -> String {
        join_key(&self.upload_to, &session.session_key())
    }

    /// The persisted object of a session, if one with the declared size exists.
    pub async fn find_existing(
        &self,
        session: &UploadSession,
    ) -> Result<Option<PublishedUpload>, AppError> {
        let key = self.destination_key(session);
        match self.store.content_length(&key).await {
            Ok(size) if size == session.total_size => Ok(Some(PublishedUpload {
                url: self.store.public_url(&key),
                key,
                size,
            })),
            Ok(_) | Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Assemble the session's chunks, persist the result and clear the chunks.
    ///
    /// Calls for the same session are serialised. A caller that loses the race finds
    /// the chunks gone and gets the already persisted object instead.
    pub async fn publish(&self, session: &UploadSession) -> Result<PublishedUpload, AppError> {
        let entry = SessionLock::acquire(&self.locks, session.session_key());
        let _guard = entry.lock.lock().await;
        self.publish_locked(session).await
    }

    async fn publish_locked(&self, session: &UploadSession) -> Result<PublishedUpload, AppError> {
        let session_key = session.session_key();
        let stored = self.assembler.total_stored_size(session).await?;
        if stored != session.total_size {
            if let Some(existing) = self.find_existing(session).await? {
                tracing::debug!(session_key = %session_key, key = %existing.key, "Upload already published");
                return Ok(existing);
            }
            return Err(AppError::IncompleteUpload {
                session_key,
                stored,
                expected: session.total_size,
            });
        }

        let started = Instant::now();
        let key = self.destination_key(session);
        let assembled = self.assembler.assemble(session).await.inspect_err(|e| {
            tracing::error!(session_key = %session_key, error = %e, "Failed to assemble upload");
        })?;
        let size = assembled.size;
        let chunk_count = assembled.chunk_count;

        let url = match self
            .store
            .upload_stream(
                &key,
                content_type_for(session),
                Some(size),
                assembled.into_reader(),
            )
            .await
        {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(
                    session_key = %session_key,
                    key = %key,
                    chunk_count,
                    bytes = size,
                    duration_ms = started.elapsed().as_millis() as u64,
                    error = %e,
                    "Failed to persist assembled upload; chunks kept for retry"
                );
                return Err(AppError::PersistFailure {
                    key,
                    message: e.to_string(),
                });
            }
        };

        let removed = self.assembler.delete_chunks(session).await?;

        tracing::info!(
            session_key = %session_key,
            key = %key,
            chunk_count,
            chunks_removed = removed,
            bytes = size,
            duration_ms = started.elapsed().as_millis() as u64,
            "Upload published"
        );

        Ok(PublishedUpload { key, url, size })
    }
}

/// A caller's handle on a session lock. Dropping it, including when the publish
/// future is cancelled, removes the map entry once no other caller holds it.
struct SessionLock<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    key: String,
    lock: Arc<Mutex<()>>,
}

impl<'a> SessionLock<'a> {
    fn acquire(locks: &'a DashMap<String, Arc<Mutex<()>>>, key: String) -> Self {
        let lock = locks.entry(key.clone()).or_default().clone();
        Self { locks, key, lock }
    }
}

impl Drop for SessionLock<'_> {
    fn drop(&mut self) {
        // The map and this handle are the only owners left.
        self.locks.remove_if(&self.key, |_, lock| {
            Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2
        });
    }
}

fn content_type_for(session: &UploadSession) -> &'static str {
    match session.extension().as_deref() {
        Some("mp4") | Some("m4v") => VIDEO_CONTENT_TYPE,
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;
    use vidrelay_storage::{LocalStorage, ObjectReader, StorageBackend, StorageResult, StoredObject};

    struct Fixture {
        publisher: Arc<PersistentPublisher>,
        store: Arc<LocalStorage>,
        _chunk_dir: TempDir,
        _store_dir: TempDir,
    }

    async fn fixture() -> Fixture {
        let chunk_dir = TempDir::new().unwrap();
        let store_dir = TempDir::new().unwrap();
        let chunks = LocalStorage::new(chunk_dir.path(), "file:///chunks".to_string())
            .await
            .unwrap();
        let store = Arc::new(
            LocalStorage::new(store_dir.path(), "http://media.test".to_string())
                .await
                .unwrap(),
        );
        let publisher = PersistentPublisher::new(
            ChunkAssembler::new(Arc::new(chunks)),
            store.clone(),
            "videos/original".to_string(),
        );
        Fixture {
            publisher: Arc::new(publisher),
            store,
            _chunk_dir: chunk_dir,
            _store_dir: store_dir,
        }
    }

    async fn read_object(store: &LocalStorage, key: &str) -> Vec<u8> {
        let mut reader = store.open(key).await.unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn publishes_and_clears_chunks() {
        let f = fixture().await;
        let session = UploadSession::new("clip.mp4", 6, 1, 3).unwrap();
        let assembler = f.publisher.assembler();
        assembler
            .save_chunk(&session, 2, Bytes::from_static(b"def"))
            .await
            .unwrap();
        assembler
            .save_chunk(&session, 1, Bytes::from_static(b"abc"))
            .await
            .unwrap();

        let published = f.publisher.publish(&session).await.unwrap();

        assert_eq!(published.key, "videos/original/6_clip.mp4");
        assert_eq!(published.url, "http://media.test/videos/original/6_clip.mp4");
        assert_eq!(published.size, 6);
        assert_eq!(read_object(&f.store, &published.key).await, b"abcdef");
        assert!(assembler.list_chunks(&session).await.unwrap().is_empty());
        assert!(f.publisher.locks.is_empty());
    }

    #[tokio::test]
    async fn incomplete_session_is_not_published() {
        let f = fixture().await;
        let session = UploadSession::new("clip.mp4", 6, 1, 3).unwrap();
        f.publisher
            .assembler()
            .save_chunk(&session, 1, Bytes::from_static(b"abc"))
            .await
            .unwrap();

        assert!(matches!(
            f.publisher.publish(&session).await,
            Err(AppError::IncompleteUpload { .. })
        ));
        assert!(!f.store.exists("videos/original/6_clip.mp4").await.unwrap());
        assert_eq!(
            f.publisher.assembler().list_chunks(&session).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn concurrent_publishes_assemble_once() {
        let f = fixture().await;
        let session = UploadSession::new("clip.mp4", 3, 1, 3).unwrap();
        f.publisher
            .assembler()
            .save_chunk(&session, 1, Bytes::from_static(b"abc"))
            .await
            .unwrap();

        let a = {
            let publisher = f.publisher.clone();
            let session = session.clone();
            tokio::spawn(async move { publisher.publish(&session).await })
        };
        let b = {
            let publisher = f.publisher.clone();
            let session = session.clone();
            tokio::spawn(async move { publisher.publish(&session).await })
        };

        let first = a.await.unwrap().unwrap();
        let second = b.await.unwrap().unwrap();
        assert_eq!(first.key, second.key);
        assert_eq!(read_object(&f.store, &first.key).await, b"abc");
        assert!(f.publisher.locks.is_empty());
    }

    #[tokio::test]
    async fn existing_object_with_wrong_size_is_ignored() {
        let f = fixture().await;
        let session = UploadSession::new("clip.mp4", 3, 1, 3).unwrap();
        f.store
            .upload_with_key(
                "videos/original/3_clip.mp4",
                Bytes::from_static(b"ab"),
                "video/mp4",
            )
            .await
            .unwrap();

        assert!(f.publisher.find_existing(&session).await.unwrap().is_none());
    }

    /// Persistent store whose writes fail, or never finish when `stall` is set.
    /// Records the content type of the last stream write.
    #[derive(Default)]
    struct BrokenStore {
        stall: bool,
        content_type: std::sync::Mutex<Option<String>>,
    }

    #[async_trait]
    impl Storage for BrokenStore {
        async fn exists(&self, _key: &str) -> StorageResult<bool> {
            Ok(false)
        }

        async fn content_length(&self, key: &str) -> StorageResult<u64> {
            Err(StorageError::NotFound(key.to_string()))
        }

        async fn list(&self, _prefix: &str) -> StorageResult<Vec<StoredObject>> {
            Ok(Vec::new())
        }

        async fn open(&self, key: &str) -> StorageResult<ObjectReader> {
            Err(StorageError::NotFound(key.to_string()))
        }

        async fn upload_with_key(
            &self,
            _key: &str,
            _data: Bytes,
            _content_type: &str,
        ) -> StorageResult<String> {
            Err(StorageError::UploadFailed("bucket unavailable".to_string()))
        }

        async fn upload_stream(
            &self,
            _key: &str,
            content_type: &str,
            _content_length: Option<u64>,
            _reader: ObjectReader,
        ) -> StorageResult<String> {
            *self.content_type.lock().unwrap() = Some(content_type.to_string());
            if self.stall {
                std::future::pending::<()>().await;
            }
            Err(StorageError::UploadFailed("bucket unavailable".to_string()))
        }

        async fn delete(&self, _key: &str) -> StorageResult<()> {
            Ok(())
        }

        async fn get_presigned_url(&self, key: &str, _expires_in: Duration) -> StorageResult<String> {
            Err(StorageError::NotFound(key.to_string()))
        }

        fn public_url(&self, key: &str) -> String {
            format!("http://broken.test/{}", key)
        }

        fn backend_type(&self) -> StorageBackend {
            StorageBackend::S3
        }
    }

    /// Publisher over `store` with one complete 3-byte session already chunked.
    async fn broken_publisher(
        store: Arc<BrokenStore>,
    ) -> (PersistentPublisher, UploadSession, TempDir) {
        let chunk_dir = TempDir::new().unwrap();
        let chunks = LocalStorage::new(chunk_dir.path(), "file:///chunks".to_string())
            .await
            .unwrap();
        let publisher = PersistentPublisher::new(
            ChunkAssembler::new(Arc::new(chunks)),
            store,
            "videos/original".to_string(),
        );
        let session = UploadSession::new("clip.mp4", 3, 1, 3).unwrap();
        publisher
            .assembler()
            .save_chunk(&session, 1, Bytes::from_static(b"abc"))
            .await
            .unwrap();
        (publisher, session, chunk_dir)
    }

    #[tokio::test]
    async fn persist_failure_keeps_chunks() {
        let store = Arc::new(BrokenStore::default());
        let (publisher, session, _chunk_dir) = broken_publisher(store.clone()).await;

        match publisher.publish(&session).await {
            Err(AppError::PersistFailure { key, .. }) => {
                assert_eq!(key, "videos/original/3_clip.mp4")
            }
            other => panic!("expected PersistFailure, got {:?}", other),
        }
        assert!(publisher.assembler().is_complete(&session).await.unwrap());
        assert!(publisher.locks.is_empty());
    }

    #[tokio::test]
    async fn persistent_write_carries_content_type() {
        let store = Arc::new(BrokenStore::default());
        let (publisher, session, _chunk_dir) = broken_publisher(store.clone()).await;

        let _ = publisher.publish(&session).await;

        assert_eq!(
            store.content_type.lock().unwrap().as_deref(),
            Some("video/mp4")
        );
    }

    #[tokio::test]
    async fn cancelled_publish_releases_session_lock() {
        let store = Arc::new(BrokenStore {
            stall: true,
            ..BrokenStore::default()
        });
        let (publisher, session, _chunk_dir) = broken_publisher(store).await;

        let timed_out =
            tokio::time::timeout(Duration::from_millis(100), publisher.publish(&session)).await;

        assert!(timed_out.is_err());
        assert!(publisher.locks.is_empty());
        assert!(publisher.assembler().is_complete(&session).await.unwrap());
    }

    #[test]
    fn content_type_follows_extension() {
        let mp4 = UploadSession::new("a.MP4", 1, 1, 1).unwrap();
        let other = UploadSession::new("a.bin", 1, 1, 1).unwrap();
        assert_eq!(content_type_for(&mp4), "video/mp4");
        assert_eq!(content_type_for(&other), "application/octet-stream");
    }
}
