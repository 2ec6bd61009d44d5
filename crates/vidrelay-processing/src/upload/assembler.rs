//! Chunk assembler
//!
//! Stores chunks of in-progress uploads in the transient chunk namespace and
//! concatenates them once the stored byte count reaches the declared total.
//! Chunk state is read back from the store on every call.

use bytes::Bytes;
use std::io::SeekFrom;
use std::sync::Arc;
use std::time::Instant;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use vidrelay_core::constants::{CHUNK_INDEX_WIDTH, MERGE_BUFFER_SIZE};
use vidrelay_core::AppError;
use vidrelay_storage::{ObjectReader, Storage, StorageError, StoredObject};

use super::session::UploadSession;

const CHUNK_CONTENT_TYPE: &str = "application/octet-stream";

/// A fully concatenated upload, positioned at its first byte.
pub struct AssembledUpload {
    pub file: File,
    pub size: u64,
    pub chunk_count: usize,
}

impl AssembledUpload {
    pub fn into_reader(self) -> ObjectReader {
        Box::pin(self.file)
    }
}

#[derive(Clone)]
pub struct ChunkAssembler {
    chunks: Arc<dyn Storage>,
}

impl ChunkAssembler {
    pub fn new(chunks: Arc<dyn Storage>) -> Self {
        Self { chunks }
    }

    /// True only when the chunk is stored with exactly `declared_size` bytes.
    /// A chunk of any other size has to be sent again.
    pub async fn chunk_exists(
        &self,
        session: &UploadSession,
        index: u32,
        declared_size: u64,
    ) -> Result<bool, AppError> {
        match self
            .chunks
            .content_length(&session.chunk_name_for(index))
            .await
        {
            Ok(size) => Ok(size == declared_size),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Store a chunk, replacing whatever a previous attempt left at that index.
    #[tracing::instrument(skip(self, session, data), fields(session_key = %session.session_key(), chunk_index = index, bytes = data.len()))]
    pub async fn save_chunk(
        &self,
        session: &UploadSession,
        index: u32,
        data: Bytes,
    ) -> Result<(), AppError> {
        let name = session.chunk_name_for(index);
        self.chunks.delete(&name).await?;
        self.chunks
            .upload_with_key(&name, data, CHUNK_CONTENT_TYPE)
            .await?;
        tracing::debug!("Chunk stored");
        Ok(())
    }

    async fn stored_chunks(&self, session: &UploadSession) -> Result<Vec<StoredObject>, AppError> {
        let prefix = session.chunk_prefix();
        let mut chunks: Vec<StoredObject> = self
            .chunks
            .list(&prefix)
            .await?
            .into_iter()
            .filter(|object| is_chunk_name(&object.key, &prefix))
            .collect();
        chunks.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(chunks)
    }

    /// Names of every stored chunk of the session, in index order.
    pub async fn list_chunks(&self, session: &UploadSession) -> Result<Vec<String>, AppError> {
        Ok(self
            .stored_chunks(session)
            .await?
            .into_iter()
            .map(|object| object.key)
            .collect())
    }

    pub async fn total_stored_size(&self, session: &UploadSession) -> Result<u64, AppError> {
        Ok(self
            .stored_chunks(session)
            .await?
            .iter()
            .map(|object| object.size)
            .sum())
    }

    /// Completeness is judged by byte count alone.
    pub async fn is_complete(&self, session: &UploadSession) -> Result<bool, AppError> {
        Ok(self.total_stored_size(session).await? == session.total_size)
    }

    /// Concatenate every chunk into an anonymous temporary file.
    ///
    /// Chunks are streamed through a single fixed-size buffer, so memory use does not
    /// grow with the upload.
    #[tracing::instrument(skip(self, session), fields(session_key = %session.session_key()))]
    pub async fn assemble(&self, session: &UploadSession) -> Result<AssembledUpload, AppError> {
        let started = Instant::now();
        let chunks = self.stored_chunks(session).await?;
        let stored: u64 = chunks.iter().map(|object| object.size).sum();
        if stored != session.total_size {
            return Err(AppError::IncompleteUpload {
                session_key: session.session_key(),
                stored,
                expected: session.total_size,
            });
        }

        let temp = tokio::task::spawn_blocking(tempfile::tempfile)
            .await
            .map_err(|e| AppError::Internal(format!("Temporary file task failed: {}", e)))??;
        let mut output = File::from_std(temp);
        let mut buffer = vec![0u8; MERGE_BUFFER_SIZE];
        let mut written: u64 = 0;

        for chunk in &chunks {
            let mut reader = self.chunks.open(&chunk.key).await?;
            loop {
                let n = reader.read(&mut buffer).await?;
                if n == 0 {
                    break;
                }
                output.write_all(&buffer[..n]).await?;
                written += n as u64;
            }
        }

        // A chunk replaced between listing and reading changes the byte count.
        if written != session.total_size {
            return Err(AppError::IncompleteUpload {
                session_key: session.session_key(),
                stored: written,
                expected: session.total_size,
            });
        }

        output.flush().await?;
        output.seek(SeekFrom::Start(0)).await?;

        tracing::info!(
            chunk_count = chunks.len(),
            bytes = written,
            duration_ms = started.elapsed().as_millis() as u64,
            "Upload assembled"
        );

        Ok(AssembledUpload {
            file: output,
            size: written,
            chunk_count: chunks.len(),
        })
    }

    /// Best-effort removal of every chunk of the session. Returns how many were removed.
    pub async fn delete_chunks(&self, session: &UploadSession) -> Result<usize, AppError> {
        let mut removed = 0;
        for name in self.list_chunks(session).await? {
            match self.chunks.delete(&name).await {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!(
                    session_key = %session.session_key(),
                    chunk = %name,
                    error = %e,
                    "Failed to delete chunk"
                ),
            }
        }
        Ok(removed)
    }
}

fn is_chunk_name(key: &str, prefix: &str) -> bool {
    key.strip_prefix(prefix).is_some_and(|index| {
        index.len() == CHUNK_INDEX_WIDTH && index.bytes().all(|b| b.is_ascii_digit())
    })
}
