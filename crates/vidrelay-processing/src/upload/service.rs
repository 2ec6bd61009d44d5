//! Resumable upload service
//!
//! Drives the chunk POST and probe GET of a Resumable.js client.

use bytes::Bytes;
use std::sync::Arc;
use vidrelay_core::models::ResumableParams;
use vidrelay_core::AppError;

use super::policy::UploadPolicy;
use super::publisher::{PersistentPublisher, PublishedUpload};
use super::session::UploadSession;

/// Result of receiving one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Stored; the upload still misses chunks.
    Stored,
    /// This chunk completed the upload, which is now persisted.
    Completed(PublishedUpload),
}

/// Result of probing for one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The client has to send this chunk.
    Missing,
    /// The chunk is stored; the upload is not complete yet.
    Present,
    Completed(PublishedUpload),
}

#[derive(Clone)]
pub struct ResumableUploadService {
    publisher: Arc<PersistentPublisher>,
    policy: UploadPolicy,
}

impl ResumableUploadService {
    pub fn new(publisher: Arc<PersistentPublisher>, policy: UploadPolicy) -> Self {
        Self { publisher, policy }
    }

    fn resolve(&self, params: &ResumableParams) -> Result<UploadSession, AppError> {
        let session = UploadSession::from_params(params)?;
        self.policy.check(&session)?;
        Ok(session)
    }

    #[tracing::instrument(skip(self, params, data), fields(session_key, chunk_index))]
    pub async fn receive_chunk(
        &self,
        params: &ResumableParams,
        data: Bytes,
    ) -> Result<ChunkOutcome, AppError> {
        let session = self.resolve(params)?;
        let span = tracing::Span::current();
        span.record("session_key", session.session_key().as_str());
        span.record("chunk_index", session.chunk_index);

        if data.len() as u64 != session.chunk_size {
            return Err(AppError::ChunkSizeMismatch {
                index: session.chunk_index,
                declared: session.chunk_size,
                received: data.len() as u64,
            });
        }

        let assembler = self.publisher.assembler();
        if !assembler
            .chunk_exists(&session, session.chunk_index, session.chunk_size)
            .await?
        {
            // A retry after publishing must not leave a stray chunk behind.
            if let Some(published) = self.publisher.find_existing(&session).await? {
                return Ok(ChunkOutcome::Completed(published));
            }
            assembler
                .save_chunk(&session, session.chunk_index, data)
                .await?;
        }

        if assembler.is_complete(&session).await? {
            return self.finish(&session).await.map(ChunkOutcome::Completed);
        }

        Ok(ChunkOutcome::Stored)
    }

    #[tracing::instrument(skip(self, params), fields(session_key, chunk_index))]
    pub async fn probe(&self, params: &ResumableParams) -> Result<ProbeOutcome, AppError> {
        let session = self.resolve(params)?;
        let span = tracing::Span::current();
        span.record("session_key", session.session_key().as_str());
        span.record("chunk_index", session.chunk_index);

        let assembler = self.publisher.assembler();
        if !assembler
            .chunk_exists(&session, session.chunk_index, session.chunk_size)
            .await?
        {
            // Chunks are gone once the upload has been published.
            return Ok(match self.publisher.find_existing(&session).await? {
                Some(published) => ProbeOutcome::Completed(published),
                None => ProbeOutcome::Missing,
            });
        }

        if assembler.is_complete(&session).await? {
            return self.finish(&session).await.map(ProbeOutcome::Completed);
        }

        Ok(ProbeOutcome::Present)
    }

    async fn finish(&self, session: &UploadSession) -> Result<PublishedUpload, AppError> {
        self.publisher.publish(session).await
    }
}
