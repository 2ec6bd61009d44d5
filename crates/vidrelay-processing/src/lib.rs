//! Vidrelay processing
//!
//! The resumable upload pipeline, remote job dispatch and the processing webhook
//! state machine. Everything here depends on storage and persistence through
//! traits, so it runs against the local filesystem and in-memory stores in tests.

pub mod upload;
pub mod video;
pub mod webhook;

pub use upload::{
    ChunkAssembler, ChunkOutcome, PersistentPublisher, ProbeOutcome, PublishedUpload,
    ResumableUploadService, UploadPolicy, UploadSession,
};
pub use video::{HttpJobDispatcher, JobDispatcher, JobSettings, TranscodeJob, VideoService};
pub use webhook::WebhookReceiver;
