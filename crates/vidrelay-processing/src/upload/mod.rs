//! Resumable chunked uploads: session resolution, chunk assembly and publishing.

mod assembler;
mod policy;
mod publisher;
mod service;
mod session;

pub use assembler::{AssembledUpload, ChunkAssembler};
pub use policy::UploadPolicy;
pub use publisher::{PersistentPublisher, PublishedUpload};
pub use service::{ChunkOutcome, ProbeOutcome, ResumableUploadService};
pub use session::UploadSession;
