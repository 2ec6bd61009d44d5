//! Remote transcoding: job submission and the video entity lifecycle.

mod dispatcher;
mod lifecycle;

pub use dispatcher::{DispatchedJob, HttpJobDispatcher, JobDispatcher, TranscodeJob};
pub use lifecycle::{JobSettings, VideoService};
