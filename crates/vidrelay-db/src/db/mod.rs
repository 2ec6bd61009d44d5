//! Postgres repositories

pub mod processing_request;
pub mod video;

pub use processing_request::ProcessingRequestRepository;
pub use video::VideoRepository;
