//! Vidrelay Core Library
//!
//! Domain models, error types and configuration shared by the storage, persistence,
//! processing and API crates.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;

pub use config::{BaseConfig, Config, ProcessingConfig, UploadConfig, VideoProcessorConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use storage_types::StorageBackend;
