//! Vidrelay Storage Library
//!
//! Blob store abstraction with S3-compatible and local filesystem backends. The
//! same trait serves the transient chunk namespace and the persistent store that
//! receives assembled uploads.
//!
//! # Storage key format
//!
//! Keys are `/`-separated relative paths such as `videos/original/{session_key}`.
//! Keys must not contain a `..` segment or a leading `/`; every backend validates
//! them through the `keys` module.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use factory::create_chunk_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{ObjectReader, Storage, StorageError, StorageResult, StoredObject};
pub use vidrelay_core::StorageBackend;
