//! Vidrelay persistence layer
//!
//! Repository traits for processing requests and videos, their Postgres
//! implementations, and in-memory doubles behind the `test-helpers` feature.

pub mod db;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
pub mod traits;

pub use db::{ProcessingRequestRepository, VideoRepository};
pub use traits::{ProcessingRequestStore, VideoStore};
