//! Vidrelay API Library
//!
//! HTTP handlers, application state and setup for the vidrelay server.

mod api_doc;
mod handlers;
mod telemetry;

pub mod constants;
pub mod error;
pub mod setup;
pub mod state;

pub use api_doc::ApiDoc;
pub use error::{ErrorResponse, HttpAppError};
