//! Data models shared by the upload, processing and webhook layers.

mod processing_request;
mod resolution;
mod upload;
mod video;
mod webhook;

pub use processing_request::*;
pub use resolution::*;
pub use upload::*;
pub use video::*;
pub use webhook::*;
