pub mod chunked_upload;
pub mod health;
pub mod videos;
pub mod webhooks;
