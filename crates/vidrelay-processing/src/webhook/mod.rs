//! Processing webhooks: signature verification and the status state machine.

mod receiver;
pub mod signature;

pub use receiver::{WebhookReceiver, INVALID_JSON_MESSAGE, MISSING_FIELDS_MESSAGE};
