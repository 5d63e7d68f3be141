//! Structured logging for PoemForge.
//!
//! Console plus rolling NDJSON file output, secret redaction, and run events.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{RunEvent, RunEventEntry, RunEventLogger};
pub use logger::init_logger;
pub use redact::redact_sensitive_data;
