//! Structured logging for the OCR comparison service.
//!
//! Console output (pretty or JSON), optional daily-rotated NDJSON file, and
//! scrubbing of credentials from strings before they are logged or returned.

pub mod logger;
pub mod redact;

pub use logger::{init_logger, LogOptions};
pub use redact::redact_sensitive_data;
