//! Runtime configuration for the OCR comparison service.
//!
//! Provides:
//! - Typed [`Settings`] loaded once from the environment (and an optional `.env`)
//! - Typed lookups over an injectable variable map for tests
//! - Validation report with errors and warnings
//! - Secret redaction for startup logging and `ocrbench check`

pub mod env;
pub mod redact;
pub mod settings;
pub mod validation;

pub use env::{parse_bool, ConfigError, EnvSource};
pub use redact::{collect_redacted_paths, redact};
pub use settings::{
    ClovaSettings, GoogleSettings, SheetBackendKind, SheetSettings, Settings,
    DEFAULT_MAX_FILE_SIZE, DEFAULT_SHEET_NAME, DEFAULT_SPREADSHEET_NAME, DEFAULT_VISION_URL,
};
pub use validation::{spreadsheet_key, validate, ConfigValidationError, ValidationReport};
