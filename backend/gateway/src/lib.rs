//! OCR comparison HTTP API.
//!
//! Accepts image uploads, runs them through the comparator, and optionally
//! appends the outcome to a spreadsheet.

pub mod error;
pub mod handlers;
pub mod server;
pub mod state;
pub mod upload;

pub use error::ApiError;
pub use server::{build_router, start_server};
pub use state::AppState;
pub use upload::{UploadForm, UploadLimits};
