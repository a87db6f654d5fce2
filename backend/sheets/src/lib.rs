//! Spreadsheet persistence for comparison results.
//!
//! [`SheetService`] resolves one named spreadsheet, makes sure the target
//! tab exists with its header row, and appends one row per comparison. The
//! storage itself sits behind [`SheetBackend`]: Google Sheets in production,
//! an in-process table for tests and local runs.

pub mod backend;
pub mod error;
pub mod google;
pub mod memory;
pub mod row;
pub mod service;

pub use backend::{SheetBackend, SpreadsheetRef, WorksheetRef};
pub use error::SheetError;
pub use google::GoogleSheetsBackend;
pub use memory::InMemorySheetBackend;
pub use row::{ComparisonRecord, HEADERS};
pub use service::{spreadsheet_id_from_url, SheetHandle, SheetService};
