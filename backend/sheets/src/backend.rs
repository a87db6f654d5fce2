use async_trait::async_trait;
use serde_json::Value;

use crate::error::SheetError;

/// A spreadsheet the backend can address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpreadsheetRef {
    pub id: String,
    pub title: String,
    pub url: String,
}

/// One tab within a spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorksheetRef {
    pub id: i64,
    pub title: String,
}

/// Storage primitives the sheet service is built on.
///
/// Rows are 1-based, as in A1 notation.
#[async_trait]
pub trait SheetBackend: Send + Sync {
    async fn open_by_key(&self, key: &str) -> Result<SpreadsheetRef, SheetError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<SpreadsheetRef>, SheetError>;

    async fn create(&self, name: &str) -> Result<SpreadsheetRef, SheetError>;

    async fn worksheets(&self, spreadsheet: &SpreadsheetRef)
        -> Result<Vec<WorksheetRef>, SheetError>;

    async fn add_worksheet(
        &self,
        spreadsheet: &SpreadsheetRef,
        title: &str,
        rows: u32,
        cols: u32,
    ) -> Result<WorksheetRef, SheetError>;

    /// Number of rows up to the last non-empty one.
    async fn row_count(
        &self,
        spreadsheet: &SpreadsheetRef,
        sheet: &WorksheetRef,
    ) -> Result<usize, SheetError>;

    /// Overwrite row `row` starting at column A.
    async fn write_row(
        &self,
        spreadsheet: &SpreadsheetRef,
        sheet: &WorksheetRef,
        row: usize,
        values: &[Value],
    ) -> Result<(), SheetError>;

    /// Style the first row as a header. Best effort.
    async fn format_header(
        &self,
        _spreadsheet: &SpreadsheetRef,
        _sheet: &WorksheetRef,
    ) -> Result<(), SheetError> {
        Ok(())
    }

    /// Identity writing to the spreadsheet, for sharing hints.
    fn account_email(&self) -> Option<String> {
        None
    }
}
