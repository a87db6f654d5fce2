//! In-process sheet storage.
//!
//! Mirrors the Google backend closely enough to exercise the service:
//! sparse 1-based rows, trailing empty rows not counted. An optional delay
//! between reading the row count and returning it widens the window in
//! which concurrent appends can pick the same row.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::backend::{SheetBackend, SpreadsheetRef, WorksheetRef};
use crate::error::SheetError;

#[derive(Debug, Default)]
struct MemorySheet {
    id: i64,
    title: String,
    rows: Vec<Vec<Value>>,
    header_formatted: bool,
}

#[derive(Debug, Default)]
struct MemorySpreadsheet {
    title: String,
    sheets: Vec<MemorySheet>,
}

#[derive(Debug, Default)]
struct MemoryState {
    spreadsheets: HashMap<String, MemorySpreadsheet>,
    next_id: u64,
}

pub struct InMemorySheetBackend {
    state: Mutex<MemoryState>,
    read_delay: Duration,
    allow_create: bool,
    account: String,
}

impl Default for InMemorySheetBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySheetBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            read_delay: Duration::ZERO,
            allow_create: true,
            account: "memory@localhost".to_string(),
        }
    }

    /// Sleep after reading the row count.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    /// Refuse to create spreadsheets, like an account without Drive quota.
    pub fn without_create(mut self) -> Self {
        self.allow_create = false;
        self
    }

    /// Seed an existing spreadsheet with a default empty tab.
    pub fn insert_spreadsheet(&self, id: &str, title: &str) {
        let mut state = self.lock();
        state.spreadsheets.insert(
            id.to_string(),
            MemorySpreadsheet {
                title: title.to_string(),
                sheets: vec![MemorySheet {
                    id: 0,
                    title: "Sheet1".to_string(),
                    ..Default::default()
                }],
            },
        );
    }

    /// Snapshot of a tab's rows.
    pub fn rows(&self, spreadsheet_id: &str, sheet: &str) -> Vec<Vec<Value>> {
        let state = self.lock();
        state
            .spreadsheets
            .get(spreadsheet_id)
            .and_then(|s| s.sheets.iter().find(|w| w.title == sheet))
            .map(|w| w.rows.clone())
            .unwrap_or_default()
    }

    pub fn header_formatted(&self, spreadsheet_id: &str, sheet: &str) -> bool {
        let state = self.lock();
        state
            .spreadsheets
            .get(spreadsheet_id)
            .and_then(|s| s.sheets.iter().find(|w| w.title == sheet))
            .is_some_and(|w| w.header_formatted)
    }

    pub fn spreadsheet_count(&self) -> usize {
        self.lock().spreadsheets.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn reference(id: &str, title: &str) -> SpreadsheetRef {
        SpreadsheetRef {
            id: id.to_string(),
            title: title.to_string(),
            url: format!("memory://spreadsheets/{id}"),
        }
    }

    fn with_sheet<T>(
        &self,
        spreadsheet: &SpreadsheetRef,
        sheet: &WorksheetRef,
        f: impl FnOnce(&mut MemorySheet) -> T,
    ) -> Result<T, SheetError> {
        let mut state = self.lock();
        let doc = state
            .spreadsheets
            .get_mut(&spreadsheet.id)
            .ok_or_else(|| SheetError::UnknownSpreadsheet(spreadsheet.id.clone()))?;
        let tab = doc
            .sheets
            .iter_mut()
            .find(|w| w.id == sheet.id)
            .ok_or_else(|| SheetError::Malformed(format!("no worksheet '{}'", sheet.title)))?;
        Ok(f(tab))
    }
}

#[async_trait]
impl SheetBackend for InMemorySheetBackend {
    async fn open_by_key(&self, key: &str) -> Result<SpreadsheetRef, SheetError> {
        let state = self.lock();
        state
            .spreadsheets
            .get(key)
            .map(|s| Self::reference(key, &s.title))
            .ok_or_else(|| SheetError::UnknownSpreadsheet(key.to_string()))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<SpreadsheetRef>, SheetError> {
        let mut matches: Vec<_> = self
            .lock()
            .spreadsheets
            .iter()
            .filter(|(_, s)| s.title == name)
            .map(|(id, s)| Self::reference(id, &s.title))
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        if !self.read_delay.is_zero() {
            tokio::time::sleep(self.read_delay).await;
        }
        Ok(matches.into_iter().next())
    }

    async fn create(&self, name: &str) -> Result<SpreadsheetRef, SheetError> {
        if !self.allow_create {
            return Err(SheetError::Api {
                status: 403,
                body: "The caller does not have permission".to_string(),
            });
        }
        let mut state = self.lock();
        state.next_id += 1;
        let id = format!("mem-{}", state.next_id);
        state.spreadsheets.insert(
            id.clone(),
            MemorySpreadsheet {
                title: name.to_string(),
                sheets: vec![MemorySheet {
                    id: 0,
                    title: "Sheet1".to_string(),
                    ..Default::default()
                }],
            },
        );
        Ok(Self::reference(&id, name))
    }

    async fn worksheets(
        &self,
        spreadsheet: &SpreadsheetRef,
    ) -> Result<Vec<WorksheetRef>, SheetError> {
        let state = self.lock();
        let doc = state
            .spreadsheets
            .get(&spreadsheet.id)
            .ok_or_else(|| SheetError::UnknownSpreadsheet(spreadsheet.id.clone()))?;
        Ok(doc
            .sheets
            .iter()
            .map(|w| WorksheetRef {
                id: w.id,
                title: w.title.clone(),
            })
            .collect())
    }

    async fn add_worksheet(
        &self,
        spreadsheet: &SpreadsheetRef,
        title: &str,
        _rows: u32,
        _cols: u32,
    ) -> Result<WorksheetRef, SheetError> {
        let mut state = self.lock();
        let doc = state
            .spreadsheets
            .get_mut(&spreadsheet.id)
            .ok_or_else(|| SheetError::UnknownSpreadsheet(spreadsheet.id.clone()))?;
        if doc.sheets.iter().any(|w| w.title == title) {
            return Err(SheetError::Api {
                status: 400,
                body: format!("A sheet with the name \"{title}\" already exists."),
            });
        }
        let id = doc.sheets.iter().map(|w| w.id).max().unwrap_or(0) + 1;
        doc.sheets.push(MemorySheet {
            id,
            title: title.to_string(),
            ..Default::default()
        });
        Ok(WorksheetRef {
            id,
            title: title.to_string(),
        })
    }

    async fn row_count(
        &self,
        spreadsheet: &SpreadsheetRef,
        sheet: &WorksheetRef,
    ) -> Result<usize, SheetError> {
        let count = self.with_sheet(spreadsheet, sheet, |tab| {
            tab.rows
                .iter()
                .rposition(|r| !r.is_empty())
                .map_or(0, |i| i + 1)
        })?;
        if !self.read_delay.is_zero() {
            tokio::time::sleep(self.read_delay).await;
        }
        Ok(count)
    }

    async fn write_row(
        &self,
        spreadsheet: &SpreadsheetRef,
        sheet: &WorksheetRef,
        row: usize,
        values: &[Value],
    ) -> Result<(), SheetError> {
        if row == 0 {
            return Err(SheetError::Malformed("rows are 1-based".to_string()));
        }
        self.with_sheet(spreadsheet, sheet, |tab| {
            if tab.rows.len() < row {
                tab.rows.resize(row, Vec::new());
            }
            tab.rows[row - 1] = values.to_vec();
        })
    }

    async fn format_header(
        &self,
        spreadsheet: &SpreadsheetRef,
        sheet: &WorksheetRef,
    ) -> Result<(), SheetError> {
        self.with_sheet(spreadsheet, sheet, |tab| tab.header_formatted = true)
    }

    fn account_email(&self) -> Option<String> {
        Some(self.account.clone())
    }
}
