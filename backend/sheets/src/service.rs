use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tracing::{info, instrument, warn};

use ocrbench_config::spreadsheet_key;
use ocrbench_core::SheetInfo;

use crate::backend::{SheetBackend, SpreadsheetRef, WorksheetRef};
use crate::error::SheetError;
use crate::row::{header_row, ComparisonRecord};

const NEW_SHEET_ROWS: u32 = 1000;
const NEW_SHEET_COLS: u32 = 20;

/// Extract the key from a `https://docs.google.com/spreadsheets/d/<id>/...` URL.
pub fn spreadsheet_id_from_url(url: &str) -> Result<String, SheetError> {
    spreadsheet_key(url)
        .map(str::to_string)
        .ok_or(SheetError::InvalidUrl)
}

/// A tab resolved within the connected spreadsheet.
#[derive(Debug, Clone)]
pub struct SheetHandle {
    pub spreadsheet: SpreadsheetRef,
    pub worksheet: WorksheetRef,
}

pub struct SheetService {
    backend: Arc<dyn SheetBackend>,
    spreadsheet_name: String,
    spreadsheet_url: Option<String>,
    connected: RwLock<Option<SpreadsheetRef>>,
    append_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    serialize_appends: bool,
}

impl SheetService {
    pub fn new(
        backend: Arc<dyn SheetBackend>,
        spreadsheet_name: impl Into<String>,
        spreadsheet_url: Option<String>,
    ) -> Self {
        Self {
            backend,
            spreadsheet_name: spreadsheet_name.into(),
            spreadsheet_url,
            connected: RwLock::new(None),
            append_locks: Mutex::new(HashMap::new()),
            serialize_appends: true,
        }
    }

    /// When false, concurrent appends to one tab may pick the same row.
    pub fn with_serialized_appends(mut self, serialize: bool) -> Self {
        self.serialize_appends = serialize;
        self
    }

    pub fn spreadsheet_name(&self) -> &str {
        &self.spreadsheet_name
    }

    /// Resolve the target spreadsheet and remember it.
    ///
    /// An explicit URL wins over the configured one; without either the
    /// spreadsheet is looked up by name and created when missing.
    #[instrument(skip(self), fields(name = %self.spreadsheet_name))]
    pub async fn connect(&self, url: Option<&str>) -> Result<SpreadsheetRef, SheetError> {
        let mut connected = self.connected.write().await;
        let spreadsheet = self.resolve(url).await?;
        *connected = Some(spreadsheet.clone());
        Ok(spreadsheet)
    }

    async fn resolve(&self, url: Option<&str>) -> Result<SpreadsheetRef, SheetError> {
        let url = url.or(self.spreadsheet_url.as_deref());
        let spreadsheet = match url {
            Some(url) => {
                let key = spreadsheet_id_from_url(url)?;
                self.backend.open_by_key(&key).await?
            }
            None => self.open_or_create().await?,
        };
        info!(id = %spreadsheet.id, title = %spreadsheet.title, "Connected to spreadsheet");
        Ok(spreadsheet)
    }

    async fn open_or_create(&self) -> Result<SpreadsheetRef, SheetError> {
        if let Some(found) = self.backend.find_by_name(&self.spreadsheet_name).await? {
            return Ok(found);
        }
        match self.backend.create(&self.spreadsheet_name).await {
            Ok(created) => {
                info!(id = %created.id, "Created spreadsheet");
                Ok(created)
            }
            Err(e) => Err(SheetError::NotFound {
                name: self.spreadsheet_name.clone(),
                account: self
                    .backend
                    .account_email()
                    .unwrap_or_else(|| "the service account".to_string()),
                reason: e.to_string(),
            }),
        }
    }

    /// The cached spreadsheet, resolving it once under the write lock.
    async fn spreadsheet(&self) -> Result<SpreadsheetRef, SheetError> {
        if let Some(current) = self.connected.read().await.as_ref() {
            return Ok(current.clone());
        }
        let mut connected = self.connected.write().await;
        if let Some(current) = connected.as_ref() {
            return Ok(current.clone());
        }
        let spreadsheet = self.resolve(None).await?;
        *connected = Some(spreadsheet.clone());
        Ok(spreadsheet)
    }

    /// Find or add the tab, writing the header row when it is empty.
    pub async fn ensure_sheet(&self, sheet_name: &str) -> Result<SheetHandle, SheetError> {
        let spreadsheet = self.spreadsheet().await?;
        let existing = self
            .backend
            .worksheets(&spreadsheet)
            .await?
            .into_iter()
            .find(|w| w.title == sheet_name);

        let (worksheet, needs_header) = match existing {
            Some(worksheet) => {
                let empty = self.backend.row_count(&spreadsheet, &worksheet).await? == 0;
                (worksheet, empty)
            }
            None => {
                let worksheet = self
                    .backend
                    .add_worksheet(&spreadsheet, sheet_name, NEW_SHEET_ROWS, NEW_SHEET_COLS)
                    .await?;
                info!(sheet = sheet_name, "Added worksheet");
                (worksheet, true)
            }
        };

        if needs_header {
            self.backend
                .write_row(&spreadsheet, &worksheet, 1, &header_row())
                .await?;
            if let Err(e) = self.backend.format_header(&spreadsheet, &worksheet).await {
                warn!(sheet = sheet_name, error = %e, "Header formatting failed");
            }
        }

        Ok(SheetHandle {
            spreadsheet,
            worksheet,
        })
    }

    fn append_lock(&self, sheet_name: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .append_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(sheet_name.to_string()).or_default().clone()
    }

    /// Drop the tab's lock entry once no other append holds or waits on it.
    fn release_append_lock(&self, sheet_name: &str, lock: Arc<AsyncMutex<()>>) {
        let mut locks = self
            .append_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // One reference in the map, one here.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(sheet_name);
        }
    }

    #[cfg(test)]
    fn pending_append_locks(&self) -> usize {
        self.append_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Write `values` below the last populated row.
    ///
    /// Serialized appends hold a per-tab lock for the read-count-then-write
    /// sequence. Lock entries live only while an append to that tab is in
    /// flight, so arbitrary tab names do not accumulate.
    #[instrument(skip(self, values), fields(columns = values.len()))]
    pub async fn append_row(
        &self,
        sheet_name: &str,
        values: &[Value],
    ) -> Result<String, SheetError> {
        if !self.serialize_appends {
            return self.append_unlocked(sheet_name, values).await;
        }

        let lock = self.append_lock(sheet_name);
        let result = {
            let _guard = lock.lock().await;
            self.append_unlocked(sheet_name, values).await
        };
        self.release_append_lock(sheet_name, lock);
        result
    }

    async fn append_unlocked(
        &self,
        sheet_name: &str,
        values: &[Value],
    ) -> Result<String, SheetError> {
        let handle = self.ensure_sheet(sheet_name).await?;
        let next_row = self
            .backend
            .row_count(&handle.spreadsheet, &handle.worksheet)
            .await?
            + 1;
        self.backend
            .write_row(&handle.spreadsheet, &handle.worksheet, next_row, values)
            .await?;

        info!(sheet = sheet_name, row = next_row, "Row appended");
        Ok(format!("Data added to row {next_row}"))
    }

    /// URL of the connected spreadsheet.
    pub async fn resource_url(&self) -> Result<String, SheetError> {
        Ok(self.spreadsheet().await?.url)
    }

    /// Persist one comparison. Never fails; errors land in the returned info.
    pub async fn save_comparison(
        &self,
        sheet_name: &str,
        record: &ComparisonRecord,
    ) -> SheetInfo {
        let saved = async {
            let message = self.append_row(sheet_name, &record.to_row()).await?;
            let url = self.resource_url().await?;
            Ok::<_, SheetError>((message, url))
        }
        .await;

        match saved {
            Ok((message, url)) => SheetInfo::saved(sheet_name, Some(url), message),
            Err(e) => {
                warn!(sheet = sheet_name, error = %e, "Saving comparison failed");
                SheetInfo::failed(sheet_name, e.to_string())
            }
        }
    }
}
