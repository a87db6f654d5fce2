//! Google Sheets v4 + Drive v3 over REST.
//!
//! Spreadsheets are located by title through a Drive search, created through
//! the Sheets API, and written one row at a time with `valueInputOption=RAW`.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use ocrbench_config::GoogleSettings;
use ocrbench_infra::{google_token_source, AccessTokenSource, DRIVE_SCOPE, SPREADSHEETS_SCOPE};

use crate::backend::{SheetBackend, SpreadsheetRef, WorksheetRef};
use crate::error::SheetError;

const SHEETS_BASE: &str = "https://sheets.googleapis.com";
const DRIVE_BASE: &str = "https://www.googleapis.com";
const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";

pub struct GoogleSheetsBackend {
    client: Client,
    tokens: Arc<dyn AccessTokenSource>,
    sheets_base: String,
    drive_base: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Spreadsheet {
    spreadsheet_id: String,
    #[serde(default)]
    spreadsheet_url: Option<String>,
    #[serde(default)]
    properties: Option<SpreadsheetProperties>,
    #[serde(default)]
    sheets: Vec<Sheet>,
}

#[derive(Deserialize)]
struct SpreadsheetProperties {
    #[serde(default)]
    title: String,
}

#[derive(Deserialize)]
struct Sheet {
    properties: SheetProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    #[serde(default)]
    sheet_id: i64,
    title: String,
}

#[derive(Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Deserialize)]
struct DriveFile {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

fn spreadsheet_url(id: &str) -> String {
    format!("https://docs.google.com/spreadsheets/d/{id}")
}

/// `'Sheet name'!A1` with embedded quotes doubled.
fn a1_range(sheet: &str, cell: Option<&str>) -> String {
    let quoted = format!("'{}'", sheet.replace('\'', "''"));
    match cell {
        Some(cell) => format!("{quoted}!{cell}"),
        None => quoted,
    }
}

impl GoogleSheetsBackend {
    pub fn new(tokens: Arc<dyn AccessTokenSource>, client: Client) -> Self {
        Self {
            client,
            tokens,
            sheets_base: SHEETS_BASE.to_string(),
            drive_base: DRIVE_BASE.to_string(),
        }
    }

    /// Point at other hosts, e.g. a local fake.
    pub fn with_base_urls(mut self, sheets: impl Into<String>, drive: impl Into<String>) -> Self {
        self.sheets_base = sheets.into();
        self.drive_base = drive.into();
        self
    }

    pub fn from_settings(settings: &GoogleSettings, client: Client) -> Result<Self, SheetError> {
        let tokens =
            google_token_source(settings, &[SPREADSHEETS_SCOPE, DRIVE_SCOPE], client.clone())?;
        Ok(Self::new(tokens, client))
    }

    fn url(&self, base: &str, segments: &[&str]) -> Result<Url, SheetError> {
        let mut url = Url::parse(base).map_err(|e| SheetError::Malformed(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| SheetError::Malformed(format!("cannot be a base URL: {base}")))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn sheets_url(&self, segments: &[&str]) -> Result<Url, SheetError> {
        let mut all = vec!["v4", "spreadsheets"];
        all.extend_from_slice(segments);
        self.url(&self.sheets_base, &all)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, SheetError> {
        let token = self.tokens.access_token().await?;
        let response = request.bearer_auth(token).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SheetError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }

    async fn batch_update(
        &self,
        spreadsheet: &SpreadsheetRef,
        requests: Value,
    ) -> Result<Value, SheetError> {
        let url = self.sheets_url(&[&format!("{}:batchUpdate", spreadsheet.id)])?;
        self.send(self.client.post(url).json(&json!({ "requests": requests })))
            .await
    }

    fn decode<T: for<'de> Deserialize<'de>>(value: Value) -> Result<T, SheetError> {
        serde_json::from_value(value).map_err(|e| SheetError::Malformed(e.to_string()))
    }

    fn to_ref(sheet: Spreadsheet) -> SpreadsheetRef {
        let url = sheet
            .spreadsheet_url
            .unwrap_or_else(|| spreadsheet_url(&sheet.spreadsheet_id));
        SpreadsheetRef {
            title: sheet.properties.map(|p| p.title).unwrap_or_default(),
            id: sheet.spreadsheet_id,
            url,
        }
    }
}

#[async_trait]
impl SheetBackend for GoogleSheetsBackend {
    async fn open_by_key(&self, key: &str) -> Result<SpreadsheetRef, SheetError> {
        let url = self.sheets_url(&[key])?;
        let request = self
            .client
            .get(url)
            .query(&[("fields", "spreadsheetId,spreadsheetUrl,properties.title")]);
        match self.send(request).await {
            Ok(body) => Ok(Self::to_ref(Self::decode(body)?)),
            Err(SheetError::Api { status: 403 | 404, .. }) => {
                Err(SheetError::UnknownSpreadsheet(key.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<SpreadsheetRef>, SheetError> {
        let url = self.url(&self.drive_base, &["drive", "v3", "files"])?;
        let query = format!(
            "name = '{}' and mimeType = '{SPREADSHEET_MIME}' and trashed = false",
            name.replace('\\', "\\\\").replace('\'', "\\'")
        );
        let request = self.client.get(url).query(&[
            ("q", query.as_str()),
            ("fields", "files(id,name)"),
            ("orderBy", "createdTime"),
            ("pageSize", "1"),
        ]);
        let list: DriveFileList = Self::decode(self.send(request).await?)?;
        Ok(list.files.into_iter().next().map(|f| SpreadsheetRef {
            url: spreadsheet_url(&f.id),
            id: f.id,
            title: f.name,
        }))
    }

    async fn create(&self, name: &str) -> Result<SpreadsheetRef, SheetError> {
        let url = self.sheets_url(&[])?;
        let body = json!({ "properties": { "title": name } });
        let created: Spreadsheet =
            Self::decode(self.send(self.client.post(url).json(&body)).await?)?;
        Ok(Self::to_ref(created))
    }

    async fn worksheets(
        &self,
        spreadsheet: &SpreadsheetRef,
    ) -> Result<Vec<WorksheetRef>, SheetError> {
        let url = self.sheets_url(&[&spreadsheet.id])?;
        let request = self
            .client
            .get(url)
            .query(&[("fields", "spreadsheetId,sheets.properties(sheetId,title)")]);
        let doc: Spreadsheet = Self::decode(self.send(request).await?)?;
        Ok(doc
            .sheets
            .into_iter()
            .map(|s| WorksheetRef {
                id: s.properties.sheet_id,
                title: s.properties.title,
            })
            .collect())
    }

    async fn add_worksheet(
        &self,
        spreadsheet: &SpreadsheetRef,
        title: &str,
        rows: u32,
        cols: u32,
    ) -> Result<WorksheetRef, SheetError> {
        let reply = self
            .batch_update(
                spreadsheet,
                json!([{
                    "addSheet": {
                        "properties": {
                            "title": title,
                            "gridProperties": { "rowCount": rows, "columnCount": cols }
                        }
                    }
                }]),
            )
            .await?;
        let properties = reply
            .pointer("/replies/0/addSheet/properties")
            .cloned()
            .ok_or_else(|| SheetError::Malformed("addSheet reply without properties".to_string()))?;
        let properties: SheetProperties = Self::decode(properties)?;
        Ok(WorksheetRef {
            id: properties.sheet_id,
            title: properties.title,
        })
    }

    async fn row_count(
        &self,
        spreadsheet: &SpreadsheetRef,
        sheet: &WorksheetRef,
    ) -> Result<usize, SheetError> {
        let range = a1_range(&sheet.title, None);
        let url = self.sheets_url(&[&spreadsheet.id, "values", &range])?;
        let values: ValueRange = Self::decode(self.send(self.client.get(url)).await?)?;
        Ok(values
            .values
            .iter()
            .rposition(|r| !r.is_empty())
            .map_or(0, |i| i + 1))
    }

    async fn write_row(
        &self,
        spreadsheet: &SpreadsheetRef,
        sheet: &WorksheetRef,
        row: usize,
        values: &[Value],
    ) -> Result<(), SheetError> {
        let range = a1_range(&sheet.title, Some(&format!("A{row}")));
        let url = self.sheets_url(&[&spreadsheet.id, "values", &range])?;
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": [values],
        });
        debug!(%range, "Writing row");
        self.send(
            self.client
                .put(url)
                .query(&[("valueInputOption", "RAW")])
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn format_header(
        &self,
        spreadsheet: &SpreadsheetRef,
        sheet: &WorksheetRef,
    ) -> Result<(), SheetError> {
        self.batch_update(
            spreadsheet,
            json!([{
                "repeatCell": {
                    "range": { "sheetId": sheet.id, "startRowIndex": 0, "endRowIndex": 1 },
                    "cell": {
                        "userEnteredFormat": {
                            "textFormat": { "bold": true },
                            "backgroundColor": { "red": 0.9, "green": 0.9, "blue": 0.9 }
                        }
                    },
                    "fields": "userEnteredFormat(textFormat,backgroundColor)"
                }
            }]),
        )
        .await?;
        Ok(())
    }

    fn account_email(&self) -> Option<String> {
        self.tokens.account_email()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use axum::{
        extract::{Path, Query, State},
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
        routing::get,
        Json, Router,
    };
    use ocrbench_infra::StaticTokenSource;

    #[derive(Clone, Default)]
    struct Fake {
        writes: Arc<Mutex<Vec<(String, Value)>>>,
        batches: Arc<Mutex<Vec<Value>>>,
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers.get("authorization").and_then(|v| v.to_str().ok()) == Some("Bearer test-token")
    }

    async fn get_spreadsheet(Path(id): Path<String>, headers: HeaderMap) -> impl IntoResponse {
        if !authorized(&headers) {
            return (StatusCode::UNAUTHORIZED, Json(json!({}))).into_response();
        }
        if id != "sheet-1" {
            return (StatusCode::NOT_FOUND, Json(json!({ "error": { "code": 404 } })))
                .into_response();
        }
        Json(json!({
            "spreadsheetId": "sheet-1",
            "properties": { "title": "OCR Results Comparison" },
            "sheets": [
                { "properties": { "sheetId": 0, "title": "Sheet1" } },
                { "properties": { "sheetId": 42, "title": "O'Brien" } }
            ]
        }))
        .into_response()
    }

    async fn batch_update(
        State(fake): State<Fake>,
        Path(id): Path<String>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        assert_eq!(id, "sheet-1:batchUpdate");
        fake.batches.lock().unwrap().push(body.clone());
        let title = body.pointer("/requests/0/addSheet/properties/title").cloned();
        match title {
            Some(title) => Json(json!({
                "replies": [{ "addSheet": { "properties": { "sheetId": 7, "title": title } } }]
            })),
            None => Json(json!({ "replies": [{}] })),
        }
    }

    async fn get_values(Path((_, range)): Path<(String, String)>) -> Json<Value> {
        assert_eq!(range, "'O''Brien'");
        Json(json!({ "values": [["Timestamp"], ["row"], []] }))
    }

    async fn put_values(
        State(fake): State<Fake>,
        Path((_, range)): Path<(String, String)>,
        Query(q): Query<HashMap<String, String>>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        assert_eq!(q.get("valueInputOption").map(String::as_str), Some("RAW"));
        fake.writes.lock().unwrap().push((range, body));
        Json(json!({ "updatedRows": 1 }))
    }

    async fn drive_files(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
        let query = q.get("q").cloned().unwrap_or_default();
        if query.contains("name = 'OCR Results Comparison'") {
            Json(json!({ "files": [{ "id": "sheet-1", "name": "OCR Results Comparison" }] }))
        } else {
            Json(json!({ "files": [] }))
        }
    }

    async fn backend() -> (GoogleSheetsBackend, Fake) {
        let fake = Fake::default();
        let app = Router::new()
            .route("/v4/spreadsheets/:id", get(get_spreadsheet).post(batch_update))
            .route("/v4/spreadsheets/:id/values/:range", get(get_values).put(put_values))
            .route("/drive/v3/files", get(drive_files))
            .with_state(fake.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let base = format!("http://{addr}");
        let tokens = Arc::new(StaticTokenSource::new("test-token").with_email("ocr@project.iam"));
        let backend = GoogleSheetsBackend::new(tokens, Client::new()).with_base_urls(&base, &base);
        (backend, fake)
    }

    #[test]
    fn quotes_sheet_titles() {
        assert_eq!(a1_range("Runs", Some("A2")), "'Runs'!A2");
        assert_eq!(a1_range("O'Brien", None), "'O''Brien'");
    }

    #[tokio::test]
    async fn opens_and_lists_worksheets() {
        let (backend, _) = backend().await;

        let doc = backend.open_by_key("sheet-1").await.unwrap();
        assert_eq!(doc.title, "OCR Results Comparison");
        assert_eq!(doc.url, "https://docs.google.com/spreadsheets/d/sheet-1");

        let tabs = backend.worksheets(&doc).await.unwrap();
        assert_eq!(tabs.len(), 2);
        assert_eq!(tabs[1].id, 42);

        let missing = backend.open_by_key("nope").await.unwrap_err();
        assert!(matches!(missing, SheetError::UnknownSpreadsheet(_)));
        assert_eq!(backend.account_email().as_deref(), Some("ocr@project.iam"));
    }

    #[tokio::test]
    async fn finds_by_drive_search() {
        let (backend, _) = backend().await;

        let found = backend.find_by_name("OCR Results Comparison").await.unwrap();
        assert_eq!(found.map(|d| d.id).as_deref(), Some("sheet-1"));

        assert!(backend.find_by_name("Other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn counts_and_writes_rows_with_encoded_ranges() {
        let (backend, fake) = backend().await;
        let doc = backend.open_by_key("sheet-1").await.unwrap();
        let tab = WorksheetRef {
            id: 42,
            title: "O'Brien".to_string(),
        };

        assert_eq!(backend.row_count(&doc, &tab).await.unwrap(), 2);
        backend
            .write_row(&doc, &tab, 3, &[json!("x"), json!(1.5)])
            .await
            .unwrap();

        let writes = fake.writes.lock().unwrap();
        assert_eq!(writes[0].0, "'O''Brien'!A3");
        assert_eq!(writes[0].1["values"], json!([["x", 1.5]]));
    }

    #[tokio::test]
    async fn adds_and_formats_worksheets() {
        let (backend, fake) = backend().await;
        let doc = backend.open_by_key("sheet-1").await.unwrap();

        let tab = backend.add_worksheet(&doc, "Runs", 1000, 20).await.unwrap();
        assert_eq!(tab.id, 7);
        backend.format_header(&doc, &tab).await.unwrap();

        let batches = fake.batches.lock().unwrap();
        assert_eq!(
            batches[0].pointer("/requests/0/addSheet/properties/gridProperties/rowCount"),
            Some(&json!(1000))
        );
        assert_eq!(
            batches[1].pointer("/requests/0/repeatCell/range/sheetId"),
            Some(&json!(7))
        );
    }
}
