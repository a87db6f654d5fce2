//! Settings validation: startup checks with user-friendly messages.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::settings::{SheetBackendKind, Settings};

static SPREADSHEET_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/d/([a-zA-Z0-9_-]+)").unwrap());

/// The key in a `https://docs.google.com/spreadsheets/d/<key>/...` URL.
pub fn spreadsheet_key(url: &str) -> Option<&str> {
    SPREADSHEET_URL_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// A validation finding with the variable it concerns.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// All errors and warnings found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

pub fn validate(settings: &Settings) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_server(settings, &mut report);
    validate_clova(settings, &mut report);
    validate_google(settings, &mut report);
    validate_sheets(settings, &mut report);
    report
}

fn validate_server(settings: &Settings, report: &mut ValidationReport) {
    if settings.max_file_size == 0 {
        report.error("MAX_FILE_SIZE", "Upload limit must be greater than zero");
    }
    if settings.provider_timeout_ms == Some(0) {
        report.error("PROVIDER_TIMEOUT_MS", "Timeout must be greater than zero");
    }
}

/// Clova has no fallback auth: both values are required.
fn validate_clova(settings: &Settings, report: &mut ValidationReport) {
    if settings.clova.secret_key.is_none() {
        report.error("NCP_SECRET_KEY", "Naver Clova secret key is not set");
    }
    match &settings.clova.ocr_url {
        None => report.error("NCP_OCR_URL", "Naver Clova invoke URL is not set"),
        Some(url) if !is_http_url(url) => {
            report.error("NCP_OCR_URL", format!("'{url}' is not an http(s) URL"))
        }
        Some(_) => {}
    }
}

fn validate_google(settings: &Settings, report: &mut ValidationReport) {
    let google = &settings.google;
    if !is_http_url(&google.vision_url) {
        report.error(
            "GOOGLE_VISION_URL",
            format!("'{}' is not an http(s) URL", google.vision_url),
        );
    }
    let has_service_account =
        google.credentials_json.is_some() || google.credentials_path.exists();
    if google.vision_api_key.is_none() && !has_service_account {
        report.warn(
            "GOOGLE_CREDENTIALS_JSON",
            "No API key or service account found; falling back to the metadata server",
        );
    }
    if let Some(json) = &google.credentials_json {
        if serde_json::from_str::<serde_json::Value>(json).is_err() {
            report.error("GOOGLE_CREDENTIALS_JSON", "Value is not valid JSON");
        }
    }
}

fn validate_sheets(settings: &Settings, report: &mut ValidationReport) {
    let sheets = &settings.sheets;
    if let Some(url) = &sheets.spreadsheet_url {
        if spreadsheet_key(url).is_none() {
            report.error("SPREADSHEET_URL", "Invalid spreadsheet URL format");
        }
    } else if sheets.spreadsheet_name.trim().is_empty() {
        report.error("SPREADSHEET_NAME", "Spreadsheet name cannot be empty");
    }
    if sheets.backend == SheetBackendKind::Memory {
        report.warn("SHEETS_BACKEND", "Memory backend keeps rows only until restart");
    }
    if !sheets.serialize_appends {
        report.warn(
            "SHEETS_SERIALIZE_APPENDS",
            "Concurrent saves to the same sheet may overwrite each other",
        );
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}
