use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::env::{ConfigError, EnvSource};
use crate::validation::{validate, ValidationReport};

pub const DEFAULT_VISION_URL: &str = "https://vision.googleapis.com/v1/images:annotate";
pub const DEFAULT_SPREADSHEET_NAME: &str = "OCR Results Comparison";
pub const DEFAULT_SHEET_NAME: &str = "OCR Comparison";
pub const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Google Cloud credentials and the Vision endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleSettings {
    /// Inline service account JSON (`GOOGLE_CREDENTIALS_JSON`).
    pub credentials_json: Option<String>,
    /// Service account file, used when present on disk.
    pub credentials_path: PathBuf,
    /// API-key auth for Vision; takes precedence over OAuth.
    pub vision_api_key: Option<String>,
    pub vision_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClovaSettings {
    pub secret_key: Option<String>,
    pub ocr_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetBackendKind {
    Google,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetSettings {
    pub backend: SheetBackendKind,
    pub spreadsheet_name: String,
    pub spreadsheet_url: Option<String>,
    /// Hold a per-sheet lock across the read-count-then-write append.
    pub serialize_appends: bool,
}

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
    pub log_json: bool,
    pub google: GoogleSettings,
    pub clova: ClovaSettings,
    pub sheets: SheetSettings,
    /// Upload ceiling in bytes.
    pub max_file_size: usize,
    pub provider_timeout_ms: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            environment: "development".to_string(),
            log_level: "info".to_string(),
            log_dir: None,
            log_json: false,
            google: GoogleSettings {
                credentials_json: None,
                credentials_path: PathBuf::from("credentials.json"),
                vision_api_key: None,
                vision_url: DEFAULT_VISION_URL.to_string(),
            },
            clova: ClovaSettings {
                secret_key: None,
                ocr_url: None,
            },
            sheets: SheetSettings {
                backend: SheetBackendKind::Google,
                spreadsheet_name: DEFAULT_SPREADSHEET_NAME.to_string(),
                spreadsheet_url: None,
                serialize_appends: true,
            },
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            provider_timeout_ms: None,
        }
    }
}

impl Settings {
    /// Load from the process environment (and `.env`).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&EnvSource::from_process())
    }

    pub fn from_source(env: &EnvSource) -> Result<Self, ConfigError> {
        let defaults = Settings::default();

        let sheets_backend = match env.get("SHEETS_BACKEND").as_deref() {
            None | Some("google") => SheetBackendKind::Google,
            Some("memory") => SheetBackendKind::Memory,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    var: "SHEETS_BACKEND".to_string(),
                    value: other.to_string(),
                    reason: "expected 'google' or 'memory'".to_string(),
                })
            }
        };

        let log_json = match env.get("LOG_FORMAT").as_deref() {
            None | Some("pretty") => false,
            Some("json") => true,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    var: "LOG_FORMAT".to_string(),
                    value: other.to_string(),
                    reason: "expected 'pretty' or 'json'".to_string(),
                })
            }
        };

        Ok(Self {
            host: env.get_or("HOST", &defaults.host),
            port: env.parse_or("PORT", defaults.port)?,
            environment: env.get_or("ENVIRONMENT", &defaults.environment),
            log_level: env.get_or("RUST_LOG", &defaults.log_level),
            log_dir: env.get("LOG_DIR").map(PathBuf::from),
            log_json,
            google: GoogleSettings {
                credentials_json: env.get("GOOGLE_CREDENTIALS_JSON"),
                credentials_path: env
                    .get("GOOGLE_CREDENTIALS_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.google.credentials_path),
                vision_api_key: env.get("GOOGLE_VISION_API_KEY"),
                vision_url: env.get_or("GOOGLE_VISION_URL", DEFAULT_VISION_URL),
            },
            clova: ClovaSettings {
                secret_key: env.get("NCP_SECRET_KEY"),
                ocr_url: env.get("NCP_OCR_URL"),
            },
            sheets: SheetSettings {
                backend: sheets_backend,
                spreadsheet_name: env.get_or("SPREADSHEET_NAME", DEFAULT_SPREADSHEET_NAME),
                spreadsheet_url: env.get("SPREADSHEET_URL"),
                serialize_appends: env.bool_or("SHEETS_SERIALIZE_APPENDS", true)?,
            },
            max_file_size: env.parse_or("MAX_FILE_SIZE", defaults.max_file_size)?,
            provider_timeout_ms: env.parse("PROVIDER_TIMEOUT_MS")?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn provider_timeout(&self) -> Option<Duration> {
        self.provider_timeout_ms.map(Duration::from_millis)
    }

    /// Human-readable upload limit, e.g. "10MB".
    pub fn max_file_size_label(&self) -> String {
        let mb = self.max_file_size as f64 / (1024.0 * 1024.0);
        if mb.fract() == 0.0 {
            format!("{}MB", mb as u64)
        } else {
            format!("{:.1}MB", mb)
        }
    }

    pub fn validate(&self) -> ValidationReport {
        validate(self)
    }

    /// Settings as JSON with secrets masked, safe to log.
    pub fn redacted(&self) -> Value {
        match serde_json::to_value(self) {
            Ok(v) => crate::redact::redact(&v),
            Err(_) => Value::Null,
        }
    }

    /// Dotted paths of the secrets that [`Settings::redacted`] masks.
    pub fn secret_paths(&self) -> Vec<String> {
        serde_json::to_value(self)
            .map(|v| crate::redact::collect_redacted_paths(&v))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let s = Settings::from_source(&EnvSource::default()).unwrap();
        assert_eq!(s.port, 8080);
        assert_eq!(s.max_file_size, 10 * 1024 * 1024);
        assert_eq!(s.sheets.spreadsheet_name, "OCR Results Comparison");
        assert_eq!(s.sheets.backend, SheetBackendKind::Google);
        assert!(s.sheets.serialize_appends);
        assert_eq!(s.google.vision_url, DEFAULT_VISION_URL);
        assert!(s.provider_timeout().is_none());
        assert_eq!(s.max_file_size_label(), "10MB");
    }

    #[test]
    fn reads_provider_credentials() {
        let env = EnvSource::from_pairs(&[
            ("NCP_SECRET_KEY", "clova-secret"),
            ("NCP_OCR_URL", "https://example.apigw.ntruss.com/custom/v1/1/abc/general"),
            ("SPREADSHEET_URL", "https://docs.google.com/spreadsheets/d/abc123/edit"),
            ("SHEETS_BACKEND", "memory"),
            ("PROVIDER_TIMEOUT_MS", "2500"),
            ("PORT", "9000"),
        ]);
        let s = Settings::from_source(&env).unwrap();
        assert_eq!(s.clova.secret_key.as_deref(), Some("clova-secret"));
        assert_eq!(s.sheets.backend, SheetBackendKind::Memory);
        assert_eq!(s.provider_timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(s.bind_address(), "0.0.0.0:9000");
    }

    #[test]
    fn rejects_unknown_sheet_backend() {
        let env = EnvSource::from_pairs(&[("SHEETS_BACKEND", "excel")]);
        let err = Settings::from_source(&env).unwrap_err();
        assert!(err.to_string().contains("SHEETS_BACKEND"));
    }

    #[test]
    fn redacted_snapshot_hides_secrets() {
        let env = EnvSource::from_pairs(&[
            ("NCP_SECRET_KEY", "supersecretvalue"),
            ("GOOGLE_VISION_API_KEY", "AIzaSyExampleKey"),
        ]);
        let s = Settings::from_source(&env).unwrap();
        let snapshot = s.redacted().to_string();
        assert!(!snapshot.contains("supersecretvalue"));
        assert!(!snapshot.contains("AIzaSyExampleKey"));
        let mut paths = s.secret_paths();
        paths.sort();
        assert_eq!(paths, vec!["clova.secret_key", "google.vision_api_key"]);
        assert!(snapshot.contains("OCR Results Comparison"));
    }
}
