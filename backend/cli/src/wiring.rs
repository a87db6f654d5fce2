//! Builds the comparator and the sheet service from settings.

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::{info, warn};

use ocrbench_config::{SheetBackendKind, Settings};
use ocrbench_core::{Comparator, OcrProvider};
use ocrbench_sheets::{GoogleSheetsBackend, InMemorySheetBackend, SheetBackend, SheetService};
use ocrbench_understanding::{ClovaOcrClient, GoogleVisionClient};

/// Both provider clients behind one comparator. Missing Clova credentials are fatal.
pub fn build_comparator(settings: &Settings, client: &Client) -> Result<Comparator> {
    let google: Arc<dyn OcrProvider> = Arc::new(
        GoogleVisionClient::from_settings(&settings.google, client.clone())
            .context("Failed to initialize Google Vision client")?,
    );
    let naver: Arc<dyn OcrProvider> = Arc::new(
        ClovaOcrClient::from_settings(&settings.clova, client.clone())
            .context("Failed to initialize Naver Clova client")?,
    );
    info!(timeout_ms = ?settings.provider_timeout_ms, "OCR providers ready");
    Ok(Comparator::new(google, naver).with_timeout(settings.provider_timeout()))
}

/// The sheet service, or the reason it is unavailable.
///
/// Failure here never stops the server; it is reported on each save attempt.
pub fn build_sheets(settings: &Settings, client: &Client) -> Result<Arc<SheetService>, String> {
    let backend: Arc<dyn SheetBackend> = match settings.sheets.backend {
        SheetBackendKind::Memory => Arc::new(InMemorySheetBackend::new()),
        SheetBackendKind::Google => {
            match GoogleSheetsBackend::from_settings(&settings.google, client.clone()) {
                Ok(backend) => Arc::new(backend),
                Err(e) => {
                    let reason = format!("Google Sheets unavailable: {e}");
                    warn!(error = %reason, "Sheet persistence disabled");
                    return Err(reason);
                }
            }
        }
    };

    let service = SheetService::new(
        backend,
        settings.sheets.spreadsheet_name.clone(),
        settings.sheets.spreadsheet_url.clone(),
    )
    .with_serialized_appends(settings.sheets.serialize_appends);
    info!(
        backend = ?settings.sheets.backend,
        spreadsheet = %settings.sheets.spreadsheet_name,
        "Sheet persistence ready"
    );
    Ok(Arc::new(service))
}
