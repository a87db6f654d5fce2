use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, instrument};

use ocrbench_core::{ComparisonResponse, ExtractionResult, ProviderKind, SheetInfo};
use ocrbench_sheets::ComparisonRecord;

use crate::error::ApiError;
use crate::state::AppState;
use crate::upload::{read_upload, UploadPayload};

/// Liveness banner.
pub async fn root(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "message": "OCR Validation API is running",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.environment,
    }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// Run both providers on the uploaded image and optionally persist the result.
#[instrument(skip_all)]
pub async fn compare(
    State(state): State<Arc<AppState>>,
    multipart: UploadPayload,
) -> Result<Json<ComparisonResponse>, ApiError> {
    let upload = read_upload(multipart, &state.limits).await?;
    info!(
        file = %upload.filename,
        bytes = upload.bytes.len(),
        save_to_sheet = upload.save_to_sheet,
        sheet = %upload.sheet_name,
        "Comparing providers"
    );

    let response = state.comparator.compare(&upload.bytes).await;

    let sheet_info = if upload.save_to_sheet {
        match &state.sheets {
            Ok(sheets) => {
                let record = ComparisonRecord::from_response(
                    &upload.filename,
                    upload.bytes.len(),
                    &response,
                );
                sheets.save_comparison(&upload.sheet_name, &record).await
            }
            Err(init_error) => SheetInfo::failed(&upload.sheet_name, init_error.clone()),
        }
    } else {
        SheetInfo::not_requested(&upload.sheet_name)
    };

    Ok(Json(response.with_sheet_info(sheet_info)))
}

async fn single_provider(
    state: &AppState,
    kind: ProviderKind,
    multipart: UploadPayload,
) -> Result<Json<ExtractionResult>, ApiError> {
    let upload = read_upload(multipart, &state.limits).await?;
    info!(
        provider = %kind,
        file = %upload.filename,
        bytes = upload.bytes.len(),
        "Single-provider extraction"
    );
    Ok(Json(state.comparator.extract(kind, &upload.bytes).await))
}

pub async fn google_vision(
    State(state): State<Arc<AppState>>,
    multipart: UploadPayload,
) -> Result<Json<ExtractionResult>, ApiError> {
    single_provider(&state, ProviderKind::GoogleVision, multipart).await
}

pub async fn naver_clova(
    State(state): State<Arc<AppState>>,
    multipart: UploadPayload,
) -> Result<Json<ExtractionResult>, ApiError> {
    single_provider(&state, ProviderKind::NaverClova, multipart).await
}

/// Static descriptor list.
pub async fn providers() -> Json<Value> {
    let providers: Vec<Value> = ProviderKind::ALL
        .iter()
        .map(|kind| json!({ "name": kind.as_str(), "description": kind.description() }))
        .collect();
    Json(json!({ "providers": providers }))
}

#[derive(Debug, Deserialize)]
pub struct TestSheetParams {
    #[serde(default = "default_test_sheet")]
    pub sheet_name: String,
    #[serde(default = "default_test_data")]
    pub test_data: String,
}

fn default_test_sheet() -> String {
    "test".to_string()
}

fn default_test_data() -> String {
    "test message".to_string()
}

fn sample_record(test_data: &str) -> ComparisonRecord {
    ComparisonRecord {
        timestamp: chrono::Local::now(),
        image_name: format!("test_{test_data}.jpg"),
        image_size: 2048,
        google: ExtractionResult::success(
            ProviderKind::GoogleVision,
            format!("Google OCR test: {test_data}"),
            123.45,
        ),
        naver: ExtractionResult::success(
            ProviderKind::NaverClova,
            format!("Naver OCR test: {test_data}"),
            98.76,
        ),
        similarity_score: 85.5,
        both_successful: true,
        recommendation: "Test completed successfully".to_string(),
    }
}

/// Write a synthetic row to check the sheet wiring end to end.
#[instrument(skip(state))]
pub async fn test_sheet(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TestSheetParams>,
) -> Json<Value> {
    let result = async {
        let sheets = state.sheets.as_ref().map_err(|e| e.clone())?;
        let record = sample_record(&params.test_data);
        let save_result = sheets
            .append_row(&params.sheet_name, &record.to_row())
            .await
            .map_err(|e| e.to_string())?;
        let url = sheets.resource_url().await.map_err(|e| e.to_string())?;
        Ok::<_, String>((save_result, url))
    }
    .await;

    match result {
        Ok((save_result, url)) => Json(json!({
            "success": true,
            "message": format!("Test data saved to sheet '{}'", params.sheet_name),
            "sheet_name": params.sheet_name,
            "test_data": params.test_data,
            "spreadsheet_url": url,
            "save_result": save_result,
        })),
        Err(error) => Json(json!({
            "success": false,
            "message": format!("Failed to save test data: {error}"),
            "error": error,
        })),
    }
}
