//! Multipart image upload parsing and validation.

use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart,
    },
    http::StatusCode,
};
use tracing::debug;

use ocrbench_config::{parse_bool, DEFAULT_SHEET_NAME};

use crate::error::ApiError;

/// One validated image plus the optional comparison form fields.
#[derive(Debug)]
pub struct UploadForm {
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
    pub save_to_sheet: bool,
    pub sheet_name: String,
}

/// Size and type limits applied to every upload.
#[derive(Debug, Clone)]
pub struct UploadLimits {
    pub max_file_size: usize,
    pub max_file_size_label: String,
}

impl UploadLimits {
    fn too_large(&self) -> ApiError {
        ApiError::Validation(format!(
            "File size exceeds {} limit",
            self.max_file_size_label
        ))
    }

    fn multipart_error(&self, err: MultipartError) -> ApiError {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            self.too_large()
        } else {
            ApiError::Validation(err.body_text())
        }
    }
}

struct RawFile {
    filename: String,
    content_type: Option<String>,
    bytes: Bytes,
}

/// The multipart extractor, with its rejection kept so it renders as `{"detail"}`.
pub type UploadPayload = Result<Multipart, MultipartRejection>;

/// Read every field, then validate in order: presence, type, size.
pub async fn read_upload(
    payload: UploadPayload,
    limits: &UploadLimits,
) -> Result<UploadForm, ApiError> {
    let mut multipart = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    let mut file = None;
    let mut save_to_sheet = false;
    let mut sheet_name = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| limits.multipart_error(e))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| limits.multipart_error(e))?;
                file = Some(RawFile {
                    filename,
                    content_type,
                    bytes,
                });
            }
            "save_to_sheet" => {
                let raw = field.text().await.map_err(|e| limits.multipart_error(e))?;
                save_to_sheet = parse_bool(&raw).ok_or_else(|| {
                    ApiError::Validation(format!("save_to_sheet must be a boolean, got '{raw}'"))
                })?;
            }
            "sheet_name" => {
                let raw = field.text().await.map_err(|e| limits.multipart_error(e))?;
                if !raw.trim().is_empty() {
                    sheet_name = Some(raw);
                }
            }
            other => debug!(field = other, "Ignoring unknown form field"),
        }
    }

    let file = file.ok_or_else(|| ApiError::Validation("Missing file field".to_string()))?;
    let content_type = file
        .content_type
        .filter(|ct| ct.starts_with("image/"))
        .ok_or_else(|| ApiError::Validation("File must be an image".to_string()))?;
    if file.bytes.len() > limits.max_file_size {
        return Err(limits.too_large());
    }

    Ok(UploadForm {
        filename: file.filename,
        content_type,
        bytes: file.bytes,
        save_to_sheet,
        sheet_name: sheet_name.unwrap_or_else(|| DEFAULT_SHEET_NAME.to_string()),
    })
}
