//! Naver Clova OCR (General OCR, V2 protocol).
//!
//! The image travels base64-encoded inside a JSON envelope with a fresh
//! request id. Recognized fields are joined with single spaces in the order
//! Clova returns them.

use std::time::Instant;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use ocrbench_config::ClovaSettings;
use ocrbench_core::{elapsed_ms, ExtractionResult, OcrProvider, ProviderKind};
use ocrbench_logging::redact_sensitive_data;

use crate::error::{ExtractError, ProviderInitError};
use crate::image_format::sniff_clova_format;

pub struct ClovaOcrClient {
    client: Client,
    secret_key: String,
    invoke_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OcrRequest<'a> {
    images: Vec<OcrImage<'a>>,
    request_id: String,
    version: &'static str,
    timestamp: i64,
}

#[derive(Serialize)]
struct OcrImage<'a> {
    format: &'static str,
    name: &'a str,
    data: String,
}

#[derive(Deserialize)]
struct OcrResponse {
    #[serde(default)]
    images: Vec<ImageResult>,
}

#[derive(Deserialize)]
struct ImageResult {
    #[serde(default)]
    fields: Vec<Field>,
}

#[derive(Deserialize)]
struct Field {
    #[serde(default, rename = "inferText")]
    infer_text: String,
}

impl ClovaOcrClient {
    pub fn new(
        secret_key: impl Into<String>,
        invoke_url: impl Into<String>,
        client: Client,
    ) -> Self {
        Self {
            client,
            secret_key: secret_key.into(),
            invoke_url: invoke_url.into(),
        }
    }

    /// Both the secret and the invoke URL are required.
    pub fn from_settings(
        settings: &ClovaSettings,
        client: Client,
    ) -> Result<Self, ProviderInitError> {
        let secret_key = settings
            .secret_key
            .clone()
            .ok_or(ProviderInitError::MissingCredential("NCP_SECRET_KEY"))?;
        let invoke_url = settings
            .ocr_url
            .clone()
            .ok_or(ProviderInitError::MissingCredential("NCP_OCR_URL"))?;
        Ok(Self::new(secret_key, invoke_url, client))
    }

    async fn recognize(&self, image: &[u8]) -> Result<String, ExtractError> {
        let body = OcrRequest {
            images: vec![OcrImage {
                format: sniff_clova_format(image),
                name: "sample_image",
                data: STANDARD.encode(image),
            }],
            request_id: uuid::Uuid::new_v4().to_string(),
            version: "V2",
            timestamp: chrono::Utc::now().timestamp_millis(),
        };

        debug!(request_id = %body.request_id, bytes = image.len(), "Sending image to Clova OCR");

        let response = self
            .client
            .post(&self.invoke_url)
            .header("X-OCR-SECRET", &self.secret_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OcrResponse = response.json().await?;
        let fields = parsed
            .images
            .into_iter()
            .next()
            .map(|img| img.fields)
            .unwrap_or_default();

        if fields.is_empty() {
            return Err(ExtractError::NoText);
        }

        Ok(fields
            .into_iter()
            .map(|f| f.infer_text)
            .collect::<Vec<_>>()
            .join(" "))
    }
}

#[async_trait]
impl OcrProvider for ClovaOcrClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::NaverClova
    }

    async fn extract(&self, image: &[u8]) -> ExtractionResult {
        let start = Instant::now();
        match self.recognize(image).await {
            Ok(text) => ExtractionResult::success(self.kind(), text, elapsed_ms(start)),
            Err(e) => {
                let message = redact_sensitive_data(&e.to_string());
                warn!(provider = %self.kind(), error = %message, "Clova OCR failed");
                ExtractionResult::failure(self.kind(), message, elapsed_ms(start))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn;

    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};

    async fn fields_handler(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
        assert_eq!(headers.get("X-OCR-SECRET").unwrap(), "s3cret");
        assert_eq!(body["version"], "V2");
        assert_eq!(body["images"][0]["format"], "jpg");
        assert_eq!(body["images"][0]["name"], "sample_image");
        assert!(body["requestId"].as_str().unwrap().len() == 36);
        Json(json!({
            "images": [{
                "inferResult": "SUCCESS",
                "fields": [
                    { "inferText": "hello" },
                    { "inferText": "clova" },
                    { "inferText": "world" }
                ]
            }]
        }))
    }

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3];

    #[tokio::test]
    async fn joins_fields_with_spaces() {
        let base = spawn(Router::new().route("/general", post(fields_handler))).await;
        let client = ClovaOcrClient::new("s3cret", format!("{base}/general"), Client::new());

        let result = client.extract(JPEG).await;

        assert!(result.success, "error: {:?}", result.error);
        assert_eq!(result.provider, ProviderKind::NaverClova);
        assert_eq!(result.full_text, "hello clova world");
        assert!(result.error.is_none());
        assert!(result.process_time >= 0.0);
    }

    #[tokio::test]
    async fn zero_fields_is_no_text_detected() {
        let app = Router::new().route(
            "/general",
            post(|| async { Json(json!({ "images": [{ "fields": [] }] })) }),
        );
        let base = spawn(app).await;
        let client = ClovaOcrClient::new("s3cret", format!("{base}/general"), Client::new());

        let result = client.extract(b"bytes").await;

        assert!(!result.success);
        assert_eq!(result.full_text, "");
        assert_eq!(result.error.as_deref(), Some("No text detected"));
    }

    #[tokio::test]
    async fn http_error_carries_status_and_body() {
        let app = Router::new().route(
            "/general",
            post(|| async { (StatusCode::UNAUTHORIZED, "invalid secret") }),
        );
        let base = spawn(app).await;
        let client = ClovaOcrClient::new("wrong", format!("{base}/general"), Client::new());

        let result = client.extract(b"bytes").await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("API Error: 401 - invalid secret"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_captured() {
        let client = ClovaOcrClient::new("s3cret", "http://127.0.0.1:1/general", Client::new());
        let result = client.extract(b"bytes").await;
        assert!(!result.success);
        assert!(result.error.is_some());
        assert!(result.process_time >= 0.0);
    }

    #[test]
    fn missing_secret_fails_at_construction() {
        let settings = ClovaSettings {
            secret_key: None,
            ocr_url: Some("https://clova.example".into()),
        };
        let err = ClovaOcrClient::from_settings(&settings, Client::new()).err().unwrap();
        assert!(err.to_string().contains("NCP_SECRET_KEY"));
    }
}
