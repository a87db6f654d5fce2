//! Google Cloud Vision text detection.
//!
//! Uses the `images:annotate` REST endpoint with `TEXT_DETECTION`. The first
//! text annotation is Vision's full-page transcription and becomes the
//! extracted text as-is; the per-word annotations that follow are ignored.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use ocrbench_config::GoogleSettings;
use ocrbench_core::{elapsed_ms, ExtractionResult, OcrProvider, ProviderKind};
use ocrbench_infra::{google_token_source, AccessTokenSource, CLOUD_PLATFORM_SCOPE};
use ocrbench_logging::redact_sensitive_data;

use crate::error::{ExtractError, ProviderInitError};

/// How requests to Vision are authorized.
pub enum VisionAuth {
    ApiKey(String),
    OAuth(Arc<dyn AccessTokenSource>),
}

pub struct GoogleVisionClient {
    client: Client,
    endpoint: String,
    auth: VisionAuth,
}

#[derive(Serialize)]
struct AnnotateRequest<'a> {
    requests: [ImageRequest<'a>; 1],
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    image: ImageContent,
    features: [Feature<'a>; 1],
}

#[derive(Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Serialize)]
struct Feature<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    #[serde(default)]
    text_annotations: Vec<TextAnnotation>,
    #[serde(default)]
    error: Option<RpcStatus>,
}

#[derive(Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct RpcStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

impl GoogleVisionClient {
    pub fn new(endpoint: impl Into<String>, auth: VisionAuth, client: Client) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            auth,
        }
    }

    /// API key if configured, otherwise OAuth via service account or the
    /// metadata server.
    pub fn from_settings(
        settings: &GoogleSettings,
        client: Client,
    ) -> Result<Self, ProviderInitError> {
        let auth = match &settings.vision_api_key {
            Some(key) => VisionAuth::ApiKey(key.clone()),
            None => VisionAuth::OAuth(google_token_source(
                settings,
                &[CLOUD_PLATFORM_SCOPE],
                client.clone(),
            )?),
        };
        Ok(Self::new(settings.vision_url.clone(), auth, client))
    }

    async fn detect_text(&self, image: &[u8]) -> Result<String, ExtractError> {
        let body = AnnotateRequest {
            requests: [ImageRequest {
                image: ImageContent {
                    content: STANDARD.encode(image),
                },
                features: [Feature {
                    kind: "TEXT_DETECTION",
                }],
            }],
        };

        let request = self.client.post(&self.endpoint).json(&body);
        let request = match &self.auth {
            VisionAuth::ApiKey(key) => request.query(&[("key", key.as_str())]),
            VisionAuth::OAuth(source) => request.bearer_auth(source.access_token().await?),
        };

        debug!(bytes = image.len(), "Sending image to Google Vision");
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: AnnotateResponse = response.json().await?;
        let Some(first) = parsed.responses.into_iter().next() else {
            return Ok(String::new());
        };
        if let Some(err) = first.error.filter(|e| e.code != 0) {
            return Err(ExtractError::Provider {
                code: err.code,
                message: err.message,
            });
        }

        Ok(first
            .text_annotations
            .into_iter()
            .next()
            .map(|a| a.description)
            .unwrap_or_default())
    }
}

#[async_trait]
impl OcrProvider for GoogleVisionClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GoogleVision
    }

    async fn extract(&self, image: &[u8]) -> ExtractionResult {
        let start = Instant::now();
        match self.detect_text(image).await {
            Ok(text) => ExtractionResult::success(self.kind(), text, elapsed_ms(start)),
            Err(e) => {
                let message = redact_sensitive_data(&e.to_string());
                warn!(provider = %self.kind(), error = %message, "Google Vision failed");
                ExtractionResult::failure(self.kind(), message, elapsed_ms(start))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn;

    use axum::{
        extract::Query,
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
        routing::post,
        Json, Router,
    };
    use ocrbench_infra::StaticTokenSource;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    async fn annotate(
        Query(q): Query<HashMap<String, String>>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        assert_eq!(q.get("key").map(String::as_str), Some("test-key"));
        assert_eq!(body["requests"][0]["features"][0]["type"], "TEXT_DETECTION");
        assert_eq!(body["requests"][0]["image"]["content"], STANDARD.encode(b"png-bytes"));
        Json(json!({
            "responses": [{
                "textAnnotations": [
                    { "locale": "en", "description": "Hello World\nLine two\n" },
                    { "description": "Hello" },
                    { "description": "World" }
                ]
            }]
        }))
    }

    #[tokio::test]
    async fn takes_full_page_annotation() {
        let base = spawn(Router::new().route("/annotate", post(annotate))).await;
        let client = GoogleVisionClient::new(
            format!("{base}/annotate"),
            VisionAuth::ApiKey("test-key".into()),
            Client::new(),
        );

        let result = client.extract(b"png-bytes").await;

        assert!(result.success, "error: {:?}", result.error);
        assert_eq!(result.provider, ProviderKind::GoogleVision);
        assert_eq!(result.full_text, "Hello World\nLine two\n");
    }

    #[tokio::test]
    async fn no_annotations_is_empty_success() {
        let app = Router::new().route(
            "/annotate",
            post(|| async { Json(json!({ "responses": [{}] })) }),
        );
        let base = spawn(app).await;
        let client = GoogleVisionClient::new(
            format!("{base}/annotate"),
            VisionAuth::ApiKey("k".into()),
            Client::new(),
        );

        let result = client.extract(b"blank").await;

        assert!(result.success);
        assert_eq!(result.full_text, "");
    }

    #[tokio::test]
    async fn per_image_error_is_failure() {
        let app = Router::new().route(
            "/annotate",
            post(|| async {
                Json(json!({
                    "responses": [{ "error": { "code": 3, "message": "Bad image data." } }]
                }))
            }),
        );
        let base = spawn(app).await;
        let client = GoogleVisionClient::new(
            format!("{base}/annotate"),
            VisionAuth::ApiKey("k".into()),
            Client::new(),
        );

        let result = client.extract(b"not an image").await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Vision API error 3: Bad image data."));
    }

    async fn bearer_only(headers: HeaderMap) -> impl IntoResponse {
        match headers.get("authorization").and_then(|v| v.to_str().ok()) {
            Some("Bearer ya29.token") => (
                StatusCode::OK,
                Json(json!({ "responses": [{ "textAnnotations": [{ "description": "ok" }] }] })),
            ),
            _ => (StatusCode::FORBIDDEN, Json(json!({ "error": "denied" }))),
        }
    }

    #[tokio::test]
    async fn oauth_token_is_sent_as_bearer() {
        let base = spawn(Router::new().route("/annotate", post(bearer_only))).await;
        let good = GoogleVisionClient::new(
            format!("{base}/annotate"),
            VisionAuth::OAuth(Arc::new(StaticTokenSource::new("ya29.token"))),
            Client::new(),
        );
        assert_eq!(good.extract(b"img").await.full_text, "ok");

        let bad = GoogleVisionClient::new(
            format!("{base}/annotate"),
            VisionAuth::OAuth(Arc::new(StaticTokenSource::new("expired"))),
            Client::new(),
        );
        let result = bad.extract(b"img").await;
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("API Error: 403"));
    }

    #[tokio::test]
    async fn transport_errors_do_not_leak_api_key() {
        let client = GoogleVisionClient::new(
            "http://127.0.0.1:1/v1/images:annotate",
            VisionAuth::ApiKey("AIzaSyLeakMe".into()),
            Client::new(),
        );

        let result = client.extract(b"img").await;

        assert!(!result.success);
        assert!(!result.error.unwrap().contains("AIzaSyLeakMe"));
    }
}
