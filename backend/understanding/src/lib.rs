//! OCR provider clients.
//!
//! Each client implements [`ocrbench_core::OcrProvider`] and keeps its own
//! text-assembly strategy: Clova joins the detected fields, Vision takes the
//! provider's full-page transcription.

pub mod clova;
pub mod error;
pub mod image_format;
pub mod static_provider;
pub mod vision;

pub use clova::ClovaOcrClient;
pub use error::{ExtractError, ProviderInitError};
pub use image_format::sniff_clova_format;
pub use static_provider::StaticProvider;
pub use vision::{GoogleVisionClient, VisionAuth};

/// Shared HTTP client for all provider calls.
pub fn http_client() -> anyhow::Result<reqwest::Client> {
    use anyhow::Context;

    reqwest::Client::builder()
        .user_agent(concat!("ocrbench/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

#[cfg(test)]
pub(crate) mod test_support {
    /// Serve `app` on an ephemeral local port and return its base URL.
    pub async fn spawn(app: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }
}
