use async_trait::async_trait;

use crate::types::{ExtractionResult, ProviderKind};

/// An OCR service that turns image bytes into text.
///
/// Implementations never fail across this boundary: transport, auth, encoding
/// and provider-side errors are folded into an [`ExtractionResult`] with
/// `success = false`, and the elapsed time is reported either way.
#[async_trait]
pub trait OcrProvider: Send + Sync {
    /// Which of the two compared services this client talks to.
    fn kind(&self) -> ProviderKind;

    /// Run text detection on the raw image bytes.
    async fn extract(&self, image: &[u8]) -> ExtractionResult;
}
