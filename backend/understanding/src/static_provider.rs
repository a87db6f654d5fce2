use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use ocrbench_core::{elapsed_ms, ExtractionResult, OcrProvider, ProviderKind};

/// A provider that returns a canned outcome and counts its calls.
pub struct StaticProvider {
    kind: ProviderKind,
    outcome: Result<String, String>,
    delay: Duration,
    calls: AtomicUsize,
}

impl StaticProvider {
    pub fn text(kind: ProviderKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            outcome: Ok(text.into()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(kind: ProviderKind, error: impl Into<String>) -> Self {
        Self {
            kind,
            outcome: Err(error.into()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrProvider for StaticProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn extract(&self, _image: &[u8]) -> ExtractionResult {
        let start = Instant::now();
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.outcome {
            Ok(text) => ExtractionResult::success(self.kind, text.clone(), elapsed_ms(start)),
            Err(error) => ExtractionResult::failure(self.kind, error.clone(), elapsed_ms(start)),
        }
    }
}
