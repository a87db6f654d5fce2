//! Comparison of two OCR extraction results.
//!
//! The derivation is pure: given the two results it computes length and
//! timing maps, a character-set Jaccard similarity and a recommendation.
//! [`Comparator`] wires it to the two provider clients.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::traits::OcrProvider;
use crate::types::{
    round2, ComparisonReport, ComparisonResponse, ExtractionResult, ProviderKind, Recommendation,
};

/// Similarity (percent) above which both services are considered equivalent.
pub const SIMILARITY_THRESHOLD: f64 = 80.0;

/// Jaccard similarity of the lower-cased character sets, in percent.
///
/// Returns 0.0 when either text is blank.
pub fn similarity_score(a: &str, b: &str) -> f64 {
    if a.trim().is_empty() || b.trim().is_empty() {
        return 0.0;
    }

    let set_a: HashSet<char> = a.to_lowercase().chars().collect();
    let set_b: HashSet<char> = b.to_lowercase().chars().collect();

    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    let common = set_a.intersection(&set_b).count();

    round2(common as f64 / union as f64 * 100.0)
}

/// Pick a verdict. First match wins; equal lengths favor Naver Clova.
pub fn recommend(
    google: &ExtractionResult,
    naver: &ExtractionResult,
    similarity: f64,
) -> Recommendation {
    match (google.success, naver.success) {
        (false, false) => Recommendation::BothFailed,
        (false, true) => Recommendation::PerformedBetter(ProviderKind::NaverClova),
        (true, false) => Recommendation::PerformedBetter(ProviderKind::GoogleVision),
        (true, true) if similarity > SIMILARITY_THRESHOLD => Recommendation::Similar,
        (true, true) if google.text_len() > naver.text_len() => {
            Recommendation::ExtractedMore(ProviderKind::GoogleVision)
        }
        (true, true) => Recommendation::ExtractedMore(ProviderKind::NaverClova),
    }
}

/// Derive the comparison report for a pair of results.
pub fn build_report(
    google: &ExtractionResult,
    naver: &ExtractionResult,
    timestamp: i64,
) -> ComparisonReport {
    let similarity = similarity_score(&google.full_text, &naver.full_text);

    let text_length_comparison = BTreeMap::from([
        (ProviderKind::GoogleVision, google.trimmed_len()),
        (ProviderKind::NaverClova, naver.trimmed_len()),
    ]);
    let processing_time_comparison = BTreeMap::from([
        (ProviderKind::GoogleVision, google.process_time),
        (ProviderKind::NaverClova, naver.process_time),
    ]);

    ComparisonReport {
        timestamp,
        text_length_comparison,
        processing_time_comparison,
        similarity_score: similarity,
        both_successful: google.success && naver.success,
        recommendation: recommend(google, naver, similarity),
    }
}

/// Runs both providers on the same image and derives the comparison.
///
/// Providers are injected once at startup and shared across requests; the
/// comparator itself holds no per-request state.
#[derive(Clone)]
pub struct Comparator {
    google_vision: Arc<dyn OcrProvider>,
    naver_clova: Arc<dyn OcrProvider>,
    provider_timeout: Option<Duration>,
}

impl Comparator {
    pub fn new(google_vision: Arc<dyn OcrProvider>, naver_clova: Arc<dyn OcrProvider>) -> Self {
        Self {
            google_vision,
            naver_clova,
            provider_timeout: None,
        }
    }

    /// Bound each provider call. An expired deadline becomes a failed result.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn provider(&self, kind: ProviderKind) -> &Arc<dyn OcrProvider> {
        match kind {
            ProviderKind::GoogleVision => &self.google_vision,
            ProviderKind::NaverClova => &self.naver_clova,
        }
    }

    /// Run a single provider, honoring the configured deadline.
    pub async fn extract(&self, kind: ProviderKind, image: &[u8]) -> ExtractionResult {
        let provider = self.provider(kind);
        let Some(limit) = self.provider_timeout else {
            return provider.extract(image).await;
        };

        match tokio::time::timeout(limit, provider.extract(image)).await {
            Ok(result) => result,
            Err(_) => {
                let ms = limit.as_millis();
                warn!(provider = %kind, timeout_ms = ms as u64, "Provider call timed out");
                ExtractionResult::failure(kind, format!("Timed out after {ms} ms"), ms as f64)
            }
        }
    }

    /// Call both providers concurrently and compare their output.
    ///
    /// Never fails: a provider error shows up as `success = false` in that
    /// provider's result. `sheet_info` is left for the caller to fill.
    #[instrument(skip(self, image), fields(image_bytes = image.len()))]
    pub async fn compare(&self, image: &[u8]) -> ComparisonResponse {
        let (google, naver) = tokio::join!(
            self.extract(ProviderKind::GoogleVision, image),
            self.extract(ProviderKind::NaverClova, image),
        );

        debug!(
            google_success = google.success,
            google_ms = google.process_time,
            naver_success = naver.success,
            naver_ms = naver.process_time,
            "Both providers returned"
        );

        let comparison = build_report(&google, &naver, chrono::Utc::now().timestamp());
        info!(
            similarity = comparison.similarity_score,
            both_successful = comparison.both_successful,
            recommendation = %comparison.recommendation,
            "Comparison complete"
        );

        ComparisonResponse {
            timestamp: comparison.timestamp,
            comparison,
            google_vision: google,
            naver_clova: naver,
            sheet_info: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ok(kind: ProviderKind, text: &str, ms: f64) -> ExtractionResult {
        ExtractionResult::success(kind, text, ms)
    }

    fn failed(kind: ProviderKind) -> ExtractionResult {
        ExtractionResult::failure(kind, "boom", 1.0)
    }

    #[test]
    fn identical_text_is_fully_similar() {
        assert_eq!(similarity_score("Invoice 2024", "invoice 2024"), 100.0);
    }

    #[test]
    fn blank_text_short_circuits() {
        assert_eq!(similarity_score("abc", ""), 0.0);
        assert_eq!(similarity_score("", ""), 0.0);
        assert_eq!(similarity_score("   \n", "abc"), 0.0);
    }

    #[test]
    fn similarity_is_character_set_jaccard() {
        // {h,e,l,o,' ',w,r,d} vs {h,e,l,o,' ',t,r}: 6 shared of 9.
        assert_eq!(similarity_score("hello world", "hello there"), 66.67);
        assert_eq!(similarity_score("abc", "xyz"), 0.0);
    }

    #[test]
    fn both_failed_wins_first() {
        let r = recommend(
            &failed(ProviderKind::GoogleVision),
            &failed(ProviderKind::NaverClova),
            0.0,
        );
        assert_eq!(r, Recommendation::BothFailed);
        assert_eq!(
            r.message(),
            "Both OCR services failed. Please check the image quality."
        );
    }

    #[test]
    fn single_failure_prefers_the_other_provider() {
        let google_failed = recommend(
            &failed(ProviderKind::GoogleVision),
            &ok(ProviderKind::NaverClova, "text", 1.0),
            0.0,
        );
        assert_eq!(
            google_failed.message(),
            "Naver Clova OCR performed better for this image."
        );

        let naver_failed = recommend(
            &ok(ProviderKind::GoogleVision, "text", 1.0),
            &failed(ProviderKind::NaverClova),
            0.0,
        );
        assert_eq!(
            naver_failed.message(),
            "Google Vision API performed better for this image."
        );
    }

    #[test]
    fn high_similarity_is_reported_as_similar() {
        let r = recommend(
            &ok(ProviderKind::GoogleVision, "short", 1.0),
            &ok(ProviderKind::NaverClova, "a much longer text", 1.0),
            85.0,
        );
        assert_eq!(r, Recommendation::Similar);
    }

    #[test]
    fn exactly_eighty_is_not_similar() {
        let r = recommend(
            &ok(ProviderKind::GoogleVision, "longer text", 1.0),
            &ok(ProviderKind::NaverClova, "short", 1.0),
            80.0,
        );
        assert_eq!(r, Recommendation::ExtractedMore(ProviderKind::GoogleVision));
    }

    #[test]
    fn equal_lengths_fall_through_to_naver() {
        let text = "x".repeat(50);
        let other = "y".repeat(50);
        let r = recommend(
            &ok(ProviderKind::GoogleVision, &text, 1.0),
            &ok(ProviderKind::NaverClova, &other, 1.0),
            10.0,
        );
        assert_eq!(
            r.message(),
            "Naver Clova OCR extracted more text. Recommended for this image."
        );
    }

    #[test]
    fn recommendation_is_deterministic() {
        let g = ok(ProviderKind::GoogleVision, "alpha beta", 5.0);
        let n = ok(ProviderKind::NaverClova, "alpha", 7.0);
        let first = recommend(&g, &n, 40.0);
        for _ in 0..10 {
            assert_eq!(recommend(&g, &n, 40.0), first);
        }
    }

    #[test]
    fn report_for_hello_scenario() {
        let g = ok(ProviderKind::GoogleVision, "hello world", 100.0);
        let n = ok(ProviderKind::NaverClova, "hello there", 120.0);
        let report = build_report(&g, &n, 1_700_000_000);

        assert_eq!(report.text_length_comparison[&ProviderKind::GoogleVision], 11);
        assert_eq!(report.text_length_comparison[&ProviderKind::NaverClova], 11);
        assert_eq!(report.processing_time_comparison[&ProviderKind::NaverClova], 120.0);
        assert_eq!(report.similarity_score, 66.67);
        assert!(report.both_successful);
        assert_eq!(report.recommendation, Recommendation::ExtractedMore(ProviderKind::NaverClova));
    }

    #[test]
    fn report_lengths_are_trimmed() {
        let g = ok(ProviderKind::GoogleVision, "  padded\n", 1.0);
        let n = ExtractionResult::failure(ProviderKind::NaverClova, "No text detected", 2.0);
        let report = build_report(&g, &n, 0);
        assert_eq!(report.text_length_comparison[&ProviderKind::GoogleVision], 6);
        assert_eq!(report.text_length_comparison[&ProviderKind::NaverClova], 0);
        assert_eq!(report.similarity_score, 0.0);
        assert!(!report.both_successful);
    }

    struct Canned {
        kind: ProviderKind,
        text: Option<&'static str>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl Canned {
        fn new(kind: ProviderKind, text: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                kind,
                text,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl OcrProvider for Canned {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        async fn extract(&self, _image: &[u8]) -> ExtractionResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match self.text {
                Some(t) => ExtractionResult::success(self.kind, t, 10.0),
                None => ExtractionResult::failure(self.kind, "unauthorized", 10.0),
            }
        }
    }

    #[tokio::test]
    async fn compare_degrades_when_one_provider_fails() {
        let google = Canned::new(ProviderKind::GoogleVision, None);
        let naver = Canned::new(ProviderKind::NaverClova, Some("안녕하세요"));
        let comparator = Comparator::new(google.clone(), naver.clone());

        let response = comparator.compare(b"img").await;

        assert_eq!(google.calls.load(Ordering::SeqCst), 1);
        assert_eq!(naver.calls.load(Ordering::SeqCst), 1);
        assert!(!response.google_vision.success);
        assert_eq!(response.google_vision.error.as_deref(), Some("unauthorized"));
        assert_eq!(response.naver_clova.full_text, "안녕하세요");
        assert_eq!(response.comparison.text_length_comparison[&ProviderKind::NaverClova], 5);
        assert_eq!(
            response.comparison.recommendation,
            Recommendation::PerformedBetter(ProviderKind::NaverClova)
        );
        assert_eq!(response.timestamp, response.comparison.timestamp);
        assert!(response.sheet_info.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_is_cut_off_by_deadline() {
        let google = Arc::new(Canned {
            kind: ProviderKind::GoogleVision,
            text: Some("late"),
            delay: Duration::from_secs(30),
            calls: AtomicUsize::new(0),
        });
        let naver = Canned::new(ProviderKind::NaverClova, Some("on time"));
        let comparator =
            Comparator::new(google, naver).with_timeout(Some(Duration::from_millis(500)));

        let response = comparator.compare(b"img").await;

        assert!(!response.google_vision.success);
        assert_eq!(response.google_vision.error.as_deref(), Some("Timed out after 500 ms"));
        assert_eq!(response.google_vision.process_time, 500.0);
        assert!(response.naver_clova.success);
    }
}
