use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::OcrBenchError;

/// The two OCR services under comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    GoogleVision,
    NaverClova,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::GoogleVision, ProviderKind::NaverClova];

    /// Wire identifier, also used as the JSON key in responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GoogleVision => "google_vision",
            Self::NaverClova => "naver_clova",
        }
    }

    /// Name used in recommendation messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::GoogleVision => "Google Vision API",
            Self::NaverClova => "Naver Clova OCR",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::GoogleVision => "Google Cloud Vision API - robust multilingual OCR",
            Self::NaverClova => "Naver Clova OCR - optimized for Korean text recognition",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = OcrBenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "google_vision" | "google" => Ok(Self::GoogleVision),
            "naver_clova" | "naver" | "clova" => Ok(Self::NaverClova),
            _ => Err(OcrBenchError::UnknownProvider(s.to_string())),
        }
    }
}

/// Milliseconds since `start`, rounded to two decimals.
pub fn elapsed_ms(start: Instant) -> f64 {
    round2(start.elapsed().as_secs_f64() * 1000.0)
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Outcome of one provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub provider: ProviderKind,
    pub full_text: String,
    pub success: bool,
    /// Wall-clock milliseconds spent on the call, failures included.
    pub process_time: f64,
    pub error: Option<String>,
}

impl ExtractionResult {
    pub fn success(
        provider: ProviderKind,
        full_text: impl Into<String>,
        process_time: f64,
    ) -> Self {
        Self {
            provider,
            full_text: full_text.into(),
            success: true,
            process_time: process_time.max(0.0),
            error: None,
        }
    }

    pub fn failure(provider: ProviderKind, error: impl Into<String>, process_time: f64) -> Self {
        Self {
            provider,
            full_text: String::new(),
            success: false,
            process_time: process_time.max(0.0),
            error: Some(error.into()),
        }
    }

    /// Character count of the text with surrounding whitespace removed.
    pub fn trimmed_len(&self) -> usize {
        self.full_text.trim().chars().count()
    }

    /// Character count of the raw text.
    pub fn text_len(&self) -> usize {
        self.full_text.chars().count()
    }
}

/// One of the fixed verdicts produced by the comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Recommendation {
    BothFailed,
    /// The other provider failed, so this one wins by default.
    PerformedBetter(ProviderKind),
    Similar,
    ExtractedMore(ProviderKind),
}

impl Recommendation {
    pub fn message(&self) -> String {
        match self {
            Self::BothFailed => {
                "Both OCR services failed. Please check the image quality.".to_string()
            }
            Self::PerformedBetter(p) => {
                format!("{} performed better for this image.", p.display_name())
            }
            Self::Similar => {
                "Both services produced similar results. Either service would work well."
                    .to_string()
            }
            Self::ExtractedMore(p) => format!(
                "{} extracted more text. Recommended for this image.",
                p.display_name()
            ),
        }
    }

    fn all() -> Vec<Recommendation> {
        let mut all = vec![Self::BothFailed, Self::Similar];
        for p in ProviderKind::ALL {
            all.push(Self::PerformedBetter(p));
            all.push(Self::ExtractedMore(p));
        }
        all
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl From<Recommendation> for String {
    fn from(r: Recommendation) -> Self {
        r.message()
    }
}

impl TryFrom<String> for Recommendation {
    type Error = OcrBenchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::all()
            .into_iter()
            .find(|r| r.message() == value)
            .ok_or(OcrBenchError::UnknownRecommendation(value))
    }
}

/// Derived comparison of two extraction results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// Epoch seconds at comparison time.
    pub timestamp: i64,
    pub text_length_comparison: BTreeMap<ProviderKind, usize>,
    pub processing_time_comparison: BTreeMap<ProviderKind, f64>,
    /// Character-set Jaccard similarity in percent, two decimals.
    pub similarity_score: f64,
    pub both_successful: bool,
    pub recommendation: Recommendation,
}

/// Outcome of the optional spreadsheet write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetInfo {
    pub saved: bool,
    pub sheet_name: String,
    pub spreadsheet_url: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl SheetInfo {
    pub fn not_requested(sheet_name: impl Into<String>) -> Self {
        Self {
            saved: false,
            sheet_name: sheet_name.into(),
            message: Some("Not requested to save to sheet".to_string()),
            ..Default::default()
        }
    }

    pub fn saved(
        sheet_name: impl Into<String>,
        spreadsheet_url: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            saved: true,
            sheet_name: sheet_name.into(),
            spreadsheet_url,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn failed(sheet_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            saved: false,
            sheet_name: sheet_name.into(),
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Everything a comparison request returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResponse {
    pub comparison: ComparisonReport,
    pub google_vision: ExtractionResult,
    pub naver_clova: ExtractionResult,
    pub timestamp: i64,
    pub sheet_info: Option<SheetInfo>,
}

impl ComparisonResponse {
    pub fn result(&self, kind: ProviderKind) -> &ExtractionResult {
        match kind {
            ProviderKind::GoogleVision => &self.google_vision,
            ProviderKind::NaverClova => &self.naver_clova,
        }
    }

    pub fn with_sheet_info(mut self, info: SheetInfo) -> Self {
        self.sheet_info = Some(info);
        self
    }
}
