use chrono::{DateTime, Local};
use serde_json::{json, Value};

use ocrbench_core::{ComparisonResponse, ExtractionResult};

/// Header row, in column order A..N.
pub const HEADERS: [&str; 14] = [
    "Timestamp",
    "Image_Name",
    "Image_Size",
    "Google_Success",
    "Google_Text_Length",
    "Google_Full_Text",
    "Google_Processing_Time",
    "Naver_Success",
    "Naver_Text_Length",
    "Naver_Full_Text",
    "Naver_Processing_Time",
    "Similarity_Score",
    "Both_Successful",
    "Recommendation",
];

/// One persisted comparison, flattened.
#[derive(Debug, Clone)]
pub struct ComparisonRecord {
    pub timestamp: DateTime<Local>,
    pub image_name: String,
    pub image_size: usize,
    pub google: ExtractionResult,
    pub naver: ExtractionResult,
    pub similarity_score: f64,
    pub both_successful: bool,
    pub recommendation: String,
}

impl ComparisonRecord {
    pub fn from_response(
        image_name: impl Into<String>,
        image_size: usize,
        response: &ComparisonResponse,
    ) -> Self {
        Self {
            timestamp: Local::now(),
            image_name: image_name.into(),
            image_size,
            google: response.google_vision.clone(),
            naver: response.naver_clova.clone(),
            similarity_score: response.comparison.similarity_score,
            both_successful: response.comparison.both_successful,
            recommendation: response.comparison.recommendation.message(),
        }
    }

    pub fn to_row(&self) -> Vec<Value> {
        vec![
            json!(self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()),
            json!(self.image_name),
            json!(format!("{:.2} KB", self.image_size as f64 / 1024.0)),
            json!(self.google.success),
            json!(self.google.text_len()),
            json!(self.google.full_text),
            json!(format!("{} ms", self.google.process_time)),
            json!(self.naver.success),
            json!(self.naver.text_len()),
            json!(self.naver.full_text),
            json!(format!("{} ms", self.naver.process_time)),
            json!(self.similarity_score),
            json!(self.both_successful),
            json!(self.recommendation),
        ]
    }
}

pub(crate) fn header_row() -> Vec<Value> {
    HEADERS.iter().map(|h| json!(h)).collect()
}
