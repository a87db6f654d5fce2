use thiserror::Error;

/// Errors raised by the core data model.
#[derive(Debug, Error)]
pub enum OcrBenchError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("unrecognized recommendation: {0}")]
    UnknownRecommendation(String),
}
