pub mod compare;
pub mod error;
pub mod traits;
pub mod types;

pub use compare::{build_report, recommend, similarity_score, Comparator, SIMILARITY_THRESHOLD};
pub use error::OcrBenchError;
pub use traits::OcrProvider;
pub use types::{
    elapsed_ms, ComparisonReport, ComparisonResponse, ExtractionResult, ProviderKind,
    Recommendation, SheetInfo,
};
