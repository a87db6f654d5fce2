use std::sync::Arc;

use ocrbench_config::Settings;
use ocrbench_core::Comparator;
use ocrbench_sheets::SheetService;

use crate::upload::UploadLimits;

/// Shared application state for API handlers.
pub struct AppState {
    pub comparator: Arc<Comparator>,
    /// The sheet service, or why it could not be set up at startup.
    pub sheets: Result<Arc<SheetService>, String>,
    pub environment: String,
    pub limits: UploadLimits,
}

impl AppState {
    pub fn new(
        comparator: Arc<Comparator>,
        sheets: Result<Arc<SheetService>, String>,
        settings: &Settings,
    ) -> Self {
        Self {
            comparator,
            sheets,
            environment: settings.environment.clone(),
            limits: UploadLimits {
                max_file_size: settings.max_file_size,
                max_file_size_label: settings.max_file_size_label(),
            },
        }
    }
}
