use thiserror::Error;

use ocrbench_infra::AuthError;

/// Why a provider call failed. Rendered into `ExtractionResult::error`.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("API Error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("No text detected")]
    NoText,

    #[error("Vision API error {code}: {message}")]
    Provider { code: i32, message: String },

    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),
}

/// Startup-time failures building a provider client.
#[derive(Debug, Error)]
pub enum ProviderInitError {
    #[error("missing required setting {0}")]
    MissingCredential(&'static str),

    #[error(transparent)]
    Auth(#[from] AuthError),
}
