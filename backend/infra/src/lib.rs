//! Infrastructure shared by the Google-backed clients.
//!
//! Resolves credentials once at startup and hands out cached OAuth2 access
//! tokens to the Vision and Sheets clients.

pub mod google_auth;

pub use google_auth::{
    google_token_source, load_service_account, AccessTokenSource, AuthError,
    MetadataTokenSource, ServiceAccountKey, ServiceAccountTokenSource, StaticTokenSource,
    CLOUD_PLATFORM_SCOPE, DRIVE_SCOPE, SPREADSHEETS_SCOPE,
};
