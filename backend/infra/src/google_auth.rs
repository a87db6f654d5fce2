//! Google OAuth2 access tokens.
//!
//! Three sources, picked once at startup:
//! - a service account key (inline JSON or file), exchanged via a signed JWT
//! - the metadata server on managed runtimes (Cloud Run, GCE)
//! - a fixed token, mostly for tests

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use ocrbench_config::GoogleSettings;

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const METADATA_BASE_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Refresh this long before the reported expiry.
const EXPIRY_SLACK: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid service account credentials: {0}")]
    InvalidCredentials(String),

    #[error("failed to read credentials file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to sign token request: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("token request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("token endpoint returned {status}: {body}")]
    TokenEndpoint { status: u16, body: String },
}

/// Something that can hand out a currently-valid bearer token.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, AuthError>;

    /// Identity the token acts as, used in "share the sheet with ..." hints.
    fn account_email(&self) -> Option<String> {
        None
    }
}

/// The fields of a service account JSON key that the JWT flow needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, AuthError> {
        serde_json::from_str(json).map_err(|e| AuthError::InvalidCredentials(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, AuthError> {
        let json = std::fs::read_to_string(path).map_err(|source| AuthError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    fn token_uri(&self) -> &str {
        self.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }
}

/// Inline JSON wins over the file; a missing file means "no service account".
pub fn load_service_account(
    google: &GoogleSettings,
) -> Result<Option<ServiceAccountKey>, AuthError> {
    if let Some(json) = &google.credentials_json {
        return ServiceAccountKey::from_json(json).map(Some);
    }
    if google.credentials_path.exists() {
        return ServiceAccountKey::from_file(&google.credentials_path).map(Some);
    }
    Ok(None)
}

/// Pick the service account if one is configured, else the metadata server.
pub fn google_token_source(
    google: &GoogleSettings,
    scopes: &[&str],
    client: Client,
) -> Result<Arc<dyn AccessTokenSource>, AuthError> {
    match load_service_account(google)? {
        Some(key) => {
            info!(account = %key.client_email, "Using service account credentials");
            Ok(Arc::new(ServiceAccountTokenSource::new(key, scopes, client)))
        }
        None => {
            info!("No service account configured; using metadata server credentials");
            Ok(Arc::new(MetadataTokenSource::new(scopes, client)))
        }
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    refresh_at: Instant,
}

impl CachedToken {
    fn new(token: String, expires_in: u64) -> Self {
        let lifetime = Duration::from_secs(expires_in).saturating_sub(EXPIRY_SLACK);
        Self {
            token,
            refresh_at: Instant::now() + lifetime,
        }
    }

    fn is_fresh(&self) -> bool {
        Instant::now() < self.refresh_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Exchanges a signed JWT for an access token and caches it until expiry.
pub struct ServiceAccountTokenSource {
    key: ServiceAccountKey,
    scope: String,
    client: Client,
    cache: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenSource {
    pub fn new(key: ServiceAccountKey, scopes: &[&str], client: Client) -> Self {
        Self {
            key,
            scope: scopes.join(" "),
            client,
            cache: Mutex::new(None),
        }
    }

    fn signed_assertion(&self) -> Result<String, AuthError> {
        let now = chrono::Utc::now().timestamp();
        let claims = JwtClaims {
            iss: &self.key.client_email,
            scope: self.scope.clone(),
            aud: self.key.token_uri(),
            iat: now,
            exp: now + 3600,
        };
        let header = Header {
            alg: Algorithm::RS256,
            kid: self.key.private_key_id.clone(),
            ..Default::default()
        };
        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())?;
        Ok(encode(&header, &claims, &key)?)
    }

    async fn fetch(&self) -> Result<CachedToken, AuthError> {
        let assertion = self.signed_assertion()?;
        debug!(account = %self.key.client_email, "Requesting access token");

        let response = self
            .client
            .post(self.key.token_uri())
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenEndpoint {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response.json().await?;
        Ok(CachedToken::new(token.access_token, token.expires_in))
    }
}

#[async_trait]
impl AccessTokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<String, AuthError> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref().filter(|c| c.is_fresh()) {
            return Ok(cached.token.clone());
        }
        let fresh = self.fetch().await?;
        let token = fresh.token.clone();
        *cache = Some(fresh);
        Ok(token)
    }

    fn account_email(&self) -> Option<String> {
        Some(self.key.client_email.clone())
    }
}

/// Tokens for the runtime's default service account.
pub struct MetadataTokenSource {
    base_url: String,
    scopes: String,
    client: Client,
    cache: Mutex<Option<CachedToken>>,
}

impl MetadataTokenSource {
    pub fn new(scopes: &[&str], client: Client) -> Self {
        Self {
            base_url: METADATA_BASE_URL.to_string(),
            scopes: scopes.join(","),
            client,
            cache: Mutex::new(None),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn fetch(&self) -> Result<CachedToken, AuthError> {
        let response = self
            .client
            .get(format!("{}/token", self.base_url))
            .query(&[("scopes", self.scopes.as_str())])
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenEndpoint {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response.json().await?;
        Ok(CachedToken::new(token.access_token, token.expires_in))
    }
}

#[async_trait]
impl AccessTokenSource for MetadataTokenSource {
    async fn access_token(&self) -> Result<String, AuthError> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref().filter(|c| c.is_fresh()) {
            return Ok(cached.token.clone());
        }
        let fresh = self.fetch().await?;
        let token = fresh.token.clone();
        *cache = Some(fresh);
        Ok(token)
    }
}

/// A fixed token.
pub struct StaticTokenSource {
    token: String,
    email: Option<String>,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

#[async_trait]
impl AccessTokenSource for StaticTokenSource {
    async fn access_token(&self) -> Result<String, AuthError> {
        Ok(self.token.clone())
    }

    fn account_email(&self) -> Option<String> {
        self.email.clone()
    }
}
