//! Log Redaction
//!
//! Scrubs API keys, bearer tokens and OCR secrets from strings. Provider
//! error text passes through here before it reaches a response body.

use once_cell::sync::Lazy;
use regex::Regex;

static BEARER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Bearer\s+[a-zA-Z0-9\-\._~+/]+=*").unwrap());
static QUERY_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([?&](?:key|access_token)=)[^&\s)]+").unwrap());
static OCR_SECRET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(x-ocr-secret[\s:=]+)\S+").unwrap());
static PRIVATE_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"-----BEGIN [A-Z ]*PRIVATE KEY-----[\s\S]*?-----END [A-Z ]*PRIVATE KEY-----")
        .unwrap()
});

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let mut redacted = PRIVATE_KEY_RE
        .replace_all(input, "[REDACTED_PRIVATE_KEY]")
        .to_string();
    redacted = BEARER_RE.replace_all(&redacted, "[REDACTED_TOKEN]").to_string();
    redacted = QUERY_KEY_RE
        .replace_all(&redacted, "${1}[REDACTED]")
        .to_string();
    redacted = OCR_SECRET_RE
        .replace_all(&redacted, "${1}[REDACTED]")
        .to_string();
    redacted
}
