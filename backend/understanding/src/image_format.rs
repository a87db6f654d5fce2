//! Image format detection from magic bytes.
//!
//! Clova wants the format named in the request; uploads only carry bytes.

/// Clova format name for the image, defaulting to `png`.
pub fn sniff_clova_format(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "jpg"
    } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        "png"
    } else if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
        "tiff"
    } else if bytes.starts_with(b"%PDF") {
        "pdf"
    } else {
        "png"
    }
}
