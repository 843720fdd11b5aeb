//! Content-type sniffing for uploaded payloads.

/// Reported when the bytes match no known signature.
pub const UNKNOWN_CONTENT_TYPE: &str = "application/octet-stream";

/// Detect the MIME type of `bytes` from their magic numbers.
///
/// Never fails: empty or unrecognised input yields [`UNKNOWN_CONTENT_TYPE`].
pub fn detect_content_type(bytes: &[u8]) -> &'static str {
    infer::get(bytes)
        .map(|kind| kind.mime_type())
        .unwrap_or(UNKNOWN_CONTENT_TYPE)
}
