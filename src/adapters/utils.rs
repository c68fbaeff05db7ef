//! Validation helpers shared by the WiFi and NVS adapters.

/// `true` when every byte is printable ASCII (`0x20..=0x7E`).
///
/// SSIDs and device ids end up in log lines and URLs, so control bytes
/// and non-ASCII text are refused at the boundary.
pub(super) fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

/// `true` when `s` can be placed in a URL query value unescaped.
pub(super) fn is_url_safe(s: &str) -> bool {
    s.bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~'))
}
