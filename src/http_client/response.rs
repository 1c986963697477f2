//! Fetched response wrapper.

use std::collections::BTreeMap;

/// A successful response, fully read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedResponse {
    pub bytes: Vec<u8>,
    /// URL after redirects.
    pub final_url: String,
    /// Text encoding declared or implied by the response headers.
    pub encoding: Option<String>,
    /// Response headers with lowercase names.
    pub headers: BTreeMap<String, String>,
}

impl FetchedResponse {
    pub fn new(
        bytes: Vec<u8>,
        final_url: impl Into<String>,
        headers: BTreeMap<String, String>,
    ) -> Self {
        let encoding = headers
            .get("content-type")
            .and_then(|ct| encoding_from_content_type(ct));
        Self {
            bytes,
            final_url: final_url.into(),
            encoding,
            headers,
        }
    }
}

/// Encoding implied by a Content-Type value: its `charset` parameter, or
/// ISO-8859-1 for `text/*` types without one (the HTTP/1.1 default).
pub fn encoding_from_content_type(content_type: &str) -> Option<String> {
    let mut parts = content_type.split(';');
    let mime = parts.next().unwrap_or("").trim().to_ascii_lowercase();

    for param in parts {
        if let Some((key, value)) = param.split_once('=') {
            if key.trim().eq_ignore_ascii_case("charset") {
                let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }

    if mime.starts_with("text/") {
        Some("ISO-8859-1".to_string())
    } else {
        None
    }
}
