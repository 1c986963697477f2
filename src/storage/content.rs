//! Content addressing: hashing and deterministic filenames.
//!
//! Every stored file is named from a business key (report date, product
//! identifier) plus the hash of its bytes, so re-fetching unchanged content
//! reproduces the same name and changed content produces a new one.

use sha2::{Digest, Sha256};

/// Separator between the parts of a derived filename.
pub const FILENAME_SEPARATOR: &str = "_";

/// Qualifier segment for images embedded in HTML files.
pub const IMAGES_QUALIFIER: &str = "images";

/// Directory holding metadata records.
pub const DOCUMENTS_DIR: &str = "documents";

/// Directory holding fetched files and images.
pub const FILES_DIR: &str = "files";

/// Compute the SHA-256 hash of content as lowercase hex.
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Serialize a JSON value compactly with object keys in sorted order.
///
/// `serde_json::Map` is a `BTreeMap` unless `preserve_order` is enabled, so
/// plain serialization already yields sorted keys.
pub fn canonical_json(value: &serde_json::Value) -> Vec<u8> {
    // Serializing a Value into a Vec cannot fail.
    serde_json::to_vec(value).unwrap_or_default()
}

/// Derive a filename from a directory, key parts, a content hash and an
/// optional extension (without the leading dot).
///
/// `derive_filename("files", &["20160501", "R1234"], "ab12", Some("pdf"))`
/// yields `files/20160501_R1234_ab12.pdf`.
pub fn derive_filename(dir: &str, parts: &[&str], hash: &str, extension: Option<&str>) -> String {
    let mut name = String::with_capacity(dir.len() + hash.len() + 32);
    name.push_str(dir);
    name.push('/');
    for part in parts {
        name.push_str(part);
        name.push_str(FILENAME_SEPARATOR);
    }
    name.push_str(hash);
    if let Some(ext) = extension {
        name.push('.');
        name.push_str(ext);
    }
    name
}

/// Keep only ASCII letters and digits.
pub fn sanitize_alnum(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// Keep only the first eight digits of a date string (`YYYYMMDD`).
pub fn sanitize_date(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).take(8).collect()
}
