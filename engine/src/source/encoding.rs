//! Byte decoding in front of the reader.
//!
//! The reader consumes UTF-8; other encodings are detected with `chardet`
//! and transcoded with `encoding_rs` before the bytes reach it.

use std::borrow::Cow;

use encoding_rs::Encoding;

/// Detect the encoding of raw bytes, normalised to an `encoding_rs` label.
pub fn detect_encoding(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return "utf-8".to_string();
    }
    if bytes.starts_with(&[0xFF, 0xFE]) {
        return "utf-16le".to_string();
    }
    if bytes.starts_with(&[0xFE, 0xFF]) {
        return "utf-16be".to_string();
    }
    let (charset, _confidence, _language) = chardet::detect(bytes);
    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes with the named encoding.
///
/// Unknown labels fall back to lossy UTF-8. A byte order mark is removed.
pub fn decode_content<'a>(bytes: &'a [u8], encoding: &str) -> Cow<'a, str> {
    let label = encoding.trim().to_lowercase();
    if matches!(label.as_str(), "utf-8" | "utf8" | "ascii") {
        let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
        return String::from_utf8_lossy(bytes);
    }
    match Encoding::for_label(label.as_bytes()) {
        Some(encoding) => encoding.decode_with_bom_removal(bytes).0,
        None => {
            tracing::debug!(encoding = %label, "unknown encoding label, decoding as UTF-8");
            String::from_utf8_lossy(bytes)
        }
    }
}

/// Detect and decode in one step; returns the text and the encoding used.
pub fn decode_auto(bytes: &[u8]) -> (Cow<'_, str>, String) {
    let encoding = detect_encoding(bytes);
    (decode_content(bytes, &encoding), encoding)
}
