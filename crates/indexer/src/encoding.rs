// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Encoding detection and normalization.
//!
//! Detection is a pure function over the raw bytes: BOM sniffing first,
//! then UTF-8 validation, then a windows-1252 fallback that cannot fail.
//! Invalid sequences are replaced with U+FFFD, so detect → normalize →
//! detect is idempotent on any input that decoded cleanly.

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};

/// Detect the encoding label for a byte stream.
pub fn detect_encoding(bytes: &[u8]) -> &'static str {
    if let Some((encoding, _bom_len)) = Encoding::for_bom(bytes) {
        return encoding.name();
    }
    if std::str::from_utf8(bytes).is_ok() {
        return UTF_8.name();
    }
    WINDOWS_1252.name()
}

/// Decode bytes to a normalized Unicode string plus the detected label.
///
/// Replacement characters stand in for undecodable sequences; the result
/// is always valid UTF-8.
pub fn decode_bytes(bytes: &[u8]) -> (String, &'static str) {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _, _) = encoding.decode(&bytes[bom_len..]);
        return (text.into_owned(), encoding.name());
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), UTF_8.name()),
        Err(_) => {
            let (text, _, _) = WINDOWS_1252.decode(bytes);
            (text.into_owned(), WINDOWS_1252.name())
        }
    }
}

#[cfg(test)]
#[path = "encoding_tests.rs"]
mod tests;
