//! Delimiter-safe encoding of instance properties.
//!
//! Entries render as `key=value` joined by commas, with both sides
//! percent-encoded byte by byte: ASCII letters, digits, `-`, `_` and `.` stay
//! verbatim, every other UTF-8 byte becomes `%XX` (uppercase hex). The output
//! therefore never contains `,`, `=` or `:` except as structure.

use std::collections::BTreeMap;

const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Encode properties, preserving the iteration order of the input.
///
/// An empty input encodes to the empty string.
pub fn encode_properties<I, K, V>(properties: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut out = String::new();
    for (i, (key, value)) in properties.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        percent_encode(key.as_ref(), &mut out);
        out.push('=');
        percent_encode(value.as_ref(), &mut out);
    }
    out
}

/// Decode properties produced by [`encode_properties`].
///
/// Pieces without an `=` are skipped rather than treated as errors.
pub fn decode_properties(encoded: &str) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::new();
    if encoded.is_empty() {
        return properties;
    }
    for pair in encoded.split(',') {
        if let Some((key, value)) = pair.split_once('=') {
            properties.insert(percent_decode(key), percent_decode(value));
        }
    }
    properties
}

fn percent_encode(text: &str, out: &mut String) {
    for byte in text.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.') {
            out.push(byte as char);
        } else {
            out.push('%');
            out.push(HEX[(byte >> 4) as usize] as char);
            out.push(HEX[(byte & 0x0F) as usize] as char);
        }
    }
}

fn percent_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    match String::from_utf8(out) {
        Ok(decoded) => decoded,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
