//! Base64 framing and HTML-safe JSON.
//!
//! Every protocol header carries `base64(utf8(json(value)))` using the
//! **standard** alphabet. Decoding also accepts unpadded input since some
//! SDKs strip padding.

use std::fmt::{self, Display, Formatter};

use base64::Engine;
use base64::engine::general_purpose::{STANDARD as B64, STANDARD_NO_PAD as B64_NO_PAD};

/// A wrapper for base64-encoded byte data.
///
/// Holds the *encoded* form; [`Base64Bytes::decode`] yields the raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64Bytes(pub Vec<u8>);

impl Base64Bytes {
    /// Decodes the base64 string bytes to raw binary data.
    ///
    /// Padded input is tried first; unpadded input is accepted as a
    /// fallback.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not valid base64 in either form.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        let trimmed = trim_ascii(&self.0);
        B64.decode(trimmed).or_else(|_| B64_NO_PAD.decode(trimmed))
    }

    /// Encodes raw binary data into padded base64 string bytes.
    pub fn encode<T: AsRef<[u8]>>(input: T) -> Self {
        Self(B64.encode(input.as_ref()).into_bytes())
    }
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}

impl AsRef<[u8]> for Base64Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for Base64Bytes {
    fn from(slice: &[u8]) -> Self {
        Self(slice.to_vec())
    }
}

impl From<&str> for Base64Bytes {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl Display for Base64Bytes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// Serializes a value to JSON safe for embedding in HTML contexts.
///
/// The characters `<`, `>`, and `&` are emitted as `<`, `>`,
/// and `&` so that a 402 body rendered into a paywall page cannot
/// break out of a `<script>` block. All other characters, including
/// non-ASCII, pass through unchanged. The output is still plain JSON:
/// decoding needs nothing special.
///
/// # Errors
///
/// Returns an error if the value fails JSON serialization.
pub fn htmlsafe_json<T: serde::Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let plain = serde_json::to_string(value)?;
    // In serialized JSON the characters `<>&` only ever appear inside
    // string literals, where a \uXXXX escape is always valid.
    let mut out = String::with_capacity(plain.len());
    for ch in plain.chars() {
        match ch {
            '<' => out.push_str("\\u003C"),
            '>' => out.push_str("\\u003E"),
            '&' => out.push_str("\\u0026"),
            _ => out.push(ch),
        }
    }
    Ok(out)
}
