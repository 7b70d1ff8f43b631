//! Transfer-encoding decoders and RFC 2047 encoded-word handling.
//!
//! The decoders are incremental: `push` accepts an arbitrary slice of the
//! encoded stream and returns whatever decodes unambiguously, carrying at most
//! a few bytes of state to the next call. `finish` flushes the carry.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use std::fmt;

/// Base64 engine tolerant of missing padding and non-canonical trailing bits,
/// matching the leniency mail software needs for real-world input.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Body transfer encoding.
///
/// Anything that is not base64 or quoted-printable (7bit, 8bit, binary,
/// unknown values) passes bytes through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferEncoding {
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Raw bytes, no decoding.
    #[default]
    Binary,
}

impl TransferEncoding {
    /// Parses a transfer encoding from a header value.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            _ => Self::Binary,
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// Incremental Base64 decoder.
///
/// Ignores whitespace, line breaks and padding; decodes in groups of four
/// alphabet characters and carries the incomplete remainder across calls.
#[derive(Debug, Default)]
pub struct Base64Decoder {
    carry: Vec<u8>,
}

impl Base64Decoder {
    /// Creates a new decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds encoded bytes, returning the bytes decoded so far.
    pub fn push(&mut self, input: &[u8]) -> Vec<u8> {
        for &b in input {
            if b.is_ascii_alphanumeric() || b == b'+' || b == b'/' {
                self.carry.push(b);
            }
        }
        let usable = self.carry.len() - self.carry.len() % 4;
        if usable == 0 {
            return Vec::new();
        }
        let out = LENIENT_BASE64.decode(&self.carry[..usable]).unwrap_or_default();
        self.carry.drain(..usable);
        out
    }

    /// Flushes the carried remainder at end of input.
    pub fn finish(&mut self) -> Vec<u8> {
        let carry = std::mem::take(&mut self.carry);
        if carry.len() < 2 {
            // a single leftover character encodes fewer than 8 bits
            return Vec::new();
        }
        LENIENT_BASE64.decode(&carry).unwrap_or_default()
    }
}

/// Incremental Quoted-Printable decoder (RFC 2045).
///
/// Handles `=XX` escapes and soft line breaks (`=CRLF`, `=LF`). Invalid escape
/// sequences are passed through literally. Carries at most two bytes of an
/// incomplete escape across calls.
#[derive(Debug, Default)]
pub struct QuotedPrintableDecoder {
    carry: Vec<u8>,
}

impl QuotedPrintableDecoder {
    /// Creates a new decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds encoded bytes, returning the bytes decoded so far.
    pub fn push(&mut self, input: &[u8]) -> Vec<u8> {
        let mut buf = std::mem::take(&mut self.carry);
        buf.extend_from_slice(input);

        let mut out = Vec::with_capacity(buf.len());
        let mut i = 0;
        while i < buf.len() {
            let b = buf[i];
            if b != b'=' {
                out.push(b);
                i += 1;
                continue;
            }
            let remaining = buf.len() - i;
            if remaining == 2 && buf[i + 1] == b'\n' {
                i += 2;
                continue;
            }
            if remaining < 3 {
                self.carry = buf[i..].to_vec();
                return out;
            }
            let h1 = buf[i + 1];
            let h2 = buf[i + 2];
            if let (Some(v1), Some(v2)) = (hex_val(h1), hex_val(h2)) {
                out.push((v1 << 4) | v2);
                i += 3;
            } else if h1 == b'\r' && h2 == b'\n' {
                i += 3;
            } else if h1 == b'\n' {
                i += 2;
            } else {
                out.push(b'=');
                i += 1;
            }
        }
        out
    }

    /// Flushes the carried remainder at end of input.
    ///
    /// An incomplete trailing escape is emitted literally.
    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.carry)
    }
}

const fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

/// Decodes RFC 2047 encoded words in a header value.
///
/// Supports B (base64) and Q (quoted-printable with `_` as space) encodings,
/// charset conversion via `encoding_rs`, and joining of adjacent encoded words
/// separated only by whitespace. Malformed words are left as-is.
#[must_use]
pub fn decode_words(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    let mut last_was_word = false;

    while let Some(start) = rest.find("=?") {
        let prefix = &rest[..start];
        let tail = &rest[start..];
        if let Some((decoded, consumed)) = parse_encoded_word(tail) {
            // whitespace between two encoded words is dropped
            if !(last_was_word && prefix.chars().all(char::is_whitespace)) {
                out.push_str(prefix);
            }
            out.push_str(&decoded);
            rest = &tail[consumed..];
            last_was_word = true;
        } else {
            out.push_str(prefix);
            out.push_str("=?");
            rest = &tail[2..];
            last_was_word = false;
        }
    }

    out.push_str(rest);
    out
}

/// Parses a single `=?charset?enc?text?=` token at the start of `s`.
/// Returns the decoded text and the number of bytes consumed.
fn parse_encoded_word(s: &str) -> Option<(String, usize)> {
    let body = &s[2..];
    let q1 = body.find('?')?;
    let charset = &body[..q1];
    let rest1 = &body[q1 + 1..];
    let q2 = rest1.find('?')?;
    let enc = &rest1[..q2];
    let rest2 = &rest1[q2 + 1..];
    let end = rest2.find("?=")?;
    let text = &rest2[..end];

    if charset.is_empty() || text.contains(char::is_whitespace) {
        return None;
    }

    let bytes = match enc {
        "B" | "b" => {
            let mut decoder = Base64Decoder::new();
            let mut bytes = decoder.push(text.as_bytes());
            bytes.extend(decoder.finish());
            bytes
        }
        "Q" | "q" => q_decode(text.as_bytes()),
        _ => return None,
    };

    // RFC 2231 allows a language suffix on the charset
    let charset = charset.split('*').next().unwrap_or(charset);
    let consumed = 2 + q1 + 1 + q2 + 1 + end + 2;
    Some((crate::charset::decode_buffer(charset, &bytes), consumed))
}

/// Q-encoding decode: `_` means space, `=XX` is a hex escape.
fn q_decode(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        match input[i] {
            b'_' => {
                out.push(b' ');
                i += 1;
            }
            b'=' => {
                if let (Some(v1), Some(v2)) = (
                    input.get(i + 1).copied().and_then(hex_val),
                    input.get(i + 2).copied().and_then(hex_val),
                ) {
                    out.push((v1 << 4) | v2);
                    i += 3;
                } else {
                    out.push(b'=');
                    i += 1;
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    out
}
