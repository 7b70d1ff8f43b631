//! Charset normalization and transcoding to UTF-8.

use encoding_rs::{CoderResult, Encoding, UTF_8};

/// Checks whether a charset label needs no transcoding stage.
///
/// ASCII and UTF-8 content is already valid UTF-8 input (up to replacement of
/// invalid sequences at capture time).
#[must_use]
pub fn is_unicode_compatible(charset: &str) -> bool {
    let normalized: String = charset
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_lowercase();
    matches!(normalized.as_str(), "" | "ascii" | "usascii" | "utf8")
}

/// Incremental charset decoder producing UTF-8.
///
/// Unmappable and malformed sequences are substituted with U+FFFD rather than
/// reported as errors. Unknown labels fall back to UTF-8.
pub struct CharsetDecoder {
    decoder: encoding_rs::Decoder,
}

impl CharsetDecoder {
    /// Creates a decoder for the given charset label.
    #[must_use]
    pub fn for_label(charset: &str) -> Self {
        let encoding = Encoding::for_label(charset.trim().as_bytes()).unwrap_or(UTF_8);
        Self {
            decoder: encoding.new_decoder(),
        }
    }

    /// Decodes a chunk of input. Pass `last = true` exactly once, with the
    /// final chunk (which may be empty), to flush any pending state.
    pub fn decode(&mut self, input: &[u8], last: bool) -> String {
        let capacity = self
            .decoder
            .max_utf8_buffer_length(input.len())
            .unwrap_or(input.len() * 3 + 16);
        let mut out = String::with_capacity(capacity);
        let mut read_total = 0;
        loop {
            let (result, read, _) = self
                .decoder
                .decode_to_string(&input[read_total..], &mut out, last);
            read_total += read;
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => {
                    let extra = self
                        .decoder
                        .max_utf8_buffer_length(input.len() - read_total)
                        .unwrap_or(1024);
                    out.reserve(extra.max(16));
                }
            }
        }
        out
    }
}

impl std::fmt::Debug for CharsetDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CharsetDecoder")
            .field("encoding", &self.decoder.encoding().name())
            .finish()
    }
}

/// Decodes a complete byte buffer from the given charset to UTF-8.
///
/// Unknown labels fall back to UTF-8 with lossy replacement.
#[must_use]
pub fn decode_buffer(charset: &str, bytes: &[u8]) -> String {
    let encoding = Encoding::for_label(charset.trim().as_bytes()).unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

/// Encodes UTF-8 text into the canonical byte form of the given charset.
///
/// Returns `None` for unknown labels. Unmappable code points are substituted
/// with numeric character references by `encoding_rs`.
#[must_use]
pub fn encode_buffer(charset: &str, text: &str) -> Option<Vec<u8>> {
    let encoding = Encoding::for_label(charset.trim().as_bytes())?;
    let (bytes, _, _) = encoding.encode(text);
    Some(bytes.into_owned())
}
