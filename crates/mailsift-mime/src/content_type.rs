//! MIME content type handling.

use crate::encoding::decode_words;
use crate::error::{Error, Result};
use percent_encoding::percent_decode_str;
use std::collections::HashMap;
use std::fmt;

/// MIME content type with parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Main type (e.g., "text", "image", "multipart").
    pub main_type: String,
    /// Subtype (e.g., "plain", "html", "mixed").
    pub sub_type: String,
    /// Parameters (e.g., charset=utf-8, boundary=xxx).
    pub parameters: HashMap<String, String>,
}

impl ContentType {
    /// Creates a new content type.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into(),
            sub_type: sub_type.into(),
            parameters: HashMap::new(),
        }
    }

    /// Creates a text/plain content type.
    #[must_use]
    pub fn text_plain() -> Self {
        Self::new("text", "plain")
    }

    /// Returns the full `type/subtype` string in lowercase.
    #[must_use]
    pub fn full_type(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }

    /// Returns the charset parameter if present.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.parameters.get("charset").map(String::as_str)
    }

    /// Returns the boundary parameter if present.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameters.get("boundary").map(String::as_str)
    }

    /// Returns the name parameter if present (legacy filename carrier).
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.parameters.get("name").map(String::as_str)
    }

    /// Checks if this is a multipart content type.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("multipart")
    }

    /// Checks if this is an embedded message (`message/rfc822`).
    #[must_use]
    pub fn is_message(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("message") && self.sub_type.eq_ignore_ascii_case("rfc822")
    }

    /// Checks if this is a text content type.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("text")
    }

    /// Checks if the part declared `format=flowed` (RFC 3676).
    #[must_use]
    pub fn is_flowed(&self) -> bool {
        self.parameters
            .get("format")
            .is_some_and(|v| v.eq_ignore_ascii_case("flowed"))
    }

    /// Checks if the part declared `delsp=yes` (RFC 3676).
    #[must_use]
    pub fn is_delsp(&self) -> bool {
        self.parameters
            .get("delsp")
            .is_some_and(|v| v.eq_ignore_ascii_case("yes"))
    }

    /// Parses a content type string.
    ///
    /// Format: `type/subtype; param1=value1; param2="value 2"`. Parameters use
    /// quote-aware splitting, RFC 2231 continuations (`name*0=`, `name*1=`) and
    /// extended syntax (`name*=utf-8''...`), and RFC 2047 encoded words in
    /// parameter values.
    ///
    /// # Errors
    ///
    /// Returns an error if the `type/subtype` production is missing or empty.
    pub fn parse(s: &str) -> Result<Self> {
        let (type_str, rest) = match s.split_once(';') {
            Some((t, r)) => (t, Some(r)),
            None => (s, None),
        };

        let type_str = type_str.trim();
        let (main_type, sub_type) = type_str
            .split_once('/')
            .ok_or_else(|| Error::InvalidContentType(format!("missing subtype in {type_str:?}")))?;

        let main_type = main_type.trim().to_lowercase();
        let sub_type = sub_type.trim().to_lowercase();
        if main_type.is_empty() || sub_type.is_empty() {
            return Err(Error::InvalidContentType(format!("empty type in {type_str:?}")));
        }

        let mut content_type = Self::new(main_type, sub_type);
        if let Some(rest) = rest {
            content_type.parameters = parse_parameters(rest);
        }

        Ok(content_type)
    }

    /// Guesses a content type from a filename extension.
    ///
    /// Used to re-classify `application/octet-stream` attachments that carry a
    /// recognizable filename.
    #[must_use]
    pub fn guess_from_filename(filename: &str) -> Option<&'static str> {
        let ext = filename.rsplit_once('.')?.1.to_lowercase();
        let guessed = match ext.as_str() {
            "txt" | "log" => "text/plain",
            "htm" | "html" => "text/html",
            "css" => "text/css",
            "csv" => "text/csv",
            "ics" => "text/calendar",
            "xml" => "application/xml",
            "json" => "application/json",
            "pdf" => "application/pdf",
            "zip" => "application/zip",
            "gz" => "application/gzip",
            "tar" => "application/x-tar",
            "7z" => "application/x-7z-compressed",
            "doc" => "application/msword",
            "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "xls" => "application/vnd.ms-excel",
            "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "ppt" => "application/vnd.ms-powerpoint",
            "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            "eml" => "message/rfc822",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "bmp" => "image/bmp",
            "webp" => "image/webp",
            "svg" => "image/svg+xml",
            "tif" | "tiff" => "image/tiff",
            "mp3" => "audio/mpeg",
            "wav" => "audio/wav",
            "ogg" => "audio/ogg",
            "mp4" => "video/mp4",
            "avi" => "video/x-msvideo",
            "mov" => "video/quicktime",
            _ => return None,
        };
        Some(guessed)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main_type, self.sub_type)?;

        for (key, value) in &self.parameters {
            if value.contains(|c: char| c.is_whitespace() || "()<>@,;:\\\"/[]?=".contains(c)) {
                write!(f, "; {key}=\"{value}\"")?;
            } else {
                write!(f, "; {key}={value}")?;
            }
        }

        Ok(())
    }
}

/// Parses a MIME header parameter list (everything after the first `;` of a
/// structured header value).
///
/// Handles quoted values, RFC 2231 continuations and extended encoding, and
/// RFC 2047 encoded words in plain values.
#[must_use]
pub fn parse_parameters(rest: &str) -> HashMap<String, String> {
    // raw entries: (base key, continuation index, extended flag, value)
    let mut entries: Vec<(String, u32, bool, String)> = Vec::new();

    for segment in split_quote_aware(rest) {
        let Some((key, value)) = segment.split_once('=') else {
            continue;
        };
        let mut key = key.trim().to_lowercase();
        let value = unquote(value.trim());
        if key.is_empty() {
            continue;
        }

        let mut extended = false;
        if key.ends_with('*') {
            extended = true;
            key.truncate(key.len() - 1);
        }
        // continuation suffix: `key*0`, `key*1`, ...
        let continuation = match key.rfind('*') {
            Some(pos)
                if pos > 0
                    && !key[pos + 1..].is_empty()
                    && key[pos + 1..].chars().all(|c| c.is_ascii_digit()) =>
            {
                Some((pos, key[pos + 1..].parse().unwrap_or(0)))
            }
            _ => None,
        };
        let index = match continuation {
            Some((pos, index)) => {
                key.truncate(pos);
                index
            }
            None => 0,
        };
        entries.push((key, index, extended, value));
    }

    let mut params: HashMap<String, String> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<(u32, bool, String)>> = HashMap::new();
    for (base, index, extended, value) in entries {
        if !grouped.contains_key(&base) {
            order.push(base.clone());
        }
        grouped.entry(base).or_default().push((index, extended, value));
    }

    for base in order {
        let Some(mut chunks) = grouped.remove(&base) else {
            continue;
        };
        chunks.sort_by_key(|(index, _, _)| *index);
        let any_extended = chunks.iter().any(|(_, extended, _)| *extended);

        let value = if any_extended {
            decode_extended_value(&chunks)
        } else {
            let joined: String = chunks.into_iter().map(|(_, _, v)| v).collect();
            if joined.contains("=?") {
                decode_words(&joined)
            } else {
                joined
            }
        };
        params.insert(base, value);
    }

    params
}

/// Decodes an RFC 2231 extended value: `charset'lang'percent-encoded` in the
/// first chunk, percent-encoded (or literal) continuations after it.
fn decode_extended_value(chunks: &[(u32, bool, String)]) -> String {
    let mut charset = String::new();
    let mut bytes = Vec::new();

    for (pos, (_, extended, value)) in chunks.iter().enumerate() {
        let mut value = value.as_str();
        if pos == 0 {
            let mut it = value.splitn(3, '\'');
            if let (Some(cs), Some(_lang), Some(tail)) = (it.next(), it.next(), it.next()) {
                charset = cs.to_string();
                value = tail;
            }
        }
        if *extended {
            bytes.extend(percent_decode_str(value));
        } else {
            bytes.extend_from_slice(value.as_bytes());
        }
    }

    crate::charset::decode_buffer(&charset, &bytes)
}

/// Splits on `;` outside of double quotes.
fn split_quote_aware(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                out.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&s[start..]);
    out.into_iter()
        .map(str::trim)
        .filter(|seg| !seg.is_empty())
        .collect()
}

/// Strips surrounding double quotes and resolves backslash escapes.
fn unquote(s: &str) -> String {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        let inner = &s[1..s.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut escaped = false;
        for c in inner.chars() {
            if escaped {
                out.push(c);
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else {
                out.push(c);
            }
        }
        out
    } else {
        s.to_string()
    }
}
