//! MIME content disposition handling.

use crate::content_type::parse_parameters;
use crate::error::{Error, Result};
use std::collections::HashMap;

/// MIME content disposition with parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    /// Disposition kind in lowercase (e.g., "inline", "attachment").
    pub kind: String,
    /// Parameters (e.g., filename).
    pub parameters: HashMap<String, String>,
}

impl ContentDisposition {
    /// Parses a content disposition string.
    ///
    /// Format: `kind; filename="name.ext"`. Filenames use the same parameter
    /// machinery as content types: quoting, RFC 2231 continuations/extended
    /// values, and RFC 2047 encoded words.
    ///
    /// # Errors
    ///
    /// Returns an error if the disposition kind is empty.
    pub fn parse(s: &str) -> Result<Self> {
        let (kind, rest) = match s.split_once(';') {
            Some((k, r)) => (k, Some(r)),
            None => (s, None),
        };

        let kind = kind.trim().to_lowercase();
        if kind.is_empty() {
            return Err(Error::InvalidDisposition("empty disposition".to_string()));
        }

        let parameters = rest.map(parse_parameters).unwrap_or_default();
        Ok(Self { kind, parameters })
    }

    /// Returns the filename parameter if present.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.parameters.get("filename").map(String::as_str)
    }
}
