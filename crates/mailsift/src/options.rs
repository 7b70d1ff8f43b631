//! Parser configuration.

use chrono::{DateTime, FixedOffset};
use std::sync::Arc;

/// Default ceiling on HTML body size before the HTML→text projection is
/// replaced with a placeholder. Bounds worst-case conversion cost on
/// adversarial input.
pub const DEFAULT_MAX_HTML_LENGTH: usize = 512 * 1024;

/// Digest algorithm applied to decoded attachment bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumAlgorithm {
    /// MD5 (the traditional mail-tooling default).
    #[default]
    Md5,
    /// SHA-256.
    Sha256,
    /// SHA-512.
    Sha512,
}

/// Callback used to render dates in synthetic header blocks.
pub type FormatDateFn = Arc<dyn Fn(&DateTime<FixedOffset>) -> String + Send + Sync>;

/// Parser configuration.
///
/// # Example
///
/// ```
/// use mailsift::ParseOptions;
///
/// let options = ParseOptions::new()
///     .skip_text_links(true)
///     .max_html_length_to_parse(64 * 1024);
/// assert_eq!(options.max_html_length_to_parse, 64 * 1024);
/// ```
#[derive(Clone)]
pub struct ParseOptions {
    /// Suppress the HTML→text cross-render.
    pub skip_html_to_text: bool,
    /// Suppress the text→HTML cross-render.
    pub skip_text_to_html: bool,
    /// Disable link detection in text→HTML synthesis.
    pub skip_text_links: bool,
    /// Do not rewrite `cid:` URLs to `data:` URIs in whole-message mode.
    pub keep_cid_links: bool,
    /// Byte ceiling before HTML→text is skipped with a placeholder.
    pub max_html_length_to_parse: usize,
    /// Digest algorithm applied to attachment content.
    pub checksum_algorithm: ChecksumAlgorithm,
    /// Custom date renderer for synthetic header blocks. Defaults to the
    /// RFC 2822 UTC rendering.
    pub format_date_string: Option<FormatDateFn>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            skip_html_to_text: false,
            skip_text_to_html: false,
            skip_text_links: false,
            keep_cid_links: false,
            max_html_length_to_parse: DEFAULT_MAX_HTML_LENGTH,
            checksum_algorithm: ChecksumAlgorithm::default(),
            format_date_string: None,
        }
    }
}

impl ParseOptions {
    /// Creates options with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Suppresses the HTML→text cross-render.
    #[must_use]
    pub const fn skip_html_to_text(mut self, skip: bool) -> Self {
        self.skip_html_to_text = skip;
        self
    }

    /// Suppresses the text→HTML cross-render.
    #[must_use]
    pub const fn skip_text_to_html(mut self, skip: bool) -> Self {
        self.skip_text_to_html = skip;
        self
    }

    /// Disables link detection in text→HTML synthesis.
    #[must_use]
    pub const fn skip_text_links(mut self, skip: bool) -> Self {
        self.skip_text_links = skip;
        self
    }

    /// Keeps `cid:` URLs untouched in whole-message mode.
    #[must_use]
    pub const fn keep_cid_links(mut self, keep: bool) -> Self {
        self.keep_cid_links = keep;
        self
    }

    /// Sets the HTML size ceiling for the text projection.
    #[must_use]
    pub const fn max_html_length_to_parse(mut self, max: usize) -> Self {
        self.max_html_length_to_parse = max;
        self
    }

    /// Sets the attachment digest algorithm.
    #[must_use]
    pub const fn checksum_algorithm(mut self, algorithm: ChecksumAlgorithm) -> Self {
        self.checksum_algorithm = algorithm;
        self
    }

    /// Sets a custom date renderer for synthetic header blocks.
    #[must_use]
    pub fn format_date_string(
        mut self,
        f: impl Fn(&DateTime<FixedOffset>) -> String + Send + Sync + 'static,
    ) -> Self {
        self.format_date_string = Some(Arc::new(f));
        self
    }
}

impl std::fmt::Debug for ParseOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseOptions")
            .field("skip_html_to_text", &self.skip_html_to_text)
            .field("skip_text_to_html", &self.skip_text_to_html)
            .field("skip_text_links", &self.skip_text_links)
            .field("keep_cid_links", &self.keep_cid_links)
            .field("max_html_length_to_parse", &self.max_html_length_to_parse)
            .field("checksum_algorithm", &self.checksum_algorithm)
            .field("format_date_string", &self.format_date_string.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults() {
        let options = ParseOptions::default();
        assert!(!options.skip_html_to_text);
        assert!(!options.keep_cid_links);
        assert_eq!(options.max_html_length_to_parse, DEFAULT_MAX_HTML_LENGTH);
        assert_eq!(options.checksum_algorithm, ChecksumAlgorithm::Md5);
    }

    #[test]
    fn test_options_builder() {
        let options = ParseOptions::new()
            .skip_html_to_text(true)
            .checksum_algorithm(ChecksumAlgorithm::Sha256)
            .format_date_string(|date| date.to_rfc3339());
        assert!(options.skip_html_to_text);
        assert_eq!(options.checksum_algorithm, ChecksumAlgorithm::Sha256);
        assert!(options.format_date_string.is_some());
    }
}
