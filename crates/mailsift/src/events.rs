//! Consumer-facing events and the terminal body content.

use crate::error::Warning;
use crate::gate::Attachment;
use crate::headers::HeaderMap;

/// Events pushed to the consumer while the parse runs.
///
/// Headers arrive once, as soon as the root part's header block is seen.
/// Attachments arrive in document order, each requiring exactly one
/// [`Attachment::release`]. Warnings report recoverable content problems.
/// The terminal [`BodyContent`] is returned by
/// [`MailParser::run`](crate::MailParser::run) after end of input.
#[derive(Debug)]
pub enum MailEvent {
    /// The root part's normalized header map.
    Headers(HeaderMap),
    /// An attachment, published before its body has been consumed.
    Attachment(Attachment),
    /// A recoverable content problem; the parse continues.
    Warning(Warning),
}

/// The synthesized message body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BodyContent {
    /// Plain-text body, fragments joined by `\n`.
    pub text: Option<String>,
    /// HTML body, fragments joined by `<br/>\n`.
    pub html: Option<String>,
    /// Each text fragment rendered to HTML and joined by `<br/>\n`.
    pub text_as_html: Option<String>,
}
