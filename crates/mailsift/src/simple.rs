//! Whole-message convenience mode.
//!
//! Buffers every attachment in memory and returns one aggregate result.
//! This is a thin wrapper over the streaming core; use [`crate::MailParser`]
//! directly for large or adversarial input.

use crate::error::{Error, Result, Warning};
use crate::events::{BodyContent, MailEvent};
use crate::headers::{AddressHeader, HeaderMap, HeaderValue, Priority};
use crate::options::ParseOptions;
use crate::parser::MailParser;
use crate::render;
use chrono::{DateTime, FixedOffset};

/// An attachment with its decoded content buffered in memory.
#[derive(Debug, Clone)]
pub struct BufferedAttachment {
    /// Content type (re-guessed from the filename for
    /// `application/octet-stream`).
    pub content_type: String,
    /// Filename, when declared.
    pub filename: Option<String>,
    /// Raw `Content-ID` value, when present.
    pub content_id: Option<String>,
    /// `Content-ID` without the angle brackets.
    pub cid: Option<String>,
    /// True when an ancestor container is `multipart/related`.
    pub related: bool,
    /// Declared disposition kind, when present.
    pub content_disposition: Option<String>,
    /// Dotted positional identifier.
    pub part_path: String,
    /// Normalized part headers.
    pub headers: HeaderMap,
    /// Decoded content.
    pub content: Vec<u8>,
    /// Hex digest of the decoded content.
    pub checksum: Option<String>,
    /// Decoded size in bytes.
    pub size: u64,
}

/// A fully parsed message.
#[derive(Debug, Clone)]
pub struct ParsedMail {
    /// Normalized root headers.
    pub headers: HeaderMap,
    /// Synthesized body.
    pub body: BodyContent,
    /// Attachments in document order.
    pub attachments: Vec<BufferedAttachment>,
    /// Recoverable problems reported during the parse.
    pub warnings: Vec<Warning>,
}

impl ParsedMail {
    /// Decoded `Subject` header.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.headers.get("subject").and_then(HeaderValue::as_text)
    }

    /// Parsed `From` header.
    #[must_use]
    pub fn from(&self) -> Option<&AddressHeader> {
        self.headers.get("from").and_then(HeaderValue::as_addresses)
    }

    /// Parsed `To` header.
    #[must_use]
    pub fn to(&self) -> Option<&AddressHeader> {
        self.headers.get("to").and_then(HeaderValue::as_addresses)
    }

    /// Parsed `Cc` header.
    #[must_use]
    pub fn cc(&self) -> Option<&AddressHeader> {
        self.headers.get("cc").and_then(HeaderValue::as_addresses)
    }

    /// Parsed `Bcc` header.
    #[must_use]
    pub fn bcc(&self) -> Option<&AddressHeader> {
        self.headers.get("bcc").and_then(HeaderValue::as_addresses)
    }

    /// Parsed `Date` header.
    #[must_use]
    pub fn date(&self) -> Option<&DateTime<FixedOffset>> {
        self.headers.get("date").and_then(HeaderValue::as_date)
    }

    /// Bracket-normalized `Message-ID`.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.headers.get("message-id").and_then(HeaderValue::as_text)
    }

    /// Bracket-normalized `In-Reply-To`.
    #[must_use]
    pub fn in_reply_to(&self) -> Option<&str> {
        self.headers
            .get("in-reply-to")
            .and_then(HeaderValue::as_text)
    }

    /// Bracket-normalized `References` list.
    #[must_use]
    pub fn references(&self) -> Option<&[String]> {
        match self.headers.get("references") {
            Some(HeaderValue::MessageIds(ids)) => Some(ids.as_slice()),
            _ => None,
        }
    }

    /// Message priority; `Normal` when not declared.
    #[must_use]
    pub fn priority(&self) -> Priority {
        match self.headers.get("priority") {
            Some(HeaderValue::Priority(priority)) => *priority,
            _ => Priority::Normal,
        }
    }
}

/// Parses a complete message held in memory.
///
/// # Errors
///
/// Returns [`Error::EmptyInput`] immediately when `input` is empty, before
/// any streaming begins, and propagates fatal parser errors.
///
/// # Example
///
/// ```
/// # tokio_test::block_on(async {
/// let raw = b"Subject: Hi\r\nContent-Type: text/plain\r\n\r\nHello!";
/// let mail = mailsift::parse_message(raw, mailsift::ParseOptions::new()).await?;
/// assert_eq!(mail.subject(), Some("Hi"));
/// assert_eq!(mail.body.text.as_deref(), Some("Hello!"));
/// # Ok::<(), mailsift::Error>(())
/// # });
/// ```
pub async fn parse_message(input: &[u8], options: ParseOptions) -> Result<ParsedMail> {
    if input.is_empty() {
        return Err(Error::EmptyInput);
    }
    let keep_cid_links = options.keep_cid_links;

    let (parser, mut events) = MailParser::new(options);

    let consumer = async move {
        let mut headers = HeaderMap::new();
        let mut attachments = Vec::new();
        let mut warnings = Vec::new();
        while let Some(event) = events.recv().await {
            match event {
                MailEvent::Headers(map) => headers = map,
                MailEvent::Attachment(mut attachment) => {
                    let content = attachment.content.to_vec().await;
                    attachments.push(BufferedAttachment {
                        content_type: attachment.content_type.clone(),
                        filename: attachment.filename.clone(),
                        content_id: attachment.content_id.clone(),
                        cid: attachment.cid.clone(),
                        related: attachment.related,
                        content_disposition: attachment.content_disposition.clone(),
                        part_path: attachment.part_path.clone(),
                        headers: attachment.headers.clone(),
                        checksum: attachment.content.checksum().map(str::to_string),
                        size: attachment.content.size(),
                        content,
                    });
                    attachment.release();
                }
                MailEvent::Warning(warning) => warnings.push(warning),
            }
        }
        (headers, attachments, warnings)
    };

    let (body, (headers, attachments, warnings)) = tokio::join!(parser.run(input), consumer);
    let mut body = body?;

    if !keep_cid_links {
        if let Some(html) = body.html.take() {
            body.html = Some(render::rewrite_cid_links(&html, |cid| {
                attachments
                    .iter()
                    .find(|a| {
                        a.cid.as_deref() == Some(cid) && a.content_type.starts_with("image/")
                    })
                    .map(|a| render::data_uri(&a.content_type, &a.content))
            }));
        }
    }

    Ok(ParsedMail {
        headers,
        body,
        attachments,
        warnings,
    })
}
