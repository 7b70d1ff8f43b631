//! # mailsift
//!
//! Streaming MIME email parser with bounded memory use and a strict
//! one-attachment-in-flight backpressure protocol.
//!
//! The parser consumes a raw message byte stream incrementally and produces:
//!
//! - a one-time **headers** event with the root part's normalized header map
//! - **attachment** handles in document order, each carrying a decoded
//!   content stream and a `release()` capability — the parser does not move
//!   past an attachment until its handle is released, so at most one decode
//!   pipeline is live regardless of how many attachments a message has
//! - a terminal **body** with `text`, `html` and `text_as_html` synthesized
//!   from all inline parts (honoring `multipart/alternative` groups and
//!   embedded `message/rfc822` header summaries)
//!
//! Malformed structure degrades gracefully: unresolvable tree placement
//! falls back to the current part, and content-level problems (charset,
//! oversized HTML) substitute placeholders and surface as warnings while the
//! parse continues.
//!
//! ## Streaming
//!
//! ```
//! use mailsift::{MailEvent, MailParser, ParseOptions};
//!
//! # tokio_test::block_on(async {
//! let raw: &[u8] = b"Subject: Hi\r\nContent-Type: text/plain\r\n\r\nHello!";
//! let (parser, mut events) = MailParser::new(ParseOptions::new());
//!
//! let consumer = async {
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             MailEvent::Headers(headers) => {
//!                 assert!(headers.contains("subject"));
//!             }
//!             MailEvent::Attachment(mut attachment) => {
//!                 let content = attachment.content.to_vec().await;
//!                 println!("{}: {} bytes", attachment.content_type, content.len());
//!                 attachment.release();
//!             }
//!             MailEvent::Warning(warning) => eprintln!("{warning}"),
//!         }
//!     }
//! };
//!
//! let (body, ()) = tokio::join!(parser.run(raw), consumer);
//! assert_eq!(body?.text.as_deref(), Some("Hello!"));
//! # Ok::<(), mailsift::Error>(())
//! # });
//! ```
//!
//! ## Whole-message mode
//!
//! [`parse_message`] buffers attachments in memory and returns a single
//! [`ParsedMail`] — convenient for small messages, unsuitable for
//! adversarial ones.

#![forbid(unsafe_code)]

mod error;
mod events;
mod gate;
mod headers;
mod options;
mod parser;
mod pipeline;
mod reconcile;
mod render;
mod simple;
mod splitter;
mod token;
mod tree;

pub use error::{Error, Result, Warning};
pub use events::{BodyContent, MailEvent};
pub use gate::{Attachment, ContentStream};
pub use headers::{AddressHeader, HeaderMap, HeaderValue, ListEntry, Priority};
pub use options::{ChecksumAlgorithm, DEFAULT_MAX_HTML_LENGTH, FormatDateFn, ParseOptions};
pub use parser::MailParser;
pub use simple::{BufferedAttachment, ParsedMail, parse_message};
pub use splitter::MessageSplitter;
pub use token::{NodeId, PartEnvelope, RawHeader, Token};
