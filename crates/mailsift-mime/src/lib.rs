//! # mailsift-mime
//!
//! MIME primitives for streaming email parsing.
//!
//! This crate provides the building blocks the `mailsift` parser composes into
//! per-part decode pipelines:
//!
//! - **Content types**: `Content-Type` parsing with quoted and RFC 2231 parameters
//! - **Dispositions**: `Content-Disposition` parsing with extended filenames
//! - **Transfer encodings**: incremental Base64 and Quoted-Printable decoders
//! - **Encoded words**: RFC 2047 header decoding (B and Q)
//! - **Charsets**: incremental transcoding to UTF-8 via `encoding_rs`
//! - **Flowed text**: `format=flowed` soft-wrap reassembly (RFC 3676)
//! - **Addresses**: RFC 5322 address-list parsing with HTML/text projections
//! - **Dates**: lenient RFC 2822 date parsing
//!
//! All decoders are incremental: they accept input chunk by chunk, carry only a
//! bounded amount of state across chunks, and produce whatever output is
//! unambiguously decodable so far.
//!
//! ## Quick Start
//!
//! ```
//! use mailsift_mime::{ContentType, QuotedPrintableDecoder};
//!
//! let ct = ContentType::parse("text/plain; charset=iso-8859-1; format=flowed")?;
//! assert_eq!(ct.charset(), Some("iso-8859-1"));
//! assert!(ct.is_flowed());
//!
//! let mut decoder = QuotedPrintableDecoder::new();
//! let mut out = decoder.push(b"H=C3=A9llo");
//! out.extend(decoder.finish());
//! assert_eq!(out, "Héllo".as_bytes());
//! # Ok::<(), mailsift_mime::Error>(())
//! ```

#![forbid(unsafe_code)]

mod address;
mod charset;
mod content_type;
mod date;
mod disposition;
mod encoding;
mod error;
mod flowed;
mod textutil;

pub use address::{Address, addresses_to_html, addresses_to_text, parse_address_list};
pub use charset::{CharsetDecoder, decode_buffer, encode_buffer, is_unicode_compatible};
pub use content_type::{ContentType, parse_parameters};
pub use date::parse_date;
pub use disposition::ContentDisposition;
pub use encoding::{Base64Decoder, QuotedPrintableDecoder, TransferEncoding, decode_words};
pub use error::{Error, Result};
pub use flowed::FlowedDecoder;
pub use textutil::{escape_html, text_to_html};
