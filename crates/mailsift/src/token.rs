//! Structural token vocabulary between the message splitter and the tree
//! builder.
//!
//! The splitter emits a flat, parent-annotated token stream rather than
//! explicit push/pop structural events; the builder reconstructs the tree
//! from the declared parent identities. The root's [`Token::PartStart`]
//! doubles as the headers-only notification: for a message with no body it is
//! the only token emitted.

use bytes::Bytes;
use mailsift_mime::{ContentType, TransferEncoding};

/// Splitter-assigned part identity, referenced by `parent` annotations.
pub type NodeId = u32;

/// One unfolded raw header line.
#[derive(Debug, Clone)]
pub struct RawHeader {
    /// Header name, lower-cased.
    pub name: String,
    /// Raw value with folding resolved; encoded words are left intact.
    pub value: String,
}

/// Header block and classification hints for one part.
#[derive(Debug, Clone)]
pub struct PartEnvelope {
    /// Identity of this part.
    pub node: NodeId,
    /// Declared parent identity, used by the placement algorithm.
    pub parent: Option<NodeId>,
    /// Whether this is the message root.
    pub root: bool,
    /// Unfolded raw header lines in arrival order.
    pub headers: Vec<RawHeader>,
    /// Parsed content type (with defaults applied when the header is absent
    /// or unparseable).
    pub content_type: ContentType,
    /// Raw disposition kind, when present.
    pub disposition: Option<String>,
    /// Transfer encoding of the body.
    pub encoding: TransferEncoding,
    /// Declared charset, when present.
    pub charset: Option<String>,
    /// Filename from the disposition or content-type parameters.
    pub filename: Option<String>,
    /// `format=flowed` was declared.
    pub flowed: bool,
    /// `delsp=yes` was declared.
    pub delsp: bool,
    /// Dotted positional identifier (e.g. `1.2`).
    pub part_path: String,
}

/// A structural token.
#[derive(Debug)]
pub enum Token {
    /// A part's header block is complete. For leaf parts, body chunks follow.
    PartStart(Box<PartEnvelope>),
    /// Raw body bytes belonging to the current leaf part.
    BodyChunk(Bytes),
    /// A multipart boundary was crossed: the previous leaf part's body is
    /// complete.
    BoundaryCrossed,
}
