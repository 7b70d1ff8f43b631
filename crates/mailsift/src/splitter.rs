//! Incremental message splitter: raw bytes in, structural tokens out.
//!
//! The splitter assembles physical lines from arbitrarily sliced input,
//! unfolds header blocks, tracks the multipart boundary stack, and assigns
//! each part a dotted positional identifier from a counter table keyed by
//! boundary name. `message/rfc822` parts are descended into: their body is
//! parsed as a nested header block whose parts hang under the rfc822 node.
//!
//! The line terminator before a boundary belongs to the boundary, so the most
//! recent body line is held back until the next line shows it was not
//! followed by one.

use crate::error::{Error, Result};
use crate::token::{NodeId, PartEnvelope, RawHeader, Token};
use mailsift_mime::{ContentDisposition, ContentType, TransferEncoding};
use std::collections::HashMap;

/// Maximum physical line length in a header block.
const MAX_HEADER_LINE: usize = 1024 * 1024;

/// Maximum total size of one header block.
const MAX_HEADER_BLOCK: usize = 2 * 1024 * 1024;

/// Maximum multipart nesting depth.
const MAX_NESTING_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Header,
    Body,
}

#[derive(Debug)]
struct BoundaryFrame {
    boundary: String,
    node: NodeId,
    path: String,
    digest: bool,
}

/// The low-level tokenizer.
#[derive(Debug)]
pub struct MessageSplitter {
    state: State,
    /// Partial physical line.
    line_buf: Vec<u8>,
    /// True while draining an overlong body line in pass-through mode.
    long_line: bool,
    /// Unfolded header lines of the part currently being read.
    header_lines: Vec<String>,
    header_size: usize,
    frames: Vec<BoundaryFrame>,
    /// Child ordinals, keyed by boundary name.
    counters: HashMap<String, u32>,
    next_node: NodeId,
    /// Placement info for the part whose headers are being read.
    pending_parent: Option<NodeId>,
    pending_path: String,
    pending_digest: bool,
    /// Body lines currently belong to a leaf part.
    leaf_open: bool,
    /// Most recent body line, terminator included.
    holdback: Option<Vec<u8>>,
    started: bool,
}

impl Default for MessageSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageSplitter {
    /// Creates a splitter for one message.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: State::Header,
            line_buf: Vec::new(),
            long_line: false,
            header_lines: Vec::new(),
            header_size: 0,
            frames: Vec::new(),
            counters: HashMap::new(),
            next_node: 0,
            pending_parent: None,
            pending_path: "1".to_string(),
            pending_digest: false,
            leaf_open: false,
            holdback: None,
            started: false,
        }
    }

    /// Feeds a chunk of raw message bytes.
    ///
    /// # Errors
    ///
    /// Returns a structural error when a header block or line exceeds the
    /// bounded-memory guards, or when multipart nesting goes too deep.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        for &b in chunk {
            self.line_buf.push(b);
            if b == b'\n' {
                let line = std::mem::take(&mut self.line_buf);
                if self.long_line {
                    self.long_line = false;
                    self.body_line(line, false, &mut tokens);
                } else {
                    self.process_line(line, &mut tokens)?;
                }
            } else if self.line_buf.len() > MAX_HEADER_LINE {
                match self.state {
                    State::Header => {
                        return Err(Error::Structure("header line too long".to_string()));
                    }
                    State::Body => {
                        // flush the oversized line in pass-through mode; it
                        // cannot be a boundary
                        let line = std::mem::take(&mut self.line_buf);
                        self.long_line = true;
                        self.body_line(line, false, &mut tokens);
                    }
                }
            }
        }
        Ok(tokens)
    }

    /// Signals end of input, flushing everything still buffered.
    ///
    /// # Errors
    ///
    /// Returns a structural error from the same guards as [`feed`](Self::feed).
    pub fn finish(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        if !self.line_buf.is_empty() {
            let line = std::mem::take(&mut self.line_buf);
            match self.state {
                State::Header => self.header_line(&line, &mut tokens)?,
                State::Body => self.body_line(line, !self.long_line, &mut tokens),
            }
        }

        if self.state == State::Header && (!self.started || !self.header_lines.is_empty()) {
            // headers-only message (or trailing headers-only part)
            self.finalize_headers(&mut tokens)?;
        }

        if let Some(line) = self.holdback.take() {
            if !line.is_empty() {
                tokens.push(Token::BodyChunk(line.into()));
            }
        }
        if self.leaf_open {
            self.leaf_open = false;
            tokens.push(Token::BoundaryCrossed);
        }

        Ok(tokens)
    }

    fn process_line(&mut self, line: Vec<u8>, tokens: &mut Vec<Token>) -> Result<()> {
        match self.state {
            State::Header => self.header_line(&line, tokens),
            State::Body => {
                self.body_line(line, true, tokens);
                Ok(())
            }
        }
    }

    fn header_line(&mut self, line: &[u8], tokens: &mut Vec<Token>) -> Result<()> {
        let text = String::from_utf8_lossy(trim_line_ending(line));

        if text.is_empty() {
            return self.finalize_headers(tokens);
        }

        self.header_size += text.len();
        if self.header_size > MAX_HEADER_BLOCK {
            return Err(Error::Structure("header block too large".to_string()));
        }

        if (text.starts_with(' ') || text.starts_with('\t')) && !self.header_lines.is_empty() {
            if let Some(last) = self.header_lines.last_mut() {
                last.push(' ');
                last.push_str(text.trim());
            }
        } else {
            self.header_lines.push(text.into_owned());
        }
        Ok(())
    }

    /// Ends the current header block: builds the part envelope, emits its
    /// token, and decides what the following bytes mean.
    fn finalize_headers(&mut self, tokens: &mut Vec<Token>) -> Result<()> {
        let lines = std::mem::take(&mut self.header_lines);
        self.header_size = 0;

        let mut headers = Vec::with_capacity(lines.len());
        for line in &lines {
            if let Some((name, value)) = line.split_once(':') {
                headers.push(RawHeader {
                    name: name.trim().to_lowercase(),
                    value: value.trim().to_string(),
                });
            }
        }

        let root = !self.started;
        self.started = true;

        let content_type = headers
            .iter()
            .rev()
            .find(|h| h.name == "content-type")
            .and_then(|h| ContentType::parse(&h.value).ok())
            .unwrap_or_else(|| {
                if self.pending_digest {
                    ContentType::new("message", "rfc822")
                } else {
                    ContentType::text_plain()
                }
            });

        let disposition = headers
            .iter()
            .rev()
            .find(|h| h.name == "content-disposition")
            .and_then(|h| ContentDisposition::parse(&h.value).ok());

        let encoding = headers
            .iter()
            .rev()
            .find(|h| h.name == "content-transfer-encoding")
            .map_or(TransferEncoding::Binary, |h| {
                TransferEncoding::parse(&h.value)
            });

        let filename = disposition
            .as_ref()
            .and_then(ContentDisposition::filename)
            .or_else(|| content_type.name())
            .map(str::to_string);

        let node = self.next_node;
        self.next_node += 1;
        let path = if root {
            "1".to_string()
        } else {
            self.pending_path.clone()
        };

        let envelope = PartEnvelope {
            node,
            parent: self.pending_parent,
            root,
            headers,
            charset: content_type.charset().map(str::to_string),
            disposition: disposition.as_ref().map(|d| d.kind.clone()),
            encoding,
            filename,
            flowed: content_type.is_flowed(),
            delsp: content_type.is_delsp(),
            part_path: path.clone(),
            content_type: content_type.clone(),
        };
        tokens.push(Token::PartStart(Box::new(envelope)));

        if content_type.is_multipart() {
            if let Some(boundary) = content_type.boundary() {
                if self.frames.len() >= MAX_NESTING_DEPTH {
                    return Err(Error::Structure("multipart nesting too deep".to_string()));
                }
                self.frames.push(BoundaryFrame {
                    boundary: boundary.to_string(),
                    node,
                    path,
                    digest: content_type.sub_type.eq_ignore_ascii_case("digest"),
                });
                self.leaf_open = false;
                self.state = State::Body;
                return Ok(());
            }
            // multipart without a boundary degrades to an opaque leaf
            tracing::debug!(part = %path, "multipart part without boundary");
            self.leaf_open = true;
            self.state = State::Body;
            return Ok(());
        }

        if content_type.is_message() {
            // descend into the embedded message
            self.pending_parent = Some(node);
            self.pending_path = path;
            self.pending_digest = false;
            self.leaf_open = false;
            self.state = State::Header;
            return Ok(());
        }

        self.leaf_open = true;
        self.state = State::Body;
        Ok(())
    }

    fn body_line(&mut self, line: Vec<u8>, candidate: bool, tokens: &mut Vec<Token>) {
        if candidate {
            let trimmed = trim_boundary_line(&line);
            if trimmed.len() > 2 && trimmed.starts_with(b"--") {
                let rest = &trimmed[2..];
                for i in (0..self.frames.len()).rev() {
                    let boundary = self.frames[i].boundary.as_bytes();
                    if rest == boundary {
                        self.cross_boundary(i, tokens);
                        return;
                    }
                    if rest.len() == boundary.len() + 2
                        && &rest[..boundary.len()] == boundary
                        && &rest[boundary.len()..] == b"--"
                    {
                        self.close_boundary(i, tokens);
                        return;
                    }
                }
            }
        }

        if self.leaf_open {
            if let Some(previous) = self.holdback.replace(line) {
                if !previous.is_empty() {
                    tokens.push(Token::BodyChunk(previous.into()));
                }
            }
        }
        // container preamble/epilogue lines are discarded
    }

    /// `--boundary`: the previous part is complete, a sibling starts.
    fn cross_boundary(&mut self, frame_index: usize, tokens: &mut Vec<Token>) {
        self.flush_holdback_stripped(tokens);
        tokens.push(Token::BoundaryCrossed);

        self.frames.truncate(frame_index + 1);
        let frame = &self.frames[frame_index];
        let (frame_node, frame_path) = (frame.node, frame.path.clone());
        let boundary = frame.boundary.clone();
        let digest = frame.digest;

        let counter = self.counters.entry(boundary).or_insert(0);
        *counter += 1;
        let count = *counter;
        self.pending_path = format!("{frame_path}.{count}");
        self.pending_parent = Some(frame_node);
        self.pending_digest = digest;
        self.leaf_open = false;
        self.state = State::Header;
    }

    /// `--boundary--`: the container is complete; what follows is epilogue
    /// until an outer boundary shows up.
    fn close_boundary(&mut self, frame_index: usize, tokens: &mut Vec<Token>) {
        self.flush_holdback_stripped(tokens);
        tokens.push(Token::BoundaryCrossed);
        self.frames.truncate(frame_index);
        self.leaf_open = false;
        self.state = State::Body;
    }

    /// Flushes the held-back line with its terminator removed: that CRLF
    /// belongs to the boundary that followed it.
    fn flush_holdback_stripped(&mut self, tokens: &mut Vec<Token>) {
        if let Some(line) = self.holdback.take() {
            let stripped = trim_line_ending(&line);
            if !stripped.is_empty() {
                tokens.push(Token::BodyChunk(stripped.to_vec().into()));
            }
        }
    }
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    if end > 0 && line[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && line[end - 1] == b'\r' {
        end -= 1;
    }
    &line[..end]
}

/// Trims the terminator plus transport padding for boundary comparison.
fn trim_boundary_line(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\n' | b'\r' | b' ' | b'\t') {
        end -= 1;
    }
    &line[..end]
}
