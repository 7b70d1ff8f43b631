//! The token consumer / tree builder: the cooperative read loop.
//!
//! Drives the splitter, places each part into the tree, composes decode
//! pipelines, publishes attachments through the gate, and hands the finished
//! tree to the reconciler once the input ends.

use crate::error::{Error, Result};
use crate::events::{BodyContent, MailEvent};
use crate::gate::{
    Attachment, AttachmentGate, CONTENT_CHANNEL_CAPACITY, ContentStream, Frame, Hasher,
};
use crate::headers::HeaderMap;
use crate::options::ParseOptions;
use crate::pipeline::{DecodePipeline, PipelineSpec};
use crate::reconcile;
use crate::splitter::MessageSplitter;
use crate::token::{NodeId, PartEnvelope, Token};
use crate::tree::{Part, PartArena, PartId};
use mailsift_mime::ContentType;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

/// Consumer event buffer depth.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Content types that stay inline rather than becoming attachments.
const INLINE_TYPES: &[&str] = &["text/plain", "text/html", "message/delivery-status"];

/// Streaming MIME message parser.
///
/// Create one with [`MailParser::new`], then drive it with
/// [`run`](Self::run) while receiving [`MailEvent`]s on the returned channel.
/// Exactly one attachment is in flight at any time: the parser does not move
/// past an attachment until its handle is released.
///
/// ```
/// use mailsift::{MailEvent, MailParser, ParseOptions};
///
/// # tokio_test::block_on(async {
/// let raw = b"Content-Type: text/plain\r\n\r\nHello world";
/// let (parser, mut events) = MailParser::new(ParseOptions::new());
/// let consumer = async {
///     while let Some(event) = events.recv().await {
///         if let MailEvent::Attachment(mut attachment) = event {
///             attachment.content.to_vec().await;
///             attachment.release();
///         }
///     }
/// };
/// let (body, ()) = tokio::join!(parser.run(&raw[..]), consumer);
/// assert_eq!(body?.text.as_deref(), Some("Hello world"));
/// # Ok::<(), mailsift::Error>(())
/// # });
/// ```
#[derive(Debug)]
pub struct MailParser {
    options: ParseOptions,
    splitter: MessageSplitter,
    events: mpsc::Sender<MailEvent>,
    arena: PartArena,
    root: Option<PartId>,
    cursor: Option<PartId>,
    current: Option<CurrentLeaf>,
    gate: AttachmentGate,
    saw_text: bool,
    saw_html: bool,
}

#[derive(Debug)]
struct CurrentLeaf {
    part: PartId,
    pipeline: DecodePipeline,
    sink: LeafSink,
}

#[derive(Debug)]
enum LeafSink {
    /// Decoded body buffered for `text_content` capture.
    Inline(Vec<u8>),
    /// Decoded body streamed to the attachment consumer.
    Attachment {
        tx: mpsc::Sender<Frame>,
        hasher: Option<Hasher>,
        size: u64,
        /// Consumer dropped its stream; keep decoding, stop sending.
        dead: bool,
    },
}

impl MailParser {
    /// Creates a parser and the event channel it reports on.
    #[must_use]
    pub fn new(options: ParseOptions) -> (Self, mpsc::Receiver<MailEvent>) {
        let (events, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (
            Self {
                options,
                splitter: MessageSplitter::new(),
                events,
                arena: PartArena::new(),
                root: None,
                cursor: None,
                current: None,
                gate: AttachmentGate::new(),
                saw_text: false,
                saw_html: false,
            },
            rx,
        )
    }

    /// Consumes the input stream to completion and returns the synthesized
    /// body.
    ///
    /// Tokens are processed strictly in arrival order; attachments surface in
    /// document order. The result is produced only after end of input, once
    /// the last open pipeline has drained and every attachment has been
    /// released.
    ///
    /// # Errors
    ///
    /// Fatal errors (I/O, structural guards, consumer gone) terminate the
    /// parse; nothing further is processed or emitted.
    pub async fn run<R>(mut self, mut reader: R) -> Result<BodyContent>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; 8192];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            let tokens = self.splitter.feed(&buf[..n])?;
            for token in tokens {
                self.process(token).await?;
            }
        }

        let tokens = self.splitter.finish()?;
        for token in tokens {
            self.process(token).await?;
        }
        self.close_current_leaf().await;
        if self.gate.is_engaged() {
            self.gate.wait().await;
        }

        Ok(reconcile::reconcile(
            &self.arena,
            self.root,
            &self.options,
            self.saw_text,
            self.saw_html,
            &self.events,
        )
        .await)
    }

    async fn process(&mut self, token: Token) -> Result<()> {
        match token {
            Token::PartStart(envelope) => self.part_start(*envelope).await,
            Token::BodyChunk(bytes) => {
                self.body_chunk(&bytes).await;
                Ok(())
            }
            Token::BoundaryCrossed => {
                self.close_current_leaf().await;
                if self.gate.is_engaged() {
                    self.gate.wait().await;
                }
                Ok(())
            }
        }
    }

    async fn part_start(&mut self, envelope: PartEnvelope) -> Result<()> {
        self.close_current_leaf().await;

        let full_type = envelope.content_type.full_type();
        let is_container = envelope.content_type.is_multipart();
        let is_message = envelope.content_type.is_message();

        // explicit unrecognized dispositions count as attachments
        let declared_disposition = envelope.disposition.clone().map(|kind| {
            if kind == "attachment" || kind == "inline" {
                kind
            } else {
                "attachment".to_string()
            }
        });
        let inline_type = INLINE_TYPES.contains(&full_type.as_str());
        let disposition = declared_disposition.unwrap_or_else(|| {
            if inline_type || is_container || is_message {
                "inline".to_string()
            } else {
                "attachment".to_string()
            }
        });
        let is_attachment =
            !is_container && !is_message && (!inline_type || disposition != "inline");

        let headers = HeaderMap::from_raw(&envelope.headers);
        let parent = self.resolve_parent(envelope.parent);
        let show_meta = parent.is_some_and(|p| self.arena.get(p).is_message);

        let part = Part {
            node: envelope.node,
            parent,
            children: Vec::new(),
            headers: headers.clone(),
            content_type: full_type.clone(),
            disposition: disposition.clone(),
            charset: envelope.charset.clone(),
            encoding: envelope.encoding,
            is_container,
            is_message,
            is_attachment,
            show_meta,
            part_path: envelope.part_path.clone(),
            text_content: None,
        };
        let id = self.arena.alloc(part);
        self.cursor = Some(id);
        if self.root.is_none() {
            self.root = Some(id);
            self.events
                .send(MailEvent::Headers(headers.clone()))
                .await
                .map_err(|_| Error::ConsumerGone)?;
        }

        if is_container || is_message {
            tracing::debug!(part = %envelope.part_path, content_type = %full_type, "container part");
            return Ok(());
        }

        if is_attachment {
            self.publish_attachment(&envelope, id, headers).await?;
            return Ok(());
        }

        // inline leaf
        match full_type.as_str() {
            "text/plain" => self.saw_text = true,
            "text/html" => self.saw_html = true,
            _ => {}
        }
        let inline_text = matches!(full_type.as_str(), "text/plain" | "text/html");
        let spec = PipelineSpec::for_part(&envelope, inline_text);
        self.current = Some(CurrentLeaf {
            part: id,
            pipeline: DecodePipeline::new(&spec),
            sink: LeafSink::Inline(Vec::new()),
        });
        Ok(())
    }

    /// Publishes an attachment handle and engages the gate.
    async fn publish_attachment(
        &mut self,
        envelope: &PartEnvelope,
        id: PartId,
        headers: HeaderMap,
    ) -> Result<()> {
        let mut content_type = envelope.content_type.full_type();
        if content_type == "application/octet-stream" {
            if let Some(guessed) = envelope
                .filename
                .as_deref()
                .and_then(ContentType::guess_from_filename)
            {
                content_type = guessed.to_string();
            }
        }

        let content_id = headers
            .get("content-id")
            .and_then(|v| v.as_text())
            .map(str::to_string);
        let cid = content_id.as_deref().map(|raw| {
            raw.trim()
                .trim_start_matches('<')
                .trim_end_matches('>')
                .trim()
                .to_string()
        });
        let related = self
            .arena
            .ancestors(id)
            .any(|ancestor| self.arena.get(ancestor).content_type == "multipart/related");

        let (tx, rx) = mpsc::channel(CONTENT_CHANNEL_CAPACITY);
        let mut attachment = Attachment {
            content_type,
            filename: envelope.filename.clone(),
            content_id,
            cid,
            related,
            content_disposition: envelope.disposition.clone(),
            part_path: envelope.part_path.clone(),
            headers,
            content: ContentStream::new(rx),
            release: None,
        };
        attachment.release = Some(self.gate.engage());

        tracing::debug!(
            part = %envelope.part_path,
            filename = attachment.filename.as_deref().unwrap_or(""),
            "attachment"
        );
        self.events
            .send(MailEvent::Attachment(attachment))
            .await
            .map_err(|_| Error::ConsumerGone)?;

        let spec = PipelineSpec::for_part(envelope, false);
        self.current = Some(CurrentLeaf {
            part: id,
            pipeline: DecodePipeline::new(&spec),
            sink: LeafSink::Attachment {
                tx,
                hasher: Some(Hasher::new(self.options.checksum_algorithm)),
                size: 0,
                dead: false,
            },
        });
        Ok(())
    }

    /// Routes raw body bytes into the live pipeline. Backpressure from the
    /// attachment content channel suspends token consumption here; this is
    /// ordinary flow control, not the gate.
    async fn body_chunk(&mut self, bytes: &[u8]) {
        let Some(current) = &mut self.current else {
            return;
        };
        let decoded = current.pipeline.write(bytes);
        if decoded.is_empty() {
            return;
        }
        match &mut current.sink {
            LeafSink::Inline(buf) => buf.extend_from_slice(&decoded),
            LeafSink::Attachment {
                tx,
                hasher,
                size,
                dead,
            } => {
                if let Some(hasher) = hasher.as_mut() {
                    hasher.update(&decoded);
                }
                *size += decoded.len() as u64;
                if !*dead && tx.send(Frame::Data(decoded.into())).await.is_err() {
                    *dead = true;
                }
            }
        }
    }

    /// Ends the current leaf: drains its pipeline and captures or closes its
    /// output.
    async fn close_current_leaf(&mut self) {
        let Some(mut current) = self.current.take() else {
            return;
        };
        {
            let part = self.arena.get(current.part);
            tracing::trace!(
                part = %part.part_path,
                content_type = %part.content_type,
                disposition = %part.disposition,
                encoding = %part.encoding,
                charset = part.charset.as_deref().unwrap_or("utf-8"),
                "part body complete"
            );
        }
        let decoded = current.pipeline.finish();
        match current.sink {
            LeafSink::Inline(mut buf) => {
                buf.extend_from_slice(&decoded);
                let text = String::from_utf8_lossy(&buf).replace("\r\n", "\n");
                self.arena.get_mut(current.part).text_content = Some(text);
            }
            LeafSink::Attachment {
                tx,
                mut hasher,
                mut size,
                dead,
            } => {
                if let Some(hasher) = hasher.as_mut() {
                    hasher.update(&decoded);
                }
                size += decoded.len() as u64;
                let checksum = hasher.take().map(Hasher::finalize_hex).unwrap_or_default();
                if !dead {
                    if !decoded.is_empty() {
                        let _ = tx.send(Frame::Data(decoded.into())).await;
                    }
                    let _ = tx.send(Frame::Trailer { checksum, size }).await;
                }
            }
        }
    }

    /// Resolves where a new part attaches, given its declared parent.
    ///
    /// In order: no tree yet means this is the root; a cursor without a
    /// parent adopts the new part; a declared parent matching the cursor's
    /// parent makes it a sibling; matching the cursor itself makes it the
    /// first child; otherwise the cursor's ancestor chain is walked. An
    /// unresolvable parent attaches at the cursor, silently.
    fn resolve_parent(&self, declared: Option<NodeId>) -> Option<PartId> {
        let cursor = self.cursor?;

        let Some(cursor_parent) = self.arena.get(cursor).parent else {
            return Some(cursor);
        };
        if declared == Some(self.arena.get(cursor_parent).node) {
            return Some(cursor_parent);
        }
        if declared == Some(self.arena.get(cursor).node) {
            return Some(cursor);
        }
        for ancestor in self.arena.ancestors(cursor) {
            if declared == Some(self.arena.get(ancestor).node) {
                return Some(ancestor);
            }
        }

        // best-effort placement for malformed structure
        tracing::debug!(?declared, "unresolvable parent, attaching at cursor");
        Some(cursor)
    }
}
