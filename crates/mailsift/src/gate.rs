//! Attachment handles and the one-in-flight gate.
//!
//! When the builder classifies a part as an attachment it publishes an
//! [`Attachment`] handle immediately and engages the gate. The next
//! structural token is not processed until the consumer calls
//! [`Attachment::release`] (or drops the handle, which counts as deliberate
//! abandonment). Holding an unreleased handle stalls the parser; that is the
//! documented contract, and it is what bounds the number of live decode
//! pipelines to one regardless of how many attachments a message has.

use crate::headers::HeaderMap;
use crate::options::ChecksumAlgorithm;
use bytes::Bytes;
use md5::Md5;
use sha2::{Digest, Sha256, Sha512};
use tokio::sync::{mpsc, oneshot};

/// Frames sent from the parser into an attachment's content channel.
#[derive(Debug)]
pub(crate) enum Frame {
    /// Decoded content bytes.
    Data(Bytes),
    /// End of content: digest and decoded size.
    Trailer { checksum: String, size: u64 },
}

/// Number of in-flight content frames before the parser suspends. This is
/// ordinary stream backpressure, independent of the gate.
pub(crate) const CONTENT_CHANNEL_CAPACITY: usize = 16;

/// Readable stream of one attachment's decoded content.
///
/// After the stream is drained, [`checksum`](Self::checksum) and
/// [`size`](Self::size) report the digest and byte count of the decoded
/// content.
#[derive(Debug)]
pub struct ContentStream {
    rx: mpsc::Receiver<Frame>,
    checksum: Option<String>,
    size: u64,
}

impl ContentStream {
    pub(crate) fn new(rx: mpsc::Receiver<Frame>) -> Self {
        Self {
            rx,
            checksum: None,
            size: 0,
        }
    }

    /// Receives the next chunk of decoded content, or `None` once the
    /// attachment's body is complete.
    pub async fn chunk(&mut self) -> Option<Bytes> {
        loop {
            match self.rx.recv().await? {
                Frame::Data(bytes) => return Some(bytes),
                Frame::Trailer { checksum, size } => {
                    self.checksum = Some(checksum);
                    self.size = size;
                }
            }
        }
    }

    /// Drains the stream into a single buffer.
    pub async fn to_vec(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = self.chunk().await {
            out.extend_from_slice(&chunk);
        }
        out
    }

    /// Hex digest of the decoded content, available once drained.
    #[must_use]
    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    /// Decoded size in bytes, available once drained.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }
}

/// An attachment surfaced to the consumer, in document order, as soon as its
/// header block is seen.
#[derive(Debug)]
pub struct Attachment {
    /// Content type (re-guessed from the filename for
    /// `application/octet-stream`).
    pub content_type: String,
    /// Filename from the disposition or content-type parameters.
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
    /// Normalized headers of the part.
    pub headers: HeaderMap,
    /// Decoded content stream.
    pub content: ContentStream,
    pub(crate) release: Option<oneshot::Sender<()>>,
}

impl Attachment {
    /// Releases the attachment, letting the parser continue past it.
    ///
    /// Must be called exactly once per handle, after the content stream has
    /// been drained or deliberately abandoned. A second call is a no-op.
    /// Dropping the handle without calling this also releases it.
    pub fn release(&mut self) {
        if let Some(tx) = self.release.take() {
            let _ = tx.send(());
        }
    }
}

/// The gate itself: an engaged flag plus a single continuation slot (only one
/// attachment is ever in flight).
#[derive(Debug, Default)]
pub(crate) struct AttachmentGate {
    pending: Option<oneshot::Receiver<()>>,
}

impl AttachmentGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engages the gate, returning the release capability to embed in the
    /// published handle.
    pub fn engage(&mut self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.pending = Some(rx);
        tx
    }

    pub const fn is_engaged(&self) -> bool {
        self.pending.is_some()
    }

    /// Waits for the in-flight attachment to be released. Resumes on a later
    /// scheduling turn, never synchronously, so a message with thousands of
    /// contiguous attachments cannot grow the call stack.
    pub async fn wait(&mut self) {
        if let Some(rx) = self.pending.take() {
            // Err means the handle was dropped, which counts as released
            let _ = rx.await;
            tokio::task::yield_now().await;
        }
    }
}

/// Incremental digest over decoded attachment bytes.
pub(crate) enum Hasher {
    Md5(Box<Md5>),
    Sha256(Box<Sha256>),
    Sha512(Box<Sha512>),
}

impl Hasher {
    pub fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Md5 => Self::Md5(Box::new(Md5::new())),
            ChecksumAlgorithm::Sha256 => Self::Sha256(Box::new(Sha256::new())),
            ChecksumAlgorithm::Sha512 => Self::Sha512(Box::new(Sha512::new())),
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Md5(h) => h.update(bytes),
            Self::Sha256(h) => h.update(bytes),
            Self::Sha512(h) => h.update(bytes),
        }
    }

    pub fn finalize_hex(self) -> String {
        match self {
            Self::Md5(h) => format!("{:x}", h.finalize()),
            Self::Sha256(h) => format!("{:x}", h.finalize()),
            Self::Sha512(h) => format!("{:x}", h.finalize()),
        }
    }
}

impl std::fmt::Debug for Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Md5(_) => "md5",
            Self::Sha256(_) => "sha256",
            Self::Sha512(_) => "sha512",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_content_stream_trailer() {
        let (tx, rx) = mpsc::channel(4);
        let mut stream = ContentStream::new(rx);
        tx.send(Frame::Data(Bytes::from_static(b"abc"))).await.unwrap();
        tx.send(Frame::Trailer {
            checksum: "x".to_string(),
            size: 3,
        })
        .await
        .unwrap();
        drop(tx);

        assert_eq!(stream.chunk().await.unwrap(), Bytes::from_static(b"abc"));
        assert!(stream.chunk().await.is_none());
        assert_eq!(stream.checksum(), Some("x"));
        assert_eq!(stream.size(), 3);
    }

    #[tokio::test]
    async fn test_gate_release_resumes() {
        let mut gate = AttachmentGate::new();
        let tx = gate.engage();
        assert!(gate.is_engaged());
        tx.send(()).unwrap();
        gate.wait().await;
        assert!(!gate.is_engaged());
    }

    #[tokio::test]
    async fn test_gate_dropped_handle_resumes() {
        let mut gate = AttachmentGate::new();
        let tx = gate.engage();
        drop(tx);
        gate.wait().await;
        assert!(!gate.is_engaged());
    }

    #[test]
    fn test_hasher_md5() {
        let mut hasher = Hasher::new(ChecksumAlgorithm::Md5);
        hasher.update(b"abc");
        assert_eq!(hasher.finalize_hex(), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_hasher_sha256() {
        let mut hasher = Hasher::new(ChecksumAlgorithm::Sha256);
        hasher.update(b"abc");
        assert_eq!(
            hasher.finalize_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
