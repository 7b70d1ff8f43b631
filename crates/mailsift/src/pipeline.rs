//! Per-part decode pipelines.
//!
//! Every non-container part gets a fixed-order chain: transfer-encoding
//! decode, then (text parts that declared it) format-flowed reassembly, then
//! (inline text/html) charset transcoding. The chain's shape is decided once,
//! up front, from the part's envelope; the concrete stages then run
//! incrementally with bounded carry state.

use crate::token::PartEnvelope;
use mailsift_mime::{
    Base64Decoder, CharsetDecoder, FlowedDecoder, QuotedPrintableDecoder, TransferEncoding,
    is_unicode_compatible,
};

/// Which stages a part's pipeline contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PipelineSpec {
    pub transfer: TransferEncoding,
    /// `Some(delsp)` when the flowed stage is present.
    pub flowed: Option<bool>,
    /// Charset label when the transcoding stage is present.
    pub charset: Option<String>,
}

impl PipelineSpec {
    /// Derives the pipeline shape for a part.
    ///
    /// The flowed stage applies to text parts that declared `format=flowed`;
    /// the charset stage applies to inline text/html parts whose charset is
    /// not already ASCII/UTF-8 compatible.
    pub fn for_part(envelope: &PartEnvelope, inline_text: bool) -> Self {
        let flowed = if envelope.content_type.is_text() && envelope.flowed {
            Some(envelope.delsp)
        } else {
            None
        };
        let charset = envelope
            .charset
            .as_deref()
            .filter(|charset| inline_text && !is_unicode_compatible(charset))
            .map(str::to_string);
        Self {
            transfer: envelope.encoding,
            flowed,
            charset,
        }
    }
}

enum TransferStage {
    Binary,
    Base64(Base64Decoder),
    QuotedPrintable(QuotedPrintableDecoder),
}

impl TransferStage {
    fn push(&mut self, chunk: &[u8]) -> Vec<u8> {
        match self {
            Self::Binary => chunk.to_vec(),
            Self::Base64(decoder) => decoder.push(chunk),
            Self::QuotedPrintable(decoder) => decoder.push(chunk),
        }
    }

    fn finish(&mut self) -> Vec<u8> {
        match self {
            Self::Binary => Vec::new(),
            Self::Base64(decoder) => decoder.finish(),
            Self::QuotedPrintable(decoder) => decoder.finish(),
        }
    }
}

/// The concrete stage chain for one part.
pub(crate) struct DecodePipeline {
    transfer: TransferStage,
    flowed: Option<FlowedDecoder>,
    charset: Option<CharsetDecoder>,
}

impl DecodePipeline {
    /// Builds the chain described by a spec.
    pub fn new(spec: &PipelineSpec) -> Self {
        let transfer = match spec.transfer {
            TransferEncoding::Base64 => TransferStage::Base64(Base64Decoder::new()),
            TransferEncoding::QuotedPrintable => {
                TransferStage::QuotedPrintable(QuotedPrintableDecoder::new())
            }
            TransferEncoding::Binary => TransferStage::Binary,
        };
        Self {
            transfer,
            flowed: spec.flowed.map(FlowedDecoder::new),
            charset: spec.charset.as_deref().map(CharsetDecoder::for_label),
        }
    }

    /// Writes raw body bytes, returning the decoded output available so far.
    ///
    /// Output from the charset stage is UTF-8; otherwise it is whatever the
    /// transfer (and flowed) stages produced.
    pub fn write(&mut self, chunk: &[u8]) -> Vec<u8> {
        let decoded = self.transfer.push(chunk);
        let decoded = match &mut self.flowed {
            Some(flowed) => flowed.push(&decoded),
            None => decoded,
        };
        match &mut self.charset {
            Some(charset) => charset.decode(&decoded, false).into_bytes(),
            None => decoded,
        }
    }

    /// Flushes all stages at end of input.
    pub fn finish(&mut self) -> Vec<u8> {
        let mut decoded = self.transfer.finish();
        if let Some(flowed) = &mut self.flowed {
            let mut out = flowed.push(&decoded);
            out.extend(flowed.finish());
            decoded = out;
        }
        match &mut self.charset {
            Some(charset) => {
                let mut out = charset.decode(&decoded, false);
                out.push_str(&charset.decode(&[], true));
                out.into_bytes()
            }
            None => decoded,
        }
    }
}

impl std::fmt::Debug for DecodePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodePipeline")
            .field("flowed", &self.flowed.is_some())
            .field("charset", &self.charset.is_some())
            .finish()
    }
}
