//! End-to-end tests driving the parser over complete messages.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, ReadBuf};

use mailsift::{
    ChecksumAlgorithm, Error, MailEvent, MailParser, ParseOptions, parse_message,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Reader that yields one byte per `poll_read`, to exercise incremental
/// decoding across every possible chunk boundary.
struct OneByteReader {
    data: Vec<u8>,
    pos: usize,
}

impl OneByteReader {
    fn new(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
            pos: 0,
        }
    }
}

impl AsyncRead for OneByteReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.pos < self.data.len() {
            buf.put_slice(&[self.data[self.pos]]);
            self.pos += 1;
        }
        Poll::Ready(Ok(()))
    }
}

#[tokio::test]
async fn test_utf8_fed_one_byte_at_a_time() {
    init_tracing();
    let raw = "Content-Type: text/plain; charset=utf-8\r\n\r\nÕÄ\r\nÖÜ";

    let (parser, mut events) = MailParser::new(ParseOptions::new());
    let consumer = async {
        while let Some(event) = events.recv().await {
            if let MailEvent::Attachment(mut attachment) = event {
                attachment.release();
            }
        }
    };
    let (body, ()) = tokio::join!(parser.run(OneByteReader::new(raw.as_bytes())), consumer);
    let body = body.expect("parse failed");
    assert_eq!(body.text.as_deref(), Some("ÕÄ\nÖÜ"));
}

#[tokio::test]
async fn test_flowed_delsp_quoted_printable() {
    let raw = b"Content-Type: text/plain; charset=utf-8; format=flowed; delsp=yes\r\n\
        Content-Transfer-Encoding: quoted-printable\r\n\
        \r\n\
        Foo =\r\n\r\nBar =\r\n\r\nBaz";
    let mail = parse_message(raw, ParseOptions::new()).await.expect("parse failed");
    assert_eq!(mail.body.text.as_deref(), Some("FooBarBaz"));
}

#[tokio::test]
async fn test_alternative_group_exclusivity() {
    let raw = "Content-Type: multipart/mixed; boundary=mixed\r\n\r\n\
        --mixed\r\n\
        Content-Type: multipart/alternative; boundary=alt\r\n\r\n\
        --alt\r\n\
        Content-Type: text/plain; charset=utf-8\r\n\r\n\
        ÕÄÖÜ1\r\n\
        --alt\r\n\
        Content-Type: multipart/related; boundary=rel\r\n\r\n\
        --rel\r\n\
        Content-Type: text/html; charset=utf-8\r\n\r\n\
        ÕÄÖÜ2\r\n\
        --rel--\r\n\
        --alt--\r\n\
        --mixed\r\n\
        Content-Type: text/html; charset=utf-8\r\n\r\n\
        ÕÄÖÜ2\r\n\
        --mixed--\r\n";
    let mail = parse_message(raw.as_bytes(), ParseOptions::new())
        .await
        .expect("parse failed");
    // text comes only from the alternative group's text member, never from a
    // cross-render of its html siblings
    assert_eq!(mail.body.text.as_deref(), Some("ÕÄÖÜ1"));
    assert_eq!(mail.body.html.as_deref(), Some("ÕÄÖÜ2<br/>\nÕÄÖÜ2"));
}

#[tokio::test]
async fn test_text_as_html_escapes_link_quotes() {
    let raw = b"Content-Type: text/plain; charset=utf-8\r\n\r\n\
        http://example.com?\"onmouseover=\"alert('x')\"";
    let mail = parse_message(raw, ParseOptions::new()).await.expect("parse failed");
    let text_as_html = mail.body.text_as_html.expect("no textAsHtml");
    assert!(text_as_html.contains("&quot;"));
    assert!(!text_as_html.contains("\"onmouseover="));
}

const TWO_ATTACHMENTS: &[u8] = b"Content-Type: multipart/mixed; boundary=abc\r\n\r\n\
    --abc\r\n\
    Content-Type: application/octet-stream\r\n\
    Content-Disposition: attachment; filename=\"test.txt\"\r\n\
    Content-Transfer-Encoding: base64\r\n\r\n\
    YWJj\r\n\
    --abc\r\n\
    Content-Type: application/octet-stream\r\n\
    Content-Disposition: attachment; filename=\"test.txt\"\r\n\
    Content-Transfer-Encoding: base64\r\n\r\n\
    ZGVm\r\n\
    --abc--\r\n";

#[tokio::test]
async fn test_duplicate_filenames_surface_in_document_order() {
    let mail = parse_message(TWO_ATTACHMENTS, ParseOptions::new())
        .await
        .expect("parse failed");
    assert_eq!(mail.attachments.len(), 2);
    assert_eq!(mail.attachments[0].filename.as_deref(), Some("test.txt"));
    assert_eq!(mail.attachments[1].filename.as_deref(), Some("test.txt"));
    assert_eq!(mail.attachments[0].content, b"abc");
    assert_eq!(mail.attachments[1].content, b"def");
    assert_eq!(mail.attachments[0].part_path, "1.1");
    assert_eq!(mail.attachments[1].part_path, "1.2");
    // octet-stream re-guessed from the filename
    assert_eq!(mail.attachments[0].content_type, "text/plain");
}

#[tokio::test]
async fn test_gate_blocks_until_release() {
    let (parser, mut events) = MailParser::new(ParseOptions::new());

    let consumer = async {
        let mut released = 0u32;
        // headers event first
        let Some(MailEvent::Headers(_)) = events.recv().await else {
            panic!("expected headers event");
        };

        let Some(MailEvent::Attachment(mut first)) = events.recv().await else {
            panic!("expected first attachment");
        };
        let content = first.content.to_vec().await;
        assert_eq!(content, b"abc");

        // the parser must not surface the second attachment while the first
        // handle is unreleased
        let pending = tokio::time::timeout(Duration::from_millis(100), events.recv()).await;
        assert!(pending.is_err(), "second attachment surfaced before release");

        first.release();
        released += 1;

        let Some(MailEvent::Attachment(mut second)) = events.recv().await else {
            panic!("expected second attachment");
        };
        assert_eq!(second.content.to_vec().await, b"def");
        second.release();
        released += 1;

        while let Some(event) = events.recv().await {
            assert!(
                !matches!(event, MailEvent::Attachment(_)),
                "unexpected extra attachment"
            );
        }
        released
    };

    let (body, released) = tokio::join!(parser.run(TWO_ATTACHMENTS), consumer);
    assert!(body.is_ok());
    assert_eq!(released, 2);
}

#[tokio::test]
async fn test_attachment_checksum_and_size() {
    let mail = parse_message(
        TWO_ATTACHMENTS,
        ParseOptions::new().checksum_algorithm(ChecksumAlgorithm::Md5),
    )
    .await
    .expect("parse failed");
    assert_eq!(
        mail.attachments[0].checksum.as_deref(),
        Some("900150983cd24fb0d6963f7d28e17f72")
    );
    assert_eq!(mail.attachments[0].size, 3);
}

#[tokio::test]
async fn test_positional_identifier_stability() {
    let raw = b"Content-Type: multipart/mixed; boundary=outer\r\n\r\n\
        --outer\r\n\
        Content-Type: text/plain\r\n\r\n\
        hello\r\n\
        --outer\r\n\
        Content-Type: multipart/mixed; boundary=inner\r\n\r\n\
        --inner\r\n\
        Content-Type: application/pdf\r\n\
        Content-Disposition: attachment; filename=\"doc.pdf\"\r\n\r\n\
        data\r\n\
        --inner--\r\n\
        --outer--\r\n";
    let mail = parse_message(raw, ParseOptions::new()).await.expect("parse failed");
    assert_eq!(mail.attachments.len(), 1);
    assert_eq!(mail.attachments[0].part_path, "1.2.1");
}

#[tokio::test]
async fn test_embedded_message_header_summary() {
    let raw = b"Content-Type: message/rfc822\r\n\r\n\
        From: Inner Sender <inner@example.com>\r\n\
        Subject: Inner subject\r\n\
        Date: Thu, 15 May 2014 11:53:30 +0000\r\n\
        Content-Type: text/plain\r\n\r\n\
        inner body";
    let mail = parse_message(raw, ParseOptions::new()).await.expect("parse failed");
    let text = mail.body.text.expect("no text");
    assert!(text.contains("From: Inner Sender <inner@example.com>"));
    assert!(text.contains("Subject: Inner subject"));
    assert!(text.contains("Date: Thu, 15 May 2014 11:53:30 GMT"));
    assert!(text.contains("inner body"));
}

#[tokio::test]
async fn test_oversized_html_guard() {
    let raw = format!(
        "Content-Type: text/html; charset=utf-8\r\n\r\n<p>{}</p>",
        "x".repeat(64)
    );
    let mail = parse_message(
        raw.as_bytes(),
        ParseOptions::new().max_html_length_to_parse(16),
    )
    .await
    .expect("parse failed");
    assert_eq!(
        mail.body.text.as_deref(),
        Some("Invalid HTML content (too long)")
    );
    assert!(!mail.warnings.is_empty());
    // the html itself is still delivered
    assert!(mail.body.html.expect("no html").contains("<p>"));
}

#[tokio::test]
async fn test_html_only_message_gets_text_projection() {
    let raw = b"Content-Type: text/html; charset=utf-8\r\n\r\n\
        <p>Hello <b>world</b></p>";
    let mail = parse_message(raw, ParseOptions::new()).await.expect("parse failed");
    let text = mail.body.text.expect("no text");
    assert!(text.contains("Hello"));
    assert!(text.contains("world"));
}

#[tokio::test]
async fn test_skip_html_to_text() {
    let raw = b"Content-Type: text/html; charset=utf-8\r\n\r\n<p>Hello</p>";
    let mail = parse_message(raw, ParseOptions::new().skip_html_to_text(true))
        .await
        .expect("parse failed");
    assert!(mail.body.text.is_none());
    assert!(mail.body.html.is_some());
}

#[tokio::test]
async fn test_cid_links_rewritten_to_data_uris() {
    // 1x1 transparent gif, base64
    let raw = b"Content-Type: multipart/related; boundary=rel\r\n\r\n\
        --rel\r\n\
        Content-Type: text/html; charset=utf-8\r\n\r\n\
        <img src=\"cid:img1@local\">\r\n\
        --rel\r\n\
        Content-Type: image/gif\r\n\
        Content-ID: <img1@local>\r\n\
        Content-Transfer-Encoding: base64\r\n\r\n\
        R0lGODlhAQABAAAAACw=\r\n\
        --rel--\r\n";

    let mail = parse_message(raw, ParseOptions::new()).await.expect("parse failed");
    assert!(mail.attachments[0].related);
    assert_eq!(mail.attachments[0].cid.as_deref(), Some("img1@local"));
    let html = mail.body.html.expect("no html");
    assert!(html.contains("src=\"data:image/gif;base64,"));

    let mail = parse_message(raw, ParseOptions::new().keep_cid_links(true))
        .await
        .expect("parse failed");
    assert!(mail.body.html.expect("no html").contains("src=\"cid:img1@local\""));
}

proptest::proptest! {
    // tokenization is invariant under input chunking
    #[test]
    fn prop_chunk_size_does_not_change_tokens(chunk_size in 1usize..128) {
        use mailsift::{MessageSplitter, Token};

        let collect = |chunk_size: usize| {
            let mut splitter = MessageSplitter::new();
            let mut paths = Vec::new();
            let mut body = Vec::new();
            for chunk in TWO_ATTACHMENTS.chunks(chunk_size) {
                for token in splitter.feed(chunk).unwrap() {
                    match token {
                        Token::PartStart(env) => paths.push(env.part_path.clone()),
                        Token::BodyChunk(bytes) => body.extend_from_slice(&bytes),
                        Token::BoundaryCrossed => {}
                    }
                }
            }
            for token in splitter.finish().unwrap() {
                if let Token::BodyChunk(bytes) = token {
                    body.extend_from_slice(&bytes);
                }
            }
            (paths, body)
        };

        let whole = collect(TWO_ATTACHMENTS.len());
        let chunked = collect(chunk_size);
        proptest::prop_assert_eq!(whole, chunked);
    }
}

#[tokio::test]
async fn test_empty_input_is_immediate_error() {
    match parse_message(b"", ParseOptions::new()).await {
        Err(Error::EmptyInput) => {}
        other => panic!("expected EmptyInput, got {other:?}"),
    }
}

#[tokio::test]
async fn test_root_header_convenience_accessors() {
    let raw = b"From: Andris <andris@example.com>\r\n\
        To: a@example.com, B <b@example.com>\r\n\
        Subject: =?utf-8?B?SMOpbGxv?=\r\n\
        Message-ID: abc@example.com\r\n\
        X-Priority: 1 (Highest)\r\n\
        Date: Thu, 15 May 2014 11:53:30 +0100\r\n\
        Content-Type: text/plain\r\n\r\n\
        hi";
    let mail = parse_message(raw, ParseOptions::new()).await.expect("parse failed");
    assert_eq!(mail.subject(), Some("Héllo"));
    assert_eq!(mail.message_id(), Some("<abc@example.com>"));
    assert_eq!(mail.priority(), mailsift::Priority::High);
    let from = mail.from().expect("no from");
    assert_eq!(from.value[0].address.as_deref(), Some("andris@example.com"));
    assert!(from.html.contains("mailto:andris@example.com"));
    assert_eq!(mail.to().expect("no to").value.len(), 2);
    assert!(mail.date().is_some());
    assert_eq!(mail.body.text.as_deref(), Some("hi"));
}

#[tokio::test]
async fn test_latin1_charset_transcoding() {
    let raw = b"Content-Type: text/plain; charset=iso-8859-1\r\n\r\np\xE4iv\xE4\xE4";
    let mail = parse_message(raw, ParseOptions::new()).await.expect("parse failed");
    assert_eq!(mail.body.text.as_deref(), Some("p\u{e4}iv\u{e4}\u{e4}"));
}

#[tokio::test]
async fn test_unknown_charset_degrades_to_passthrough() {
    let raw = b"Content-Type: text/plain; charset=x-nonsense\r\n\r\nplain enough";
    let mail = parse_message(raw, ParseOptions::new()).await.expect("parse failed");
    assert_eq!(mail.body.text.as_deref(), Some("plain enough"));
}

#[tokio::test]
async fn test_headers_only_message() {
    let raw = b"Subject: nothing else\r\nFrom: a@example.com\r\n";
    let mail = parse_message(raw, ParseOptions::new()).await.expect("parse failed");
    assert_eq!(mail.subject(), Some("nothing else"));
    assert!(mail.attachments.is_empty());
}

#[tokio::test]
async fn test_delivery_status_is_not_an_attachment() {
    let raw = b"Content-Type: multipart/report; boundary=r\r\n\r\n\
        --r\r\n\
        Content-Type: text/plain\r\n\r\n\
        delivery failed\r\n\
        --r\r\n\
        Content-Type: message/delivery-status\r\n\r\n\
        Status: 5.1.1\r\n\
        --r--\r\n";
    let mail = parse_message(raw, ParseOptions::new()).await.expect("parse failed");
    assert!(mail.attachments.is_empty());
    // status text is captured on its part but never joins the body
    assert_eq!(mail.body.text.as_deref(), Some("delivery failed"));
}

#[tokio::test]
async fn test_oversized_header_line_is_fatal() {
    let mut raw = b"Subject: ".to_vec();
    raw.extend(std::iter::repeat_n(b'x', 2 * 1024 * 1024));
    match parse_message(&raw, ParseOptions::new()).await {
        Err(Error::Structure(_)) => {}
        other => panic!("expected structural error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_inline_image_is_still_an_attachment() {
    let raw = b"Content-Type: multipart/mixed; boundary=b\r\n\r\n\
        --b\r\n\
        Content-Type: text/plain\r\n\r\n\
        see image\r\n\
        --b\r\n\
        Content-Type: image/png\r\n\
        Content-Disposition: inline; filename=\"pic.png\"\r\n\r\n\
        fakepng\r\n\
        --b--\r\n";
    let mail = parse_message(raw, ParseOptions::new()).await.expect("parse failed");
    assert_eq!(mail.attachments.len(), 1);
    assert_eq!(mail.attachments[0].content_disposition.as_deref(), Some("inline"));
    assert_eq!(mail.body.text.as_deref(), Some("see image"));
}
