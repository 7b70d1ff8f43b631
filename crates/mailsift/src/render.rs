//! HTML body projections and inline-image link rewriting.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Extracts a plain-text projection from an HTML fragment.
///
/// Returns `None` when conversion fails; callers substitute a placeholder and
/// report a warning.
pub(crate) fn html_to_text(html: &str) -> Option<String> {
    htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "head"])
        .build()
        .convert(html)
        .ok()
}

/// Builds a `data:` URI for inline image content.
pub(crate) fn data_uri(content_type: &str, content: &[u8]) -> String {
    format!("data:{content_type};base64,{}", STANDARD.encode(content))
}

/// Replaces `cid:` URLs with whatever `resolve` returns for the id.
/// Ids run up to 256 bytes and stop at quotes or whitespace.
pub(crate) fn rewrite_cid_links(html: &str, resolve: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(pos) = rest.find("cid:") {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 4..];
        let id_len: usize = after
            .chars()
            .take_while(|c| !matches!(c, '"' | '\'') && !c.is_whitespace())
            .take(256)
            .map(char::len_utf8)
            .sum();
        let id = &after[..id_len];
        if id.is_empty() {
            out.push_str("cid:");
        } else if let Some(url) = resolve(id) {
            out.push_str(&url);
        } else {
            out.push_str("cid:");
            out.push_str(id);
        }
        rest = &after[id_len..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text_basic() {
        let text = html_to_text("<p>Hello <b>world</b></p>").unwrap_or_default();
        assert!(text.contains("Hello"));
        assert!(text.contains("world"));
    }

    #[test]
    fn test_rewrite_cid_links() {
        let html = "<img src=\"cid:img1@local\"> and <img src=\"cid:missing\">";
        let out = rewrite_cid_links(html, |id| {
            (id == "img1@local").then(|| "data:image/png;base64,AAAA".to_string())
        });
        assert!(out.contains("src=\"data:image/png;base64,AAAA\""));
        assert!(out.contains("src=\"cid:missing\""));
    }

    #[test]
    fn test_data_uri() {
        assert_eq!(data_uri("image/png", b"abc"), "data:image/png;base64,YWJj");
    }
}
