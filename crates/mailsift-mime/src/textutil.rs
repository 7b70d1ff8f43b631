//! HTML escaping and plain-text to HTML synthesis.

/// Escapes `& < > " '` as named/numeric entities.
#[must_use]
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders plain text as an HTML fragment.
///
/// The entire input is entity-escaped first; URLs are then detected in the
/// escaped text and wrapped in anchors whose href is escaped *again*, so a
/// quote character can never terminate the attribute early. Blank lines
/// become paragraph breaks, single line breaks become `<br/>`.
#[must_use]
pub fn text_to_html(s: &str, linkify: bool) -> String {
    let escaped = escape_html(s);
    let linked = if linkify { link_urls(&escaped) } else { escaped };

    let normalized = linked.replace("\r\n", "\n");
    let mut lines: Vec<&str> = normalized.lines().map(|l| l.trim_end_matches([' ', '\t'])).collect();
    while lines.first().is_some_and(|l| l.is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    let mut out = String::with_capacity(normalized.len() + 16);
    out.push_str("<p>");
    let mut blank_run = 0usize;
    for (i, line) in lines.iter().enumerate() {
        if line.is_empty() {
            blank_run += 1;
            continue;
        }
        if i > 0 {
            if blank_run > 0 {
                out.push_str("</p><p>");
            } else {
                out.push_str("<br/>");
            }
        }
        blank_run = 0;
        out.push_str(line);
    }
    out.push_str("</p>");
    out
}

/// Wraps URLs found in already-escaped text in anchor tags.
fn link_urls(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut rest = escaped;

    while let Some((start, scheme_len)) = find_url_start(rest) {
        let candidate = &rest[start..];
        let len = url_length(candidate);
        if len <= scheme_len {
            out.push_str(&rest[..start + len.max(scheme_len)]);
            rest = &rest[start + len.max(scheme_len)..];
            continue;
        }
        let url_text = &candidate[..len];
        let href_raw = if url_text.starts_with("www.") {
            format!("http://{url_text}")
        } else {
            url_text.to_string()
        };
        out.push_str(&rest[..start]);
        out.push_str("<a href=\"");
        out.push_str(&escape_html(&href_raw));
        out.push_str("\">");
        out.push_str(&escape_html(url_text));
        out.push_str("</a>");
        rest = &candidate[len..];
    }

    out.push_str(rest);
    out
}

/// Finds the next URL start (`http://`, `https://`, `www.`) at a word
/// boundary. Returns the byte offset and the prefix length.
fn find_url_start(s: &str) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    for prefix in ["http://", "https://", "www."] {
        let mut from = 0;
        while let Some(pos) = s[from..].find(prefix) {
            let at = from + pos;
            let boundary = at == 0
                || s[..at]
                    .chars()
                    .next_back()
                    .is_some_and(|c| c.is_whitespace() || c == '(');
            if boundary {
                if best.is_none_or(|(b, _)| at < b) {
                    best = Some((at, prefix.len()));
                }
                break;
            }
            from = at + prefix.len();
        }
    }
    best
}

/// Number of bytes belonging to the URL starting at the beginning of `s`,
/// with trailing punctuation trimmed.
///
/// `s` is already entity-escaped, so quote and angle-bracket entities mark
/// characters that end a URL in the source text.
fn url_length(s: &str) -> usize {
    let mut len = 0;
    for c in s.chars() {
        let allowed = c.is_ascii_alphanumeric()
            || "-._~:/?#[]@!$&'()*+,;=%".contains(c);
        if !allowed {
            break;
        }
        len += c.len_utf8();
    }
    for entity in ["&quot;", "&#39;", "&lt;", "&gt;"] {
        if let Some(pos) = s[..len].find(entity) {
            len = pos;
        }
    }
    // trailing punctuation belongs to the sentence, not the URL
    while len > 0 {
        let last = s[..len].chars().next_back().unwrap_or(' ');
        if matches!(last, '.' | ',' | ';' | ':' | '!' | '?' | ')') {
            len -= last.len_utf8();
        } else {
            break;
        }
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<a href=\"x\">&'</a>"),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_text_to_html_paragraphs() {
        assert_eq!(
            text_to_html("one\ntwo\n\nthree", false),
            "<p>one<br/>two</p><p>three</p>"
        );
    }

    #[test]
    fn test_text_to_html_trims_line_ends() {
        assert_eq!(text_to_html("one  \r\ntwo\r\n", false), "<p>one<br/>two</p>");
    }

    #[test]
    fn test_link_detection() {
        let html = text_to_html("see http://example.com/page for details", true);
        assert!(html.contains("<a href=\"http://example.com/page\">http://example.com/page</a>"));
    }

    #[test]
    fn test_www_link_gets_scheme() {
        let html = text_to_html("visit www.example.com today", true);
        assert!(html.contains("<a href=\"http://www.example.com\">www.example.com</a>"));
    }

    #[test]
    fn test_trailing_punctuation_not_linked() {
        let html = text_to_html("go to http://example.com.", true);
        assert!(html.contains("<a href=\"http://example.com\">http://example.com</a>."));
    }

    #[test]
    fn test_no_links_when_disabled() {
        let html = text_to_html("see http://example.com", false);
        assert!(!html.contains("<a "));
        assert!(html.contains("http://example.com"));
    }

    #[test]
    fn test_quote_cannot_break_href() {
        let html = text_to_html(
            "http://example.com?\"onmouseover=\"alert('x')\"",
            true,
        );
        assert!(!html.contains("\"onmouseover="));
        assert!(html.contains("&quot;"));
    }

    #[test]
    fn test_url_inside_word_not_linked() {
        let html = text_to_html("nothttp://example.com", true);
        assert!(!html.contains("<a "));
    }
}
