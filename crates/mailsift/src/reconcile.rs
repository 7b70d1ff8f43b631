//! Text/HTML reconciliation: one walk over the finished tree.
//!
//! Each inline leaf contributes its native fragment. Leaves inside a
//! `multipart/alternative` group never cross-render (the group's other
//! member is the equivalent content). Outside alternative groups a fragment
//! is also cross-rendered into the opposite accumulator, but only when that
//! type is missing from the message entirely. Parts directly inside a
//! `message/rfc822` container get a synthetic header summary first.

use crate::error::Warning;
use crate::events::{BodyContent, MailEvent};
use crate::headers::HeaderValue;
use crate::options::ParseOptions;
use crate::render;
use crate::tree::{Part, PartArena, PartId};
use chrono::Utc;
use mailsift_mime::{escape_html, text_to_html};
use tokio::sync::mpsc;

/// Placeholder substituted when an HTML body exceeds the configured parse
/// ceiling.
const HTML_TOO_LONG: &str = "Invalid HTML content (too long)";

/// Placeholder substituted when HTML→text conversion fails.
const HTML_INVALID: &str = "Invalid HTML content";

/// Walks the completed tree and synthesizes the final body.
pub(crate) async fn reconcile(
    arena: &PartArena,
    root: Option<PartId>,
    options: &ParseOptions,
    saw_text: bool,
    saw_html: bool,
    events: &mpsc::Sender<MailEvent>,
) -> BodyContent {
    let mut text_fragments: Vec<String> = Vec::new();
    let mut html_fragments: Vec<String> = Vec::new();

    let Some(root) = root else {
        return BodyContent::default();
    };

    // pre-order walk; the stack carries the alternative-group flag
    let mut stack: Vec<(PartId, bool)> = vec![(root, false)];
    while let Some((id, mut alternative)) = stack.pop() {
        let part = arena.get(id);

        if part.show_meta {
            render_meta(
                part,
                options,
                saw_text,
                saw_html,
                &mut text_fragments,
                &mut html_fragments,
            );
        }

        // text_content is never populated for attachments or containers
        let inline = !part.is_attachment && !part.is_container;
        if let Some(content) = part
            .text_content
            .as_ref()
            .filter(|c| inline && !c.is_empty())
        {
            match part.content_type.as_str() {
                "text/plain" => {
                    text_fragments.push(content.clone());
                    if !alternative && !saw_html && !options.skip_text_to_html {
                        html_fragments.push(text_to_html(content, !options.skip_text_links));
                    }
                }
                "text/html" => {
                    html_fragments.push(content.clone());
                    if !alternative && !saw_text && !options.skip_html_to_text {
                        text_fragments.push(text_projection(part, content, options, events).await);
                    }
                }
                _ => {}
            }
        }

        alternative = alternative || part.content_type == "multipart/alternative";
        for &child in part.children.iter().rev() {
            stack.push((child, alternative));
        }
    }

    let html = if html_fragments.is_empty() {
        None
    } else {
        Some(html_fragments.join("<br/>\n"))
    };
    let (text, text_as_html) = if text_fragments.is_empty() {
        (None, None)
    } else {
        let text_as_html = text_fragments
            .iter()
            .map(|fragment| text_to_html(fragment, !options.skip_text_links))
            .collect::<Vec<_>>()
            .join("<br/>\n");
        (Some(text_fragments.join("\n")), Some(text_as_html))
    };

    BodyContent {
        text,
        html,
        text_as_html,
    }
}

/// HTML→text projection with the adversarial-input guard.
async fn text_projection(
    part: &Part,
    content: &str,
    options: &ParseOptions,
    events: &mpsc::Sender<MailEvent>,
) -> String {
    if content.len() > options.max_html_length_to_parse {
        tracing::warn!(part = %part.part_path, len = content.len(), "html body too long to parse");
        let _ = events
            .send(MailEvent::Warning(Warning {
                part: Some(part.part_path.clone()),
                message: format!(
                    "HTML body of {} bytes exceeds the parse limit of {}",
                    content.len(),
                    options.max_html_length_to_parse
                ),
            }))
            .await;
        return HTML_TOO_LONG.to_string();
    }

    match render::html_to_text(content) {
        Some(text) => text,
        None => {
            tracing::warn!(part = %part.part_path, "html to text conversion failed");
            let _ = events
                .send(MailEvent::Warning(Warning {
                    part: Some(part.part_path.clone()),
                    message: "HTML to text conversion failed".to_string(),
                }))
                .await;
            HTML_INVALID.to_string()
        }
    }
}

/// Renders the synthetic From/Subject/Date/To/Cc/Bcc block for parts nested
/// in an embedded message.
fn render_meta(
    part: &Part,
    options: &ParseOptions,
    saw_text: bool,
    saw_html: bool,
    text_fragments: &mut Vec<String>,
    html_fragments: &mut Vec<String>,
) {
    let keys = ["From", "Subject", "Date", "To", "Cc", "Bcc"];
    let entries: Vec<(&str, &HeaderValue)> = keys
        .iter()
        .filter_map(|key| part.headers.get(key).map(|value| (*key, value)))
        .collect();
    if entries.is_empty() {
        return;
    }

    if saw_html {
        let rows: Vec<String> = entries
            .iter()
            .map(|(key, value)| {
                let rendered = match value {
                    HeaderValue::Addresses(addresses) => addresses.html.clone(),
                    HeaderValue::Date(_) => escape_html(&format_date(options, value)),
                    HeaderValue::Text(text) if *key == "Subject" => {
                        format!("<strong>{}</strong>", escape_html(text))
                    }
                    other => escape_html(other.as_text().unwrap_or_default()),
                };
                format!(
                    "<tr><td class=\"mp_head_key\">{}:</td><td class=\"mp_head_value\">{rendered}</td></tr>",
                    escape_html(key)
                )
            })
            .collect();
        html_fragments.push(format!(
            "<table class=\"mp_head\">{}</table>",
            rows.join("\n")
        ));
    }

    if saw_text {
        let lines: Vec<String> = entries
            .iter()
            .map(|(key, value)| {
                let rendered = match value {
                    HeaderValue::Addresses(addresses) => addresses.text.clone(),
                    HeaderValue::Date(_) => format_date(options, value),
                    other => other.as_text().unwrap_or_default().to_string(),
                };
                format!("{key}: {rendered}")
            })
            .collect();
        text_fragments.push(format!("\n{}\n", lines.join("\n")));
    }
}

/// Applies the configured date renderer, defaulting to the RFC-style UTC
/// form.
fn format_date(options: &ParseOptions, value: &HeaderValue) -> String {
    let Some(date) = value.as_date() else {
        return String::new();
    };
    match &options.format_date_string {
        Some(formatter) => formatter(date),
        None => date
            .with_timezone(&Utc)
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string(),
    }
}
