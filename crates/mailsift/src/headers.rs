//! Header normalization: raw header lines to typed values.
//!
//! Address-bearing headers parse to an address list plus pre-rendered HTML
//! and text projections; message ids are bracket-normalized; dates parse to
//! timestamps (substituting "now" on failure); priority vocabulary maps to
//! low/normal/high; `list-*` headers fold into a single structured object.
//! A fixed set of headers always collapses multiple occurrences to the last
//! one seen; all others accumulate in arrival order.

use crate::token::RawHeader;
use chrono::{DateTime, FixedOffset, Utc};
use mailsift_mime::{
    Address, addresses_to_html, addresses_to_text, decode_words, parse_address_list,
    parse_parameters,
};
use std::collections::{BTreeMap, HashMap};

/// Message priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Priority {
    /// Low priority (numeric value above 3, or "low"/"non-urgent").
    Low,
    /// Normal priority.
    #[default]
    Normal,
    /// High priority (numeric value below 3, or "high"/"urgent").
    High,
}

/// An address header with pre-rendered projections.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AddressHeader {
    /// Parsed address list.
    pub value: Vec<Address>,
    /// HTML projection (escaped, with `mailto:` links).
    pub html: String,
    /// Plain-text projection.
    pub text: String,
}

/// One entry of a folded `list-*` header object.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ListEntry {
    /// HTTP(S) URL.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub url: Option<String>,
    /// Mail address (`mailto:` prefix stripped).
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub mail: Option<String>,
    /// Bare identifier (no `@`).
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub id: Option<String>,
    /// Display name.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub name: Option<String>,
}

/// A normalized header value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum HeaderValue {
    /// Decoded text value.
    Text(String),
    /// Address list with projections.
    Addresses(AddressHeader),
    /// Parsed timestamp.
    Date(DateTime<FixedOffset>),
    /// Bracket-normalized message id.
    MessageId(String),
    /// List of bracket-normalized message ids (`references`).
    MessageIds(Vec<String>),
    /// Mapped priority.
    Priority(Priority),
    /// Structured value with parameters (`content-type`,
    /// `content-disposition`, `dkim-signature`).
    Structured {
        /// Leading value before the first `;`, lower-cased.
        value: String,
        /// Decoded parameters.
        params: HashMap<String, String>,
    },
    /// Folded `list-*` object keyed by subfield (`unsubscribe`, `post`, ...).
    List(BTreeMap<String, ListEntry>),
}

impl HeaderValue {
    /// Returns the text form when this is a plain text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::MessageId(s) => Some(s),
            Self::Structured { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Returns the address list when this is an address header.
    #[must_use]
    pub const fn as_addresses(&self) -> Option<&AddressHeader> {
        match self {
            Self::Addresses(a) => Some(a),
            _ => None,
        }
    }

    /// Returns the timestamp when this is a date header.
    #[must_use]
    pub const fn as_date(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Self::Date(d) => Some(d),
            _ => None,
        }
    }
}

/// Headers that always collapse multiple occurrences to the last one seen.
const SINGLE_VALUE_KEYS: &[&str] = &[
    "message-id",
    "content-id",
    "from",
    "sender",
    "in-reply-to",
    "reply-to",
    "subject",
    "date",
    "content-disposition",
    "content-type",
    "content-transfer-encoding",
    "priority",
    "mime-version",
    "content-description",
    "precedence",
    "errors-to",
];

const ADDRESS_KEYS: &[&str] = &[
    "from",
    "to",
    "cc",
    "bcc",
    "sender",
    "reply-to",
    "delivered-to",
    "return-path",
];

/// Normalized header map.
///
/// Keys are lower-cased; multi-valued headers preserve arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HeaderMap {
    entries: Vec<(String, Vec<HeaderValue>)>,
}

impl HeaderMap {
    /// Creates an empty header map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizes a raw header block.
    #[must_use]
    pub fn from_raw(lines: &[RawHeader]) -> Self {
        let mut map = Self::new();
        for line in lines {
            let (key, value) = normalize_line(line);
            if let Some(value) = value {
                map.push(key, value);
            }
        }
        map.collapse();
        map
    }

    fn push(&mut self, key: String, value: HeaderValue) {
        if let Some((_, values)) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            values.push(value);
        } else {
            self.entries.push((key, vec![value]));
        }
    }

    /// Applies the single-value collapse and `list-*` folding rules.
    fn collapse(&mut self) {
        for (key, values) in &mut self.entries {
            if SINGLE_VALUE_KEYS.contains(&key.as_str()) && values.len() > 1 {
                let last = values.len() - 1;
                values.swap(0, last);
                values.truncate(1);
            }
            if key == "list" {
                let mut folded: BTreeMap<String, ListEntry> = BTreeMap::new();
                for value in values.iter() {
                    if let HeaderValue::List(map) = value {
                        for (subkey, entry) in map {
                            folded.insert(subkey.clone(), entry.clone());
                        }
                    }
                }
                *values = vec![HeaderValue::List(folded)];
            }
        }
    }

    /// Gets the value for a header (the collapsed value for single-value
    /// keys, the first occurrence otherwise).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        let name = name.to_lowercase();
        self.entries
            .iter()
            .find(|(k, _)| *k == name)
            .and_then(|(_, values)| values.first())
    }

    /// Gets all values for a header in arrival order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> &[HeaderValue] {
        let name = name.to_lowercase();
        self.entries
            .iter()
            .find(|(k, _)| *k == name)
            .map_or(&[], |(_, values)| values.as_slice())
    }

    /// Checks whether a header is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.entries.iter().any(|(k, _)| *k == name)
    }

    /// Iterates over `(name, value)` pairs in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.entries
            .iter()
            .flat_map(|(k, values)| values.iter().map(move |v| (k.as_str(), v)))
    }

    /// Number of distinct header names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Maps one raw line to its normalized key and value.
fn normalize_line(line: &RawHeader) -> (String, Option<HeaderValue>) {
    let key = line.name.to_lowercase();
    let raw = line.value.trim();

    let value = match key.as_str() {
        "content-type" | "content-disposition" | "dkim-signature" => {
            Some(parse_structured(raw))
        }
        "date" => {
            let date = mailsift_mime::parse_date(raw)
                .unwrap_or_else(|| Utc::now().fixed_offset());
            Some(HeaderValue::Date(date))
        }
        "subject" => Some(HeaderValue::Text(decode_words(raw))),
        "references" => {
            let ids: Vec<String> = raw
                .split_whitespace()
                .filter_map(ensure_message_id)
                .collect();
            if ids.is_empty() {
                None
            } else {
                Some(HeaderValue::MessageIds(ids))
            }
        }
        "message-id" | "in-reply-to" => ensure_message_id(raw).map(HeaderValue::MessageId),
        "priority" | "x-priority" | "x-msmail-priority" | "importance" => {
            Some(HeaderValue::Priority(parse_priority(raw)))
        }
        _ if ADDRESS_KEYS.contains(&key.as_str()) => {
            let value = parse_address_list(raw);
            let html = addresses_to_html(&value);
            let text = addresses_to_text(&value);
            Some(HeaderValue::Addresses(AddressHeader { value, html, text }))
        }
        _ if key.starts_with("list-") => {
            let subkey = key["list-".len()..].to_string();
            return (
                "list".to_string(),
                parse_list_entry(raw).map(|entry| {
                    let mut map = BTreeMap::new();
                    map.insert(subkey, entry);
                    HeaderValue::List(map)
                }),
            );
        }
        _ => {
            let decoded = decode_words(raw);
            if decoded.is_empty() {
                None
            } else {
                Some(HeaderValue::Text(decoded))
            }
        }
    };

    let key = if matches!(key.as_str(), "x-priority" | "x-msmail-priority" | "importance") {
        "priority".to_string()
    } else {
        key
    };

    (key, value)
}

fn parse_structured(raw: &str) -> HeaderValue {
    let (value, rest) = match raw.split_once(';') {
        Some((v, r)) => (v, Some(r)),
        None => (raw, None),
    };
    HeaderValue::Structured {
        value: value.trim().to_lowercase(),
        params: rest.map(parse_parameters).unwrap_or_default(),
    }
}

/// Wraps a message id in angle brackets if they are missing.
fn ensure_message_id(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let mut id = String::with_capacity(value.len() + 2);
    if !value.starts_with('<') {
        id.push('<');
    }
    id.push_str(value);
    if !value.ends_with('>') {
        id.push('>');
    }
    Some(id)
}

/// Maps numeric or textual priority vocabulary to low/normal/high.
fn parse_priority(value: &str) -> Priority {
    let value = value.trim().to_lowercase();
    let digits: String = value.chars().take_while(char::is_ascii_digit).collect();
    if !digits.is_empty() {
        // support "X-Priority: 1 (Highest)"
        return match digits.parse::<u32>().unwrap_or(0) {
            3 => Priority::Normal,
            n if n > 3 => Priority::Low,
            _ => Priority::High,
        };
    }
    match value.as_str() {
        "non-urgent" | "low" => Priority::Low,
        "urgent" | "high" => Priority::High,
        _ => Priority::Normal,
    }
}

/// Parses one `list-*` header value into a structured entry.
fn parse_list_entry(value: &str) -> Option<ListEntry> {
    let mut entry = ListEntry::default();
    for address in parse_address_list(value) {
        if let Some(name) = address.name {
            if name.starts_with("http://") || name.starts_with("https://") {
                entry.url = Some(name);
            } else {
                entry.name = Some(name);
            }
        }
        if let Some(addr) = address.address {
            if let Some(mail) = addr.strip_prefix("mailto:") {
                entry.mail = Some(mail.to_string());
            } else if addr.starts_with("http://") || addr.starts_with("https://") {
                entry.url = Some(addr);
            } else if addr.contains('@') {
                entry.mail = Some(addr);
            } else {
                entry.id = Some(addr);
            }
        }
    }
    if entry.url.is_none() && entry.mail.is_none() && entry.id.is_none() && entry.name.is_none() {
        None
    } else {
        Some(entry)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn raw(name: &str, value: &str) -> RawHeader {
        RawHeader {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_subject_decoded() {
        let map = HeaderMap::from_raw(&[raw("Subject", "=?utf-8?B?SMOpbGxv?=")]);
        assert_eq!(map.get("subject").unwrap().as_text(), Some("Héllo"));
    }

    #[test]
    fn test_single_value_last_wins() {
        let map = HeaderMap::from_raw(&[
            raw("Subject", "first"),
            raw("Subject", "second"),
        ]);
        assert_eq!(map.get("subject").unwrap().as_text(), Some("second"));
        assert_eq!(map.get_all("subject").len(), 1);
    }

    #[test]
    fn test_multi_value_preserves_order() {
        let map = HeaderMap::from_raw(&[
            raw("Received", "from a"),
            raw("Received", "from b"),
        ]);
        let values = map.get_all("received");
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].as_text(), Some("from a"));
        assert_eq!(values[1].as_text(), Some("from b"));
    }

    #[test]
    fn test_addresses_with_projections() {
        let map = HeaderMap::from_raw(&[raw("From", "Andris <andris@example.com>")]);
        let from = map.get("from").unwrap().as_addresses().unwrap();
        assert_eq!(from.value[0].address.as_deref(), Some("andris@example.com"));
        assert!(from.html.contains("mailto:andris@example.com"));
        assert_eq!(from.text, "Andris <andris@example.com>");
    }

    #[test]
    fn test_message_id_brackets() {
        let map = HeaderMap::from_raw(&[raw("Message-ID", "abc@example.com")]);
        assert_eq!(
            map.get("message-id").unwrap().as_text(),
            Some("<abc@example.com>")
        );
    }

    #[test]
    fn test_references_list() {
        let map = HeaderMap::from_raw(&[raw("References", "<a@x> b@y")]);
        match map.get("references").unwrap() {
            HeaderValue::MessageIds(ids) => {
                assert_eq!(ids, &["<a@x>".to_string(), "<b@y>".to_string()]);
            }
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn test_priority_mapping() {
        assert_eq!(parse_priority("1 (Highest)"), Priority::High);
        assert_eq!(parse_priority("3"), Priority::Normal);
        assert_eq!(parse_priority("5"), Priority::Low);
        assert_eq!(parse_priority("urgent"), Priority::High);
        assert_eq!(parse_priority("non-urgent"), Priority::Low);
        assert_eq!(parse_priority("whatever"), Priority::Normal);
    }

    #[test]
    fn test_importance_maps_to_priority_key() {
        let map = HeaderMap::from_raw(&[raw("Importance", "high")]);
        assert_eq!(
            map.get("priority"),
            Some(&HeaderValue::Priority(Priority::High))
        );
    }

    #[test]
    fn test_date_fallback_to_now() {
        let map = HeaderMap::from_raw(&[raw("Date", "not a date")]);
        assert!(map.get("date").unwrap().as_date().is_some());
    }

    #[test]
    fn test_list_headers_folded() {
        let map = HeaderMap::from_raw(&[
            raw("List-ID", "Example list <list.example.com>"),
            raw("List-Unsubscribe", "<mailto:unsub@example.com>"),
        ]);
        match map.get("list").unwrap() {
            HeaderValue::List(folded) => {
                assert_eq!(folded["id"].id.as_deref(), Some("list.example.com"));
                assert_eq!(folded["unsubscribe"].mail.as_deref(), Some("unsub@example.com"));
            }
            other => panic!("unexpected value: {other:?}"),
        }
        assert_eq!(map.get_all("list").len(), 1);
    }

    #[test]
    fn test_structured_content_type() {
        let map = HeaderMap::from_raw(&[raw("Content-Type", "text/Plain; charset=UTF-8")]);
        match map.get("content-type").unwrap() {
            HeaderValue::Structured { value, params } => {
                assert_eq!(value, "text/plain");
                assert_eq!(params.get("charset").map(String::as_str), Some("UTF-8"));
            }
            other => panic!("unexpected value: {other:?}"),
        }
    }
}
