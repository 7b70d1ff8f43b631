//! RFC 5322 address-list parsing with HTML and text projections.

use crate::encoding::decode_words;
use crate::textutil::escape_html;

/// A single mailbox or address group.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Address {
    /// Display name, with encoded words decoded.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub name: Option<String>,
    /// Email address (`local@domain`). Absent for groups.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub address: Option<String>,
    /// Group members, for RFC 2822 group syntax (`name: a@b, c@d;`).
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub group: Option<Vec<Address>>,
}

/// Parses a comma-separated address list.
///
/// Tolerant of real-world input: quoted display names, angle-addr, bare
/// addr-spec, group syntax, and comments (which are discarded). Never fails;
/// unparseable fragments produce name-only entries.
#[must_use]
pub fn parse_address_list(value: &str) -> Vec<Address> {
    let mut cursor = Cursor {
        bytes: value.as_bytes(),
        pos: 0,
    };
    parse_list(&mut cursor, false)
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    fn take_until(&mut self, stop: impl Fn(u8) -> bool) -> &[u8] {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if stop(b) {
                break;
            }
            self.pos += 1;
        }
        &self.bytes[start..self.pos]
    }
}

fn parse_list(cursor: &mut Cursor<'_>, in_group: bool) -> Vec<Address> {
    let mut out = Vec::new();
    loop {
        cursor.skip_ws();
        match cursor.peek() {
            None => break,
            Some(b',') => {
                cursor.pos += 1;
                continue;
            }
            Some(b';') if in_group => {
                cursor.pos += 1;
                break;
            }
            Some(b';') => {
                cursor.pos += 1;
                continue;
            }
            Some(_) => {}
        }
        if let Some(address) = parse_one(cursor, in_group) {
            out.push(address);
        }
    }
    out
}

fn parse_one(cursor: &mut Cursor<'_>, in_group: bool) -> Option<Address> {
    let mut name_parts: Vec<String> = Vec::new();
    let mut address: Option<String> = None;

    loop {
        cursor.skip_ws();
        match cursor.peek() {
            None => break,
            Some(b',') => break,
            Some(b';') if in_group => break,
            Some(b'"') => {
                cursor.pos += 1;
                let mut raw = Vec::new();
                while let Some(b) = cursor.peek() {
                    cursor.pos += 1;
                    if b == b'\\' {
                        if let Some(next) = cursor.peek() {
                            raw.push(next);
                            cursor.pos += 1;
                        }
                    } else if b == b'"' {
                        break;
                    } else {
                        raw.push(b);
                    }
                }
                name_parts.push(String::from_utf8_lossy(&raw).into_owned());
            }
            Some(b'(') => {
                // comment, discarded
                cursor.pos += 1;
                let mut depth = 1;
                while let Some(b) = cursor.peek() {
                    cursor.pos += 1;
                    match b {
                        b'(' => depth += 1,
                        b')' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                }
            }
            Some(b'<') => {
                cursor.pos += 1;
                let inner = String::from_utf8_lossy(cursor.take_until(|b| b == b'>'))
                    .trim()
                    .to_string();
                if cursor.peek() == Some(b'>') {
                    cursor.pos += 1;
                }
                if !inner.is_empty() {
                    address = Some(inner);
                }
            }
            Some(b':') => {
                // group: name_parts collected so far name the group
                cursor.pos += 1;
                let members = parse_list(cursor, true);
                let name = finish_name(&name_parts);
                return Some(Address {
                    name,
                    address: None,
                    group: Some(members),
                });
            }
            Some(_) => {
                let atom = String::from_utf8_lossy(cursor.take_until(|b| {
                    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b',' | b';' | b'<' | b'(' | b':' | b'"')
                }))
                .into_owned();
                if atom.is_empty() {
                    // stray byte that take_until refuses to consume
                    cursor.pos += 1;
                } else {
                    name_parts.push(atom);
                }
            }
        }
    }

    // no angle-addr: a lone atom containing "@" is a bare address
    if address.is_none() && name_parts.len() == 1 && name_parts[0].contains('@') {
        let bare = name_parts.pop().unwrap_or_default();
        return Some(Address {
            name: None,
            address: Some(bare),
            group: None,
        });
    }

    let name = finish_name(&name_parts);
    if name.is_none() && address.is_none() {
        return None;
    }
    Some(Address {
        name,
        address,
        group: None,
    })
}

fn finish_name(parts: &[String]) -> Option<String> {
    if parts.is_empty() {
        return None;
    }
    let joined = parts.join(" ");
    let joined = joined.trim();
    if joined.is_empty() {
        None
    } else {
        Some(decode_words(joined))
    }
}

/// Renders an address list as HTML, matching the markup mail clients expect
/// from parsed messages (`mp_address_*` spans, `mailto:` links).
#[must_use]
pub fn addresses_to_html(list: &[Address]) -> String {
    list.iter().map(address_to_html).collect::<Vec<_>>().join(", ")
}

fn address_to_html(address: &Address) -> String {
    let mut out = String::from("<span class=\"mp_address_group\">");
    if let Some(name) = &address.name {
        out.push_str("<span class=\"mp_address_name\">");
        out.push_str(&escape_html(name));
        if address.group.is_some() {
            out.push_str(": ");
        }
        out.push_str("</span>");
    }
    if let Some(addr) = &address.address {
        let escaped = escape_html(addr);
        let link = format!("<a href=\"mailto:{escaped}\" class=\"mp_address_email\">{escaped}</a>");
        if address.name.is_some() {
            out.push_str(" &lt;");
            out.push_str(&link);
            out.push_str("&gt;");
        } else {
            out.push_str(&link);
        }
    }
    if let Some(group) = &address.group {
        out.push_str(&addresses_to_html(group));
        out.push(';');
    }
    out.push_str("</span>");
    out
}

/// Renders an address list as plain text (`Name <addr>, ...`).
#[must_use]
pub fn addresses_to_text(list: &[Address]) -> String {
    list.iter().map(address_to_text).collect::<Vec<_>>().join(", ")
}

fn address_to_text(address: &Address) -> String {
    let mut out = String::new();
    if let Some(name) = &address.name {
        out.push_str(name);
        if address.group.is_some() {
            out.push_str(": ");
        }
    }
    if let Some(addr) = &address.address {
        if address.name.is_some() {
            out.push_str(" <");
            out.push_str(addr);
            out.push('>');
        } else {
            out.push_str(addr);
        }
    }
    if let Some(group) = &address.group {
        out.push_str(&addresses_to_text(group));
        out.push(';');
    }
    out
}
