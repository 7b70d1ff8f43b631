//! Lenient RFC 2822 date parsing.

use chrono::{DateTime, FixedOffset};

/// Parses a `Date:` header value.
///
/// Tries RFC 2822 first, then RFC 3339, after stripping parenthesized
/// comments like `(UTC)`. Returns `None` when nothing parses; callers
/// substitute the current time.
#[must_use]
pub fn parse_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let cleaned = strip_comments(value);
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }

    if let Ok(date) = DateTime::parse_from_rfc2822(cleaned) {
        return Some(date);
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(cleaned) {
        return Some(date);
    }
    // obsolete two-digit years and stray weekday commas trip chrono; retry
    // without the leading weekday
    if let Some((_, rest)) = cleaned.split_once(',') {
        if let Ok(date) = DateTime::parse_from_rfc2822(rest.trim()) {
            return Some(date);
        }
    }
    None
}

fn strip_comments(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut depth = 0u32;
    for c in value.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_rfc2822() {
        let date = parse_date("Thu, 15 May 2014 11:53:30 +0100").unwrap();
        assert_eq!(date.year(), 2014);
        assert_eq!(date.month(), 5);
        assert_eq!(date.hour(), 11);
    }

    #[test]
    fn test_parse_with_comment() {
        let date = parse_date("Thu, 15 May 2014 11:53:30 +0000 (UTC)").unwrap();
        assert_eq!(date.day(), 15);
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_date("not a date").is_none());
        assert!(parse_date("").is_none());
    }
}
