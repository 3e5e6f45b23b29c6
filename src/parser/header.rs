//! Header block handling: unfolding, lookup, and legacy date parsing.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::debug;

/// Date patterns tried in order after RFC 2822 and RFC 3339.
///
/// Applied to the date with any leading weekday removed.
const DATE_FORMATS: &[&str] = &[
    "%d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M %z",
    "%d %b %Y %H:%M:%S",
    "%d %b %y %H:%M:%S %z",
    "%b %d %H:%M:%S %Y",
    "%b %e %H:%M:%S %Y",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

const WEEKDAYS: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const NAMED_ZONES: &[(&str, &str)] = &[
    ("EST", "-0500"),
    ("EDT", "-0400"),
    ("CST", "-0600"),
    ("CDT", "-0500"),
    ("MST", "-0700"),
    ("MDT", "-0600"),
    ("PST", "-0800"),
    ("PDT", "-0700"),
    ("GMT", "+0000"),
    ("UTC", "+0000"),
    ("UT", "+0000"),
    ("CEST", "+0200"),
    ("CET", "+0100"),
    ("BST", "+0100"),
    ("JST", "+0900"),
];

/// Unfold a header block into `(lowercase_name, value)` pairs.
///
/// Continuation lines (leading space or tab) are appended to the previous
/// header. Lines without a colon are skipped.
pub fn unfold_headers<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in lines {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                if !last.1.is_empty() {
                    last.1.push(' ');
                }
                last.1.push_str(line.trim());
            }
        } else if let Some((name, value)) = line.split_once(':') {
            result.push((name.trim().to_lowercase(), value.trim().to_string()));
        }
    }

    result
}

/// First value for a lowercase header name.
pub fn get_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

/// Split a `References` value on whitespace.
pub fn split_references(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(String::from).collect()
}

/// Parse a `Date:` value written in any of the common legacy formats.
///
/// Returns `None` when nothing matches; callers keep the raw string.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    let no_dow = strip_comment(strip_day_of_week(trimmed));
    let candidates = [
        no_dow.clone(),
        normalize_imap_date(&no_dow),
        replace_named_tz(&no_dow),
        replace_named_tz(&normalize_imap_date(&no_dow)),
    ];

    for candidate in &candidates {
        if let Some(dt) = parse_with_formats(candidate) {
            return Some(dt);
        }
    }

    if let Some(dt) = mail_parser_date(trimmed) {
        return Some(dt);
    }

    debug!(date = trimmed, "Could not parse date");
    None
}

fn parse_with_formats(candidate: &str) -> Option<DateTime<Utc>> {
    for fmt in DATE_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(candidate, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(ndt) = NaiveDateTime::parse_from_str(candidate, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }
    None
}

/// Last resort: let `mail-parser` read the value as a `Date:` header.
fn mail_parser_date(input: &str) -> Option<DateTime<Utc>> {
    use mail_parser::MessageParser;

    let fake_msg = format!("Date: {input}\n\n");
    let parsed = MessageParser::default().parse(fake_msg.as_bytes())?;
    let dt = parsed.date()?.to_rfc3339();
    DateTime::parse_from_rfc3339(&dt)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Remove a leading weekday (`"Thu, "`, `"Thursday "`), any case.
fn strip_day_of_week(s: &str) -> &str {
    let Some(first) = s.split([',', ' ']).next() else {
        return s;
    };
    let lower = first.to_lowercase();
    if first.len() >= 3 && WEEKDAYS.iter().any(|d| lower.starts_with(d)) {
        s[first.len()..].trim_start_matches([',', ' ']).trim_start()
    } else {
        s
    }
}

/// Drop a trailing RFC 5322 comment such as `"(UTC)"` or `"(CET)"`.
fn strip_comment(s: &str) -> String {
    match s.find('(') {
        Some(pos) if s.trim_end().ends_with(')') => s[..pos].trim_end().to_string(),
        _ => s.to_string(),
    }
}

/// IMAP style `"16-JUL-2025 03:01:03"` → `"16 Jul 2025 03:01:03"`.
fn normalize_imap_date(s: &str) -> String {
    let mut parts = s.splitn(2, ' ');
    let date = parts.next().unwrap_or_default();
    let rest = parts.next();

    let fields: Vec<&str> = date.split('-').collect();
    if fields.len() != 3 {
        return s.to_string();
    }
    let Some(month) = MONTHS
        .iter()
        .find(|m| m.eq_ignore_ascii_case(fields[1]))
    else {
        return s.to_string();
    };

    match rest {
        Some(rest) => format!("{} {} {} {}", fields[0], month, fields[2], rest),
        None => format!("{} {} {}", fields[0], month, fields[2]),
    }
}

/// Replace a trailing timezone abbreviation with its numeric offset.
fn replace_named_tz(s: &str) -> String {
    let Some((head, zone)) = s.rsplit_once(' ') else {
        return s.to_string();
    };
    NAMED_ZONES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(zone))
        .map(|(_, offset)| format!("{head} {offset}"))
        .unwrap_or_else(|| s.to_string())
}
