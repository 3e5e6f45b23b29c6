//! Attachment detection without MIME decoding.
//!
//! [`HeuristicScanner`] looks for `Content-Type` headers that carry a
//! `name=`/`filename=` parameter anywhere in the raw message and estimates
//! base64 payload sizes from line lengths. No part is decoded. A real MIME
//! parser can replace it by implementing [`AttachmentScanner`].

use std::sync::LazyLock;

use regex::Regex;

use crate::model::attachment::AttachmentMeta;

/// A `Content-Type` header: group 1 is the type, group 2 the parameters
/// including folded continuation lines.
static RE_CONTENT_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^content-type:[ \t]*([^;\s]+)([^\r\n]*(?:\r?\n[ \t]+[^\r\n]*)*)")
        .expect("valid content-type regex")
});

static RE_NAME_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:^|[;\s])(?:file)?name\*?\s*=\s*(?:"([^"]*)"|([^;\s]+))"#)
        .expect("valid name regex")
});

static RE_BASE64: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)content-transfer-encoding:\s*base64").expect("valid encoding regex")
});

/// Decoded bytes per encoded base64 character.
const BASE64_RATIO: f64 = 0.75;

/// Finds attachment metadata in the raw text of one message.
pub trait AttachmentScanner {
    fn scan(&self, raw_message: &str) -> Vec<AttachmentMeta>;
}

/// Regex-based scanner over the raw message text.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicScanner;

impl AttachmentScanner for HeuristicScanner {
    fn scan(&self, raw_message: &str) -> Vec<AttachmentMeta> {
        let has_base64 = RE_BASE64.is_match(raw_message);
        let mut result = Vec::new();

        for caps in RE_CONTENT_TYPE.captures_iter(raw_message) {
            let content_type = caps[1].trim().to_lowercase();
            if content_type.contains("multipart") {
                continue;
            }
            let Some(filename) = name_param(&caps[2]) else {
                continue;
            };

            let estimated_size = if has_base64 {
                let end = caps.get(0).map_or(raw_message.len(), |m| m.end());
                estimate_base64_size(&raw_message[end..])
            } else {
                None
            };

            result.push(AttachmentMeta {
                filename,
                content_type,
                estimated_size,
            });
        }

        result
    }
}

/// Value of the first `name=` or `filename=` parameter.
fn name_param(params: &str) -> Option<String> {
    let caps = RE_NAME_PARAM.captures(params)?;
    let value = caps.get(1).or_else(|| caps.get(2))?.as_str().trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Estimate the decoded size of the payload that follows a part header.
///
/// `after_header` starts right after the `Content-Type` header. The rest of
/// the part header block is skipped; then the lengths of non-empty lines are
/// summed up to the next blank line or boundary marker and scaled by 3/4.
fn estimate_base64_size(after_header: &str) -> Option<u64> {
    let rest = after_header.split_once('\n').map_or("", |(_, r)| r);
    let mut lines = rest.lines();

    // Remaining headers of this part
    for line in lines.by_ref() {
        if line.trim().is_empty() {
            break;
        }
    }

    let encoded: usize = lines
        .map(str::trim)
        .take_while(|line| !line.is_empty() && !line.starts_with("--"))
        .map(str::len)
        .sum();

    if encoded == 0 {
        None
    } else {
        Some((encoded as f64 * BASE64_RATIO) as u64)
    }
}
