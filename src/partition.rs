//! Splitting an ordered message collection into groups.
//!
//! [`partition`] is a pure function: it never reorders messages within a
//! group and never touches the filesystem. Writing the groups out is done by
//! [`crate::export::split`].

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MboxError, Result};
use crate::model::mail::MailMessage;

/// Truncation applied to parsed dates when bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateGranularity {
    Day,
    Month,
    Year,
}

impl DateGranularity {
    /// Bucket key for a date: `2024-03-07`, `2024-03` or `2024`.
    pub fn bucket(self, date: &DateTime<Utc>) -> String {
        match self {
            Self::Day => date.format("%Y-%m-%d").to_string(),
            Self::Month => format!("{:04}-{:02}", date.year(), date.month()),
            Self::Year => format!("{:04}", date.year()),
        }
    }
}

/// What happens to messages without a parsed date under date bucketing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndatedPolicy {
    /// Leave them out of every group.
    #[default]
    Drop,
    /// Collect them in a trailing [`PartitionLabel::Undated`] group.
    Bucket,
}

/// How to split a message collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionStrategy {
    /// Consecutive runs of at most `n` messages.
    ByCount(usize),
    /// Greedy runs whose summed estimated size stays within the cap.
    BySize(u64),
    /// One group per date bucket.
    ByDate {
        granularity: DateGranularity,
        undated: UndatedPolicy,
    },
    /// One group per matching domain (first match wins), plus an "other" group.
    ByDomain(Vec<String>),
}

/// Tag attached to each group.
///
/// The derived ordering is the iteration order of keyed strategies: named
/// buckets sort by key and come before `Other` and `Undated`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PartitionLabel {
    /// Position of the group, starting at 1.
    Sequence(usize),
    /// Position of the group under size bounding, starting at 1.
    Size(usize),
    Date(String),
    Domain(String),
    Other,
    Undated,
}

impl PartitionLabel {
    /// File-name friendly form of the label.
    ///
    /// Domain labels carry a `domain-` prefix so they never read as `other`
    /// or `undated`. Sanitizing can still map distinct labels to the same
    /// text; writers must check for that.
    pub fn file_component(&self) -> String {
        let raw = match self {
            Self::Sequence(n) => format!("part{n:03}"),
            Self::Size(n) => format!("size{n:03}"),
            Self::Date(key) => key.clone(),
            Self::Domain(domain) => format!("domain-{domain}"),
            Self::Other => "other".to_string(),
            Self::Undated => "undated".to_string(),
        };
        raw.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl fmt::Display for PartitionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequence(n) => write!(f, "part {n}"),
            Self::Size(n) => write!(f, "size group {n}"),
            Self::Date(key) => write!(f, "{key}"),
            Self::Domain(domain) => write!(f, "{domain}"),
            Self::Other => write!(f, "other"),
            Self::Undated => write!(f, "undated"),
        }
    }
}

/// An ordered subset of the input, tagged with its label.
#[derive(Debug, Clone)]
pub struct PartitionGroup<'a> {
    pub label: PartitionLabel,
    pub messages: Vec<&'a MailMessage>,
}

impl PartitionGroup<'_> {
    /// Summed [`MailMessage::estimated_size`] of the group.
    pub fn estimated_size(&self) -> u64 {
        self.messages.iter().map(|m| m.estimated_size()).sum()
    }
}

/// Split `messages` into groups according to `strategy`.
///
/// Input order is preserved inside every group. Count and size groups come
/// out in input order; date and domain groups in label order.
pub fn partition<'a>(
    messages: &'a [MailMessage],
    strategy: &PartitionStrategy,
) -> Result<Vec<PartitionGroup<'a>>> {
    match strategy {
        PartitionStrategy::ByCount(n) => by_count(messages, *n),
        PartitionStrategy::BySize(max_bytes) => by_size(messages, *max_bytes),
        PartitionStrategy::ByDate {
            granularity,
            undated,
        } => Ok(by_date(messages, *granularity, *undated)),
        PartitionStrategy::ByDomain(domains) => Ok(by_domain(messages, domains)),
    }
}

fn by_count(messages: &[MailMessage], n: usize) -> Result<Vec<PartitionGroup<'_>>> {
    if n == 0 {
        return Err(MboxError::InvalidFormat(
            "messages per group must be at least 1".into(),
        ));
    }
    Ok(messages
        .chunks(n)
        .enumerate()
        .map(|(i, chunk)| PartitionGroup {
            label: PartitionLabel::Sequence(i + 1),
            messages: chunk.iter().collect(),
        })
        .collect())
}

fn by_size(messages: &[MailMessage], max_bytes: u64) -> Result<Vec<PartitionGroup<'_>>> {
    if max_bytes == 0 {
        return Err(MboxError::InvalidFormat(
            "maximum group size must be at least 1 byte".into(),
        ));
    }

    let mut runs: Vec<Vec<&MailMessage>> = Vec::new();
    let mut current: Vec<&MailMessage> = Vec::new();
    let mut current_size: u64 = 0;

    for msg in messages {
        let size = msg.estimated_size();
        if !current.is_empty() && current_size + size > max_bytes {
            runs.push(std::mem::take(&mut current));
            current_size = 0;
        }
        current.push(msg);
        current_size += size;
    }
    if !current.is_empty() {
        runs.push(current);
    }

    Ok(runs
        .into_iter()
        .enumerate()
        .map(|(i, messages)| PartitionGroup {
            label: PartitionLabel::Size(i + 1),
            messages,
        })
        .collect())
}

fn by_date(
    messages: &[MailMessage],
    granularity: DateGranularity,
    undated: UndatedPolicy,
) -> Vec<PartitionGroup<'_>> {
    keyed_groups(messages, |msg| match (&msg.date, undated) {
        (Some(date), _) => Some(PartitionLabel::Date(granularity.bucket(date))),
        (None, UndatedPolicy::Bucket) => Some(PartitionLabel::Undated),
        (None, UndatedPolicy::Drop) => None,
    })
}

fn by_domain<'a>(messages: &'a [MailMessage], domains: &[String]) -> Vec<PartitionGroup<'a>> {
    let wanted: Vec<(String, &String)> = domains
        .iter()
        .filter(|d| !d.trim().is_empty())
        .map(|d| (d.trim().to_lowercase(), d))
        .collect();

    keyed_groups(messages, |msg| {
        let label = msg
            .sender_domain()
            .and_then(|domain| {
                wanted
                    .iter()
                    .find(|(needle, _)| domain.contains(needle.as_str()))
                    .map(|(_, original)| PartitionLabel::Domain((*original).clone()))
            })
            .unwrap_or(PartitionLabel::Other);
        Some(label)
    })
}

/// Bucket messages by the label `key_of` returns; `None` excludes the message.
fn keyed_groups<'a>(
    messages: &'a [MailMessage],
    key_of: impl Fn(&MailMessage) -> Option<PartitionLabel>,
) -> Vec<PartitionGroup<'a>> {
    let mut buckets: BTreeMap<PartitionLabel, Vec<&'a MailMessage>> = BTreeMap::new();
    for msg in messages {
        if let Some(label) = key_of(msg) {
            buckets.entry(label).or_default().push(msg);
        }
    }
    buckets
        .into_iter()
        .map(|(label, messages)| PartitionGroup { label, messages })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn msg(sender: &str, body: &str, date: Option<DateTime<Utc>>) -> MailMessage {
        MailMessage {
            sender: sender.to_string(),
            recipient: None,
            subject: String::new(),
            date_raw: String::new(),
            date,
            body: body.to_string(),
            message_id: None,
            in_reply_to: None,
            references: None,
            attachments: None,
        }
    }

    fn at(y: i32, m: u32, d: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap())
    }

    fn senders(group: &PartitionGroup<'_>) -> Vec<String> {
        group.messages.iter().map(|m| m.sender.clone()).collect()
    }

    #[test]
    fn test_by_count_runs() {
        let messages: Vec<_> = (0..5).map(|i| msg(&format!("{i}@x"), "", None)).collect();
        let groups = partition(&messages, &PartitionStrategy::ByCount(2)).unwrap();
        assert_eq!(groups.len(), 3);
        assert_eq!(senders(&groups[0]), vec!["0@x", "1@x"]);
        assert_eq!(senders(&groups[2]), vec!["4@x"]);
        assert_eq!(groups[2].label, PartitionLabel::Sequence(3));
    }

    #[test]
    fn test_by_count_zero_is_rejected() {
        let err = partition(&[], &PartitionStrategy::ByCount(0)).unwrap_err();
        assert!(matches!(err, MboxError::InvalidFormat(_)));
    }

    #[test]
    fn test_by_size_greedy() {
        // Sizes 43, 43, 23 with a cap of 100
        let messages = vec![
            msg("a@x", &"a".repeat(40), None),
            msg("b@x", &"b".repeat(40), None),
            msg("c@x", &"c".repeat(20), None),
        ];
        let groups = partition(&messages, &PartitionStrategy::BySize(100)).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(senders(&groups[0]), vec!["a@x", "b@x"]);
        assert_eq!(groups[0].estimated_size(), 86);
        assert_eq!(senders(&groups[1]), vec!["c@x"]);
    }

    #[test]
    fn test_by_size_oversized_message_is_alone() {
        let messages = vec![
            msg("a@x", &"a".repeat(10), None),
            msg("b@x", &"b".repeat(147), None),
            msg("c@x", &"c".repeat(10), None),
        ];
        assert_eq!(messages[1].estimated_size(), 150);
        let groups = partition(&messages, &PartitionStrategy::BySize(100)).unwrap();
        assert_eq!(groups.len(), 3);
        assert_eq!(senders(&groups[1]), vec!["b@x"]);
    }

    #[test]
    fn test_by_date_month_buckets_sorted() {
        let messages = vec![
            msg("a@x", "", at(2024, 3, 5)),
            msg("b@x", "", at(2023, 12, 31)),
            msg("c@x", "", at(2024, 3, 20)),
            msg("d@x", "", None),
        ];
        let strategy = PartitionStrategy::ByDate {
            granularity: DateGranularity::Month,
            undated: UndatedPolicy::Drop,
        };
        let groups = partition(&messages, &strategy).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].label, PartitionLabel::Date("2023-12".into()));
        assert_eq!(groups[1].label, PartitionLabel::Date("2024-03".into()));
        assert_eq!(senders(&groups[1]), vec!["a@x", "c@x"]);
        let total: usize = groups.iter().map(|g| g.messages.len()).sum();
        assert_eq!(total, 3, "undated message is dropped");
    }

    #[test]
    fn test_by_date_undated_bucket_last() {
        let messages = vec![msg("d@x", "", None), msg("a@x", "", at(2024, 3, 5))];
        let strategy = PartitionStrategy::ByDate {
            granularity: DateGranularity::Year,
            undated: UndatedPolicy::Bucket,
        };
        let groups = partition(&messages, &strategy).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].label, PartitionLabel::Date("2024".into()));
        assert_eq!(groups[1].label, PartitionLabel::Undated);
    }

    #[test]
    fn test_granularity_buckets() {
        let date = at(2024, 3, 7).unwrap();
        assert_eq!(DateGranularity::Day.bucket(&date), "2024-03-07");
        assert_eq!(DateGranularity::Month.bucket(&date), "2024-03");
        assert_eq!(DateGranularity::Year.bucket(&date), "2024");
    }

    #[test]
    fn test_by_domain_first_match_and_other() {
        let messages = vec![
            msg("Ann <ann@Sales.ACME.com>", "", None),
            msg("bob@partner.org", "", None),
            msg("carl@acme.com", "", None),
            msg("no address", "", None),
        ];
        let strategy =
            PartitionStrategy::ByDomain(vec!["acme.com".into(), "sales.acme.com".into()]);
        let groups = partition(&messages, &strategy).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].label, PartitionLabel::Domain("acme.com".into()));
        assert_eq!(
            senders(&groups[0]),
            vec!["Ann <ann@Sales.ACME.com>", "carl@acme.com"]
        );
        assert_eq!(groups[1].label, PartitionLabel::Other);
        assert_eq!(groups[1].messages.len(), 2);
    }

    #[test]
    fn test_label_file_component() {
        assert_eq!(PartitionLabel::Sequence(7).file_component(), "part007");
        assert_eq!(
            PartitionLabel::Domain("Acme Corp/EU".into()).file_component(),
            "domain-Acme_Corp_EU"
        );
        assert_ne!(
            PartitionLabel::Domain("other".into()).file_component(),
            PartitionLabel::Other.file_component()
        );
        assert_eq!(PartitionLabel::Undated.file_component(), "undated");
    }
}
