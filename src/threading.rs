//! Subject-based conversation grouping.
//!
//! Messages whose subjects are equal after lowercasing and stripping reply
//! and forward prefixes form one thread. `Message-ID`, `In-Reply-To` and
//! `References` are not consulted.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use crate::model::mail::MailMessage;

/// Reply and forward markers stripped from the front of a subject.
const SUBJECT_PREFIXES: [&str; 4] = ["re:", "fwd:", "fw:", "aw:"];

/// A conversation: every message sharing one normalized subject.
#[derive(Debug, Clone)]
pub struct Thread<'a> {
    /// Normalized subject shared by all messages.
    pub key: String,
    /// Messages ordered by parsed date; undated ones first, ties keep input order.
    pub messages: Vec<&'a MailMessage>,
    /// Distinct sender addresses, lowercased.
    pub participants: BTreeSet<String>,
    /// Oldest and newest parsed date, if any message has one.
    pub date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl<'a> Thread<'a> {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Subject of the earliest message, as written.
    pub fn subject(&self) -> &str {
        self.messages.first().map_or("", |m| m.subject.as_str())
    }

    /// `Message-ID`s of the messages that carry one.
    pub fn message_ids(&self) -> Vec<&'a str> {
        self.messages
            .iter()
            .filter_map(|m| m.message_id.as_deref())
            .collect()
    }
}

/// Group messages into threads.
///
/// Threads are returned largest first. Threads of equal size keep the order
/// in which their first message appears in `messages`, so identical input
/// always yields identical output.
pub fn detect_threads(messages: &[MailMessage]) -> Vec<Thread<'_>> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<&MailMessage>> = HashMap::new();

    for msg in messages {
        let key = normalize_subject(&msg.subject);
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(msg);
    }

    let mut threads: Vec<Thread<'_>> = order
        .into_iter()
        .filter_map(|key| {
            let members = groups.remove(&key)?;
            Some(build_thread(key, members))
        })
        .collect();

    // Stable: equal counts keep first-appearance order
    threads.sort_by(|a, b| b.len().cmp(&a.len()));
    threads
}

fn build_thread(key: String, mut messages: Vec<&MailMessage>) -> Thread<'_> {
    messages.sort_by_key(|m| m.date);

    let participants = messages
        .iter()
        .map(|m| m.sender_address().address.to_lowercase())
        .filter(|a| !a.is_empty())
        .collect();

    let mut dates = messages.iter().filter_map(|m| m.date);
    let date_range = dates.next().map(|first| {
        dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)))
    });

    Thread {
        key,
        messages,
        participants,
        date_range,
    }
}

/// Normalize a subject into a thread key.
///
/// Lowercases, then repeatedly strips a leading `re:`, `fwd:`, `fw:` or `aw:`
/// marker and surrounding whitespace.
pub fn normalize_subject(subject: &str) -> String {
    let lower = subject.to_lowercase();
    let mut s = lower.trim();
    while let Some(rest) = SUBJECT_PREFIXES
        .iter()
        .find_map(|prefix| s.strip_prefix(prefix))
    {
        s = rest.trim();
    }
    s.to_string()
}
