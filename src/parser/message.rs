//! Turns one raw message chunk into a [`MailMessage`].

use crate::model::mail::MailMessage;
use crate::parser::header::{self, get_header};
use crate::parser::mbox::unescape_from_lines;
use crate::parser::mime::{AttachmentScanner, HeuristicScanner};

/// Parser for single raw message chunks.
///
/// Attachment detection is delegated to an [`AttachmentScanner`];
/// [`HeuristicScanner`] is used by default.
pub struct MessageParser {
    scanner: Box<dyn AttachmentScanner + Send + Sync>,
    unescape_from: bool,
}

impl Default for MessageParser {
    fn default() -> Self {
        Self {
            scanner: Box::new(HeuristicScanner),
            unescape_from: true,
        }
    }
}

impl std::fmt::Debug for MessageParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageParser")
            .field("unescape_from", &self.unescape_from)
            .finish_non_exhaustive()
    }
}

impl MessageParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the attachment scanner.
    pub fn with_scanner(mut self, scanner: impl AttachmentScanner + Send + Sync + 'static) -> Self {
        self.scanner = Box::new(scanner);
        self
    }

    /// Whether quoted `>From ` body lines lose one `>` (mboxrd). On by default.
    pub fn unescape_from_lines(mut self, enabled: bool) -> Self {
        self.unescape_from = enabled;
        self
    }

    /// Parse one raw chunk.
    ///
    /// Headers are the lines before the first blank line (after the optional
    /// `From ` envelope line); the rest is the body. Returns `None` when both
    /// sender and subject are empty, which is how boundary artifacts show up.
    pub fn parse(&self, raw: &str) -> Option<MailMessage> {
        let mut lines = raw.lines().peekable();
        if lines.peek().is_some_and(|l| l.starts_with("From ")) {
            lines.next();
        }

        let header_lines: Vec<&str> = lines
            .by_ref()
            .take_while(|line| !line.trim().is_empty())
            .collect();
        let headers = header::unfold_headers(header_lines);

        let sender = get_header(&headers, "from").unwrap_or_default().to_string();
        let subject = get_header(&headers, "subject")
            .unwrap_or_default()
            .to_string();
        if sender.is_empty() && subject.is_empty() {
            return None;
        }

        let body = lines.collect::<Vec<_>>().join("\n");
        let body = body.trim_end_matches(['\n', '\r']);
        let body = if self.unescape_from {
            unescape_from_lines(body)
        } else {
            body.to_string()
        };

        let date_raw = get_header(&headers, "date").unwrap_or_default().to_string();
        let date = header::parse_date(&date_raw);

        let references = get_header(&headers, "references")
            .map(header::split_references)
            .filter(|refs| !refs.is_empty());

        let attachments = self.scanner.scan(raw);

        Some(MailMessage {
            sender,
            recipient: non_empty(get_header(&headers, "to")),
            subject,
            date_raw,
            date,
            body,
            message_id: non_empty(get_header(&headers, "message-id")),
            in_reply_to: non_empty(get_header(&headers, "in-reply-to")),
            references,
            attachments: if attachments.is_empty() {
                None
            } else {
                Some(attachments)
            },
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(String::from)
}
