//! The structured message record produced by the parser.

use chrono::{DateTime, Utc};

use super::address::EmailAddress;
use super::attachment::AttachmentMeta;

/// One message extracted from an archive.
///
/// Records are built once by [`crate::parser::message::MessageParser`] and
/// never mutated afterwards; ownership passes to the caller. A record always
/// has a non-empty `sender` or `subject`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MailMessage {
    /// Raw `From:` value, display name included.
    pub sender: String,

    /// Raw `To:` value, if present.
    pub recipient: Option<String>,

    /// `Subject:` value.
    pub subject: String,

    /// `Date:` value exactly as found in the archive.
    pub date_raw: String,

    /// Parsed `Date:`. `None` when no known format matched.
    pub date: Option<DateTime<Utc>>,

    /// Everything after the header block, newline-joined.
    pub body: String,

    /// The `Message-ID` header value.
    pub message_id: Option<String>,

    /// The `In-Reply-To` header value.
    pub in_reply_to: Option<String>,

    /// Whitespace-separated identifiers from `References`.
    pub references: Option<Vec<String>>,

    /// Attachments declared in the raw text. `None` when none were found.
    pub attachments: Option<Vec<AttachmentMeta>>,
}

impl MailMessage {
    /// The sender split into display name and address.
    pub fn sender_address(&self) -> EmailAddress {
        EmailAddress::parse(&self.sender)
    }

    /// Lowercased sender domain, if the sender carries one.
    pub fn sender_domain(&self) -> Option<String> {
        self.sender_address().domain()
    }

    /// Size estimate used by size-bounded splitting: the character count of
    /// body, subject, sender and recipient.
    pub fn estimated_size(&self) -> u64 {
        let chars = self.body.chars().count()
            + self.subject.chars().count()
            + self.sender.chars().count()
            + self.recipient.as_deref().map_or(0, |r| r.chars().count());
        chars as u64
    }

    /// Number of attachments detected.
    pub fn attachment_count(&self) -> usize {
        self.attachments.as_ref().map_or(0, Vec::len)
    }
}
