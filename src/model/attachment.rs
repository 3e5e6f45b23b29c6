//! Attachment metadata.
//!
//! Only what the raw headers declare is kept. No payload bytes are ever
//! decoded or stored.

/// Metadata about an attachment found in a raw message.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AttachmentMeta {
    /// Filename from the `name=` or `filename=` parameter.
    pub filename: String,

    /// Declared MIME content type (e.g. `"application/pdf"`).
    pub content_type: String,

    /// Estimated decoded size in bytes, derived from the base64 line lengths.
    /// `None` when the part is not base64-encoded.
    pub estimated_size: Option<u64>,
}
