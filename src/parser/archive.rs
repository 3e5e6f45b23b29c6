//! Archive reader: loads a whole archive into one text buffer.
//!
//! UTF-8 is tried first. If the bytes are not valid UTF-8 the configured
//! single-byte fallback encoding is used instead.

use std::path::Path;

use encoding_rs::Encoding;
use tracing::{debug, warn};

use crate::error::{MboxError, Result};

/// Fallback used when none is configured (a superset of ISO-8859-1).
pub const DEFAULT_FALLBACK_ENCODING: &str = "windows-1252";

/// Reads archives from disk as text.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveReader {
    fallback: &'static Encoding,
}

impl Default for ArchiveReader {
    fn default() -> Self {
        Self {
            fallback: encoding_rs::WINDOWS_1252,
        }
    }
}

impl ArchiveReader {
    /// Reader with the given fallback encoding label (e.g. `"latin1"`, `"iso-8859-15"`).
    ///
    /// Unknown labels fall back to the default encoding with a warning.
    pub fn with_fallback(label: &str) -> Self {
        match Encoding::for_label(label.as_bytes()) {
            Some(fallback) => Self { fallback },
            None => {
                warn!(
                    label = label,
                    "Unknown fallback encoding, using {DEFAULT_FALLBACK_ENCODING}"
                );
                Self::default()
            }
        }
    }

    /// Name of the fallback encoding in use.
    pub fn fallback_name(&self) -> &'static str {
        self.fallback.name()
    }

    /// Read the full archive at `path`.
    ///
    /// Fails with [`MboxError::FileNotFound`] before any read is attempted if
    /// the path does not exist, and with [`MboxError::ReadError`] if neither
    /// encoding can decode the content.
    pub fn read(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MboxError::FileNotFound(path.to_path_buf()));
        }

        let bytes = std::fs::read(path).map_err(|e| MboxError::io(path, e))?;
        self.decode(&bytes).ok_or_else(|| MboxError::ReadError {
            path: path.to_path_buf(),
            reason: format!("not valid UTF-8 or {}", self.fallback.name()),
        })
    }

    /// Decode raw archive bytes. Returns `None` when both attempts fail.
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

        if let Ok(text) = std::str::from_utf8(bytes) {
            return Some(text.to_string());
        }

        debug!(
            encoding = self.fallback.name(),
            "Archive is not UTF-8, retrying with fallback"
        );
        self.fallback
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(|text| text.into_owned())
    }
}
