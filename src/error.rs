//! Centralized error types for mboxcraft.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mboxcraft library.
#[derive(Error, Debug)]
pub enum MboxError {
    /// The source archive does not exist.
    #[error("MBOX file not found: {0}")]
    FileNotFound(PathBuf),

    /// The archive could not be decoded with the primary or the fallback encoding.
    #[error("Could not decode '{path}': {reason}")]
    ReadError { path: PathBuf, reason: String },

    /// I/O error while reading a source file.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// Structurally unrecoverable input, or an unusable split parameter.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// The destination could not be created or written.
    #[error("Cannot write '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias for `Result<T, MboxError>`.
pub type Result<T> = std::result::Result<T, MboxError>;

impl MboxError {
    /// Create a read-side error from a path and an `io::Error`.
    ///
    /// A missing file maps to [`MboxError::FileNotFound`].
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            return Self::FileNotFound(path);
        }
        Self::Io { path, source }
    }

    /// Create a [`MboxError::WriteError`] for a destination path.
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::WriteError {
            path: path.into(),
            source,
        }
    }
}
