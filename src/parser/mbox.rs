//! MBOX message splitter.
//!
//! Cuts an in-memory archive into one raw chunk per message. A message starts
//! at the beginning of the text or right after a newline followed by `From `.
//! Body lines that genuinely begin with `From ` are only safe when the archive
//! quotes them (`>From `); see [`escape_from_lines`].

use tracing::debug;

use crate::error::Result;
use crate::progress::{CancelToken, Progress, ProgressSink};

/// Boundary marker between two messages.
const SEPARATOR: &str = "\nFrom ";

/// Lazy iterator over the raw message chunks of an archive.
///
/// Each chunk keeps its leading `From ` envelope line. Chunks consisting only
/// of whitespace are skipped.
#[derive(Debug, Clone)]
pub struct MboxChunks<'a> {
    remaining: &'a str,
}

impl<'a> MboxChunks<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { remaining: text }
    }
}

impl<'a> Iterator for MboxChunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        while !self.remaining.is_empty() {
            let (chunk, rest) = match self.remaining.find(SEPARATOR) {
                // Keep the newline with the current chunk, `From ` with the next
                Some(pos) => self.remaining.split_at(pos + 1),
                None => (self.remaining, ""),
            };
            self.remaining = rest;
            if !chunk.trim().is_empty() {
                return Some(chunk);
            }
        }
        None
    }
}

/// Split an archive into raw message chunks.
pub fn split_messages(text: &str) -> Vec<&str> {
    MboxChunks::new(text).collect()
}

/// Walks the chunks of an archive with cancellation and progress reporting.
#[derive(Debug, Clone, Default)]
pub struct MessageSplitter {
    cancel: CancelToken,
}

impl MessageSplitter {
    pub fn new(cancel: CancelToken) -> Self {
        Self { cancel }
    }

    /// Call `chunk_callback(index, chunk)` for every chunk, in order.
    ///
    /// The cancellation token is polled before each chunk; once it is set the
    /// remaining chunks are abandoned and [`crate::error::MboxError::Cancelled`]
    /// is returned. A progress event (chunks processed / total) follows each chunk.
    ///
    /// Returns the number of chunks visited.
    pub fn for_each_chunk(
        &self,
        text: &str,
        chunk_callback: &mut dyn FnMut(usize, &str),
        progress: &dyn ProgressSink,
    ) -> Result<usize> {
        let chunks = split_messages(text);
        let total = chunks.len();
        debug!(total = total, "Split archive into chunks");

        for (idx, chunk) in chunks.into_iter().enumerate() {
            self.cancel.check()?;
            chunk_callback(idx, chunk);
            progress.report(&Progress::new(
                idx + 1,
                total,
                format!("Parsed {} of {} messages", idx + 1, total),
            ));
        }

        Ok(total)
    }
}

/// Quote body lines that would be read as a message boundary (mboxrd).
///
/// Every line matching `^>*From ` gains one leading `>`.
pub fn escape_from_lines(body: &str) -> String {
    map_lines(body, |line| {
        if is_from_line(line) {
            Some(format!(">{line}"))
        } else {
            None
        }
    })
}

/// Reverse of [`escape_from_lines`]: every line matching `^>+From ` loses one `>`.
pub fn unescape_from_lines(body: &str) -> String {
    map_lines(body, |line| {
        if line.starts_with('>') && is_from_line(line) {
            Some(line[1..].to_string())
        } else {
            None
        }
    })
}

/// `^>*From `
fn is_from_line(line: &str) -> bool {
    line.trim_start_matches('>').starts_with("From ")
}

/// Rebuild `text` line by line, replacing lines for which `f` returns `Some`.
/// Line terminators are preserved.
fn map_lines(text: &str, f: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        let content = line.trim_end_matches(['\n', '\r']);
        match f(content) {
            Some(replaced) => {
                out.push_str(&replaced);
                out.push_str(&line[content.len()..]);
            }
            None => out.push_str(line),
        }
    }
    out
}
