//! The ingestion and re-partitioning engine.
//!
//! An [`Engine`] is a plain value owned by its caller. It holds one
//! [`CancelToken`] plus reader and writer options. Two operations must not
//! run on the same engine at once; build one engine per concurrent operation.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::Config;
use crate::error::Result;
use crate::export::mbox::{self, MergeStats};
use crate::export::split::{self, SplitOutput};
use crate::model::mail::MailMessage;
use crate::parser::archive::ArchiveReader;
use crate::parser::mbox::MessageSplitter;
use crate::parser::message::MessageParser;
use crate::partition::{self, PartitionGroup, PartitionStrategy};
use crate::progress::{CancelToken, ProgressSink};
use crate::threading::{self, Thread};

/// Result of parsing an archive.
#[derive(Debug, Clone, Default)]
pub struct ParseReport {
    /// Parsed records, in archive order.
    pub messages: Vec<MailMessage>,
    /// Chunks that did not yield a record.
    pub dropped: usize,
}

/// Archive ingestion, threading, splitting and merging.
#[derive(Debug)]
pub struct Engine {
    cancel: CancelToken,
    reader: ArchiveReader,
    parser: MessageParser,
    escape_from: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            cancel: CancelToken::new(),
            reader: ArchiveReader::default(),
            parser: MessageParser::new(),
            escape_from: true,
        }
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine using the reader and wire-format settings from `config`.
    pub fn with_config(config: &Config) -> Self {
        let escape_from = config.mbox.escape_from_lines;
        Self {
            cancel: CancelToken::new(),
            reader: ArchiveReader::with_fallback(&config.reader.fallback_encoding),
            parser: MessageParser::new().unescape_from_lines(escape_from),
            escape_from,
        }
    }

    /// Replace the message parser (e.g. to plug in another attachment scanner).
    pub fn with_parser(mut self, parser: MessageParser) -> Self {
        self.parser = parser;
        self
    }

    /// A handle that cancels this engine's operations from elsewhere.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Request cancellation of the running operation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Read and parse the archive at `path`.
    pub fn load_archive(
        &self,
        path: impl AsRef<Path>,
        progress: &dyn ProgressSink,
    ) -> Result<ParseReport> {
        let path = path.as_ref();
        let text = self.reader.read(path)?;
        let report = self.parse_text(&text, progress)?;
        info!(
            path = %path.display(),
            messages = report.messages.len(),
            dropped = report.dropped,
            "Parsed archive"
        );
        Ok(report)
    }

    /// Parse archive text already in memory.
    ///
    /// Chunks that yield no record are counted in [`ParseReport::dropped`]
    /// rather than failing the whole parse.
    pub fn parse_text(&self, text: &str, progress: &dyn ProgressSink) -> Result<ParseReport> {
        let mut report = ParseReport::default();

        MessageSplitter::new(self.cancel.clone()).for_each_chunk(
            text,
            &mut |idx, chunk| match self.parser.parse(chunk) {
                Some(msg) => report.messages.push(msg),
                None => {
                    debug!(chunk = idx, "Dropping chunk without sender or subject");
                    report.dropped += 1;
                }
            },
            progress,
        )?;

        Ok(report)
    }

    /// Group messages into subject-based threads.
    pub fn threads<'a>(&self, messages: &'a [MailMessage]) -> Vec<Thread<'a>> {
        threading::detect_threads(messages)
    }

    /// Split messages into groups without writing anything.
    pub fn partition<'a>(
        &self,
        messages: &'a [MailMessage],
        strategy: &PartitionStrategy,
    ) -> Result<Vec<PartitionGroup<'a>>> {
        partition::partition(messages, strategy)
    }

    /// Split messages and write each group to `<out_dir>/<stem>_<label>.mbox`.
    pub fn split_to_dir(
        &self,
        messages: &[MailMessage],
        strategy: &PartitionStrategy,
        out_dir: &Path,
        stem: &str,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<SplitOutput>> {
        let groups = partition::partition(messages, strategy)?;
        split::write_groups(
            &groups,
            out_dir,
            stem,
            self.escape_from,
            &self.cancel,
            progress,
        )
    }

    /// Concatenate archive files into `output`.
    pub fn merge_files(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<MergeStats> {
        mbox::merge_files(inputs, output, &self.cancel, progress)
    }

    /// Sort records by date and write them to `output`.
    pub fn merge_messages(
        &self,
        messages: &[&MailMessage],
        output: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<MergeStats> {
        mbox::merge_messages(messages, output, self.escape_from, &self.cancel, progress)
    }
}
