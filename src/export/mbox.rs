//! MBOX serialization and merging.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{MboxError, Result};
use crate::model::mail::MailMessage;
use crate::parser::mbox::escape_from_lines;
use crate::progress::{CancelToken, Progress, ProgressSink};

/// Envelope timestamp used when a message has no parsed date.
const UNKNOWN_ENVELOPE_DATE: &str = "Thu Jan  1 00:00:00 1970";

/// Envelope sender used when a message has no sender address.
const UNKNOWN_ENVELOPE_SENDER: &str = "MAILER-DAEMON";

/// Statistics returned by a merge operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeStats {
    /// Files (file-level merge) or records (record-level merge) consumed.
    pub inputs: usize,
    /// Messages written, counted by envelope lines for file-level merges.
    pub messages: usize,
    /// Size of the output file in bytes.
    pub output_size: u64,
}

/// Writes [`MailMessage`] records in MBOX wire format.
pub struct MboxWriter<W: Write> {
    out: W,
    escape_from: bool,
}

impl<W: Write> MboxWriter<W> {
    /// Writer that quotes `From ` body lines (mboxrd).
    pub fn new(out: W) -> Self {
        Self {
            out,
            escape_from: true,
        }
    }

    /// Enable or disable quoting of `From ` body lines.
    pub fn escape_from_lines(mut self, enabled: bool) -> Self {
        self.escape_from = enabled;
        self
    }

    /// Serialize one message: envelope line, headers, blank line, body and a
    /// trailing blank line.
    pub fn write_message(&mut self, msg: &MailMessage) -> std::io::Result<()> {
        writeln!(self.out, "{}", envelope_line(msg))?;
        writeln!(self.out, "From: {}", msg.sender)?;
        if let Some(to) = &msg.recipient {
            writeln!(self.out, "To: {to}")?;
        }
        writeln!(self.out, "Subject: {}", msg.subject)?;
        writeln!(self.out, "Date: {}", date_header(msg))?;
        if let Some(id) = &msg.message_id {
            writeln!(self.out, "Message-ID: {id}")?;
        }
        if let Some(id) = &msg.in_reply_to {
            writeln!(self.out, "In-Reply-To: {id}")?;
        }
        if let Some(refs) = msg.references.as_ref().filter(|r| !r.is_empty()) {
            writeln!(self.out, "References: {}", refs.join(" "))?;
        }
        writeln!(self.out)?;

        if self.escape_from {
            self.out.write_all(escape_from_lines(&msg.body).as_bytes())?;
        } else {
            self.out.write_all(msg.body.as_bytes())?;
        }
        self.out.write_all(b"\n\n")
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Serialize one message to a string.
pub fn to_mbox_string(msg: &MailMessage, escape_from: bool) -> String {
    let mut writer = MboxWriter::new(Vec::new()).escape_from_lines(escape_from);
    // Writing to a Vec cannot fail
    let _ = writer.write_message(msg);
    String::from_utf8_lossy(&writer.into_inner()).into_owned()
}

/// `From <address> <asctime>`
fn envelope_line(msg: &MailMessage) -> String {
    let address = msg.sender_address().address;
    let address = address
        .split_whitespace()
        .next()
        .unwrap_or(UNKNOWN_ENVELOPE_SENDER);
    let when = msg.date.map_or_else(
        || UNKNOWN_ENVELOPE_DATE.to_string(),
        |d| d.format("%a %b %e %H:%M:%S %Y").to_string(),
    );
    format!("From {address} {when}")
}

/// Original `Date:` text, or the parsed date rendered as RFC 2822.
fn date_header(msg: &MailMessage) -> String {
    if !msg.date_raw.is_empty() {
        return msg.date_raw.clone();
    }
    msg.date.map(|d| d.to_rfc2822()).unwrap_or_default()
}

/// Open a destination for writing, mapping failures to [`MboxError::WriteError`].
pub(crate) fn create_output(path: &Path) -> Result<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| MboxError::write(path, e))
}

/// The first input that resolves to the same file as `output`.
fn input_matching_output<'a>(inputs: &'a [PathBuf], output: &Path) -> Result<Option<&'a PathBuf>> {
    let Some(target) = resolve_output(output) else {
        return Ok(None);
    };
    for input in inputs {
        let resolved = input.canonicalize().map_err(|e| MboxError::io(input, e))?;
        if resolved == target {
            return Ok(Some(input));
        }
    }
    Ok(None)
}

/// Canonical form of a destination that may not exist yet.
fn resolve_output(output: &Path) -> Option<PathBuf> {
    if let Ok(path) = output.canonicalize() {
        return Some(path);
    }
    let name = output.file_name()?;
    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    parent.canonicalize().ok().map(|dir| dir.join(name))
}

/// Concatenate archive files byte for byte, in order, with a newline between files.
///
/// Inputs are neither parsed nor validated; a malformed input ends up in the
/// output as is. All inputs must exist, and none may be the output itself,
/// before the output is created.
pub fn merge_files(
    inputs: &[PathBuf],
    output: &Path,
    cancel: &CancelToken,
    progress: &dyn ProgressSink,
) -> Result<MergeStats> {
    if let Some(missing) = inputs.iter().find(|p| !p.exists()) {
        return Err(MboxError::FileNotFound(missing.clone()));
    }
    if let Some(clash) = input_matching_output(inputs, output)? {
        return Err(MboxError::InvalidFormat(format!(
            "output '{}' is also an input ('{}')",
            output.display(),
            clash.display()
        )));
    }

    let mut out = create_output(output)?;
    let total = inputs.len();
    let mut messages = 0usize;

    for (idx, input) in inputs.iter().enumerate() {
        cancel.check()?;

        let data = std::fs::read(input).map_err(|e| MboxError::io(input, e))?;
        messages += count_envelopes(&data);

        if idx > 0 {
            out.write_all(b"\n").map_err(|e| MboxError::write(output, e))?;
        }
        out.write_all(&data)
            .map_err(|e| MboxError::write(output, e))?;

        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| input.display().to_string());
        progress.report(&Progress::new(idx + 1, total, format!("Merged {name}")));
    }

    out.flush().map_err(|e| MboxError::write(output, e))?;
    let stats = finish_stats(output, total, messages)?;
    info!(
        output = %output.display(),
        inputs = stats.inputs,
        messages = stats.messages,
        "Merged archive files"
    );
    Ok(stats)
}

/// Sort records by parsed date and write them to one archive.
///
/// Records without a parsed date count as the earliest; ties keep input order.
pub fn merge_messages(
    messages: &[&MailMessage],
    output: &Path,
    escape_from: bool,
    cancel: &CancelToken,
    progress: &dyn ProgressSink,
) -> Result<MergeStats> {
    let mut sorted: Vec<&MailMessage> = messages.to_vec();
    sorted.sort_by_key(|m| m.date);

    let mut writer = MboxWriter::new(create_output(output)?).escape_from_lines(escape_from);
    let total = sorted.len();

    for (idx, msg) in sorted.iter().enumerate() {
        cancel.check()?;
        writer
            .write_message(msg)
            .map_err(|e| MboxError::write(output, e))?;
        progress.report(&Progress::new(
            idx + 1,
            total,
            format!("Wrote {} of {} messages", idx + 1, total),
        ));
    }

    writer.flush().map_err(|e| MboxError::write(output, e))?;
    let stats = finish_stats(output, total, total)?;
    info!(
        output = %output.display(),
        messages = stats.messages,
        "Merged message records"
    );
    Ok(stats)
}

fn finish_stats(output: &Path, inputs: usize, messages: usize) -> Result<MergeStats> {
    let output_size = std::fs::metadata(output)
        .map_err(|e| MboxError::write(output, e))?
        .len();
    Ok(MergeStats {
        inputs,
        messages,
        output_size,
    })
}

/// Count envelope lines (`From ` at the start of the data or after a newline).
fn count_envelopes(data: &[u8]) -> usize {
    let leading = usize::from(data.starts_with(b"From "));
    leading + data.windows(6).filter(|w| *w == b"\nFrom ").count()
}
