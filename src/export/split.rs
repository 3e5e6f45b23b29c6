//! Write partition groups to one archive file each.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{MboxError, Result};
use crate::export::mbox::{create_output, MboxWriter};
use crate::partition::{PartitionGroup, PartitionLabel};
use crate::progress::{CancelToken, Progress, ProgressSink};

/// One archive written by a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOutput {
    pub label: PartitionLabel,
    pub path: PathBuf,
    pub messages: usize,
}

/// Output path for a group: `<dir>/<stem>_<label>.mbox`.
pub fn output_path(out_dir: &Path, stem: &str, label: &PartitionLabel) -> PathBuf {
    out_dir.join(format!("{stem}_{}.mbox", label.file_component()))
}

/// Output path for a group that is not in `taken`.
///
/// When two labels sanitize to the same file name, the later one gets a
/// `_2`, `_3`, ... suffix.
fn unique_output_path(
    out_dir: &Path,
    stem: &str,
    label: &PartitionLabel,
    taken: &HashSet<PathBuf>,
) -> PathBuf {
    let path = output_path(out_dir, stem, label);
    if !taken.contains(&path) {
        return path;
    }
    let component = label.file_component();
    let path = (2..)
        .map(|n| out_dir.join(format!("{stem}_{component}_{n}.mbox")))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or(path);
    warn!(
        label = %label,
        path = %path.display(),
        "Output name already used, writing group under a suffixed name"
    );
    path
}

/// Write every group, in order, to its own archive under `out_dir`.
///
/// Messages keep their order inside the group, and no two groups share a
/// file. Cancellation is polled once per message; one progress event follows
/// each finished group.
pub fn write_groups(
    groups: &[PartitionGroup<'_>],
    out_dir: &Path,
    stem: &str,
    escape_from: bool,
    cancel: &CancelToken,
    progress: &dyn ProgressSink,
) -> Result<Vec<SplitOutput>> {
    std::fs::create_dir_all(out_dir).map_err(|e| MboxError::write(out_dir, e))?;

    let total = groups.len();
    let mut outputs = Vec::with_capacity(total);
    let mut taken: HashSet<PathBuf> = HashSet::with_capacity(total);

    for (idx, group) in groups.iter().enumerate() {
        let path = unique_output_path(out_dir, stem, &group.label, &taken);
        taken.insert(path.clone());
        let mut writer = MboxWriter::new(create_output(&path)?).escape_from_lines(escape_from);

        for msg in &group.messages {
            cancel.check()?;
            writer
                .write_message(msg)
                .map_err(|e| MboxError::write(&path, e))?;
        }
        writer.flush().map_err(|e| MboxError::write(&path, e))?;

        progress.report(&Progress::new(
            idx + 1,
            total,
            format!("Wrote {} ({} messages)", group.label, group.messages.len()),
        ));
        outputs.push(SplitOutput {
            label: group.label.clone(),
            path,
            messages: group.messages.len(),
        });
    }

    info!(
        dir = %out_dir.display(),
        files = outputs.len(),
        "Split archive written"
    );
    Ok(outputs)
}
