//! Crash-safe persistence of completed runs.
//!
//! The result is staged in `<path>.tmp`, flushed to stable storage and then
//! renamed over the zero-byte claim marker. Readers therefore only ever see
//! an empty marker or a complete record, never a truncated one.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, warn};

use crate::core::types::RunRecord;
use crate::io::layout::temp_path;

/// Observable state of a job path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Nobody has claimed the job.
    Unclaimed,
    /// A zero-byte marker: claimed and running, or abandoned by a crash.
    Claimed,
    /// A non-empty result file.
    Complete,
}

/// Replace the claim marker at `path` with the serialized record.
pub fn write_result(path: &Path, record: &RunRecord) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(record).context("serialize run record")?;
    buf.push('\n');
    let tmp_path = temp_path(path);
    if let Err(err) = stage_and_rename(&tmp_path, path, buf.as_bytes()) {
        if let Err(cleanup) = fs::remove_file(&tmp_path)
            && cleanup.kind() != ErrorKind::NotFound
        {
            warn!(path = %tmp_path.display(), err = %cleanup, "failed to remove staged result");
        }
        return Err(err);
    }
    debug!(path = %path.display(), bytes = buf.len(), "result persisted");
    Ok(())
}

fn stage_and_rename(tmp_path: &Path, path: &Path, contents: &[u8]) -> Result<()> {
    let mut file = File::create(tmp_path)
        .with_context(|| format!("create staged result {}", tmp_path.display()))?;
    file.write_all(contents)
        .with_context(|| format!("write staged result {}", tmp_path.display()))?;
    file.sync_all()
        .with_context(|| format!("sync staged result {}", tmp_path.display()))?;
    drop(file);

    let staged_len = fs::metadata(tmp_path)
        .with_context(|| format!("stat staged result {}", tmp_path.display()))?
        .len();
    if staged_len != contents.len() as u64 {
        return Err(anyhow!(
            "staged result {} has {} bytes, expected {}",
            tmp_path.display(),
            staged_len,
            contents.len()
        ));
    }
    fs::rename(tmp_path, path).with_context(|| format!("replace marker {}", path.display()))?;
    Ok(())
}

/// Inspect a job path without modifying it.
pub fn job_state(path: &Path) -> Result<JobState> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() == 0 => Ok(JobState::Claimed),
        Ok(_) => Ok(JobState::Complete),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(JobState::Unclaimed),
        Err(err) => Err(err).with_context(|| format!("stat {}", path.display())),
    }
}

/// Load a completed result. Returns `None` for an empty claim marker.
pub fn read_result(path: &Path) -> Result<Option<RunRecord>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read result {}", path.display()))?;
    if contents.is_empty() {
        return Ok(None);
    }
    let record: RunRecord = serde_json::from_str(&contents)
        .with_context(|| format!("parse result {}", path.display()))?;
    Ok(Some(record))
}
