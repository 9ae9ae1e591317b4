//! At-most-once job claiming through atomic file creation.
//!
//! A job is owned by whoever creates its result path first. The only
//! primitive used is "create if absent" (`O_CREAT | O_EXCL`); existence is
//! never checked beforehand. A zero-byte file means claimed but not yet
//! complete, a non-empty file means complete.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

/// Result of a claim attempt that did not fail with an I/O fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This caller created the marker and now owns the job.
    Claimed,
    /// The path already existed: owned elsewhere or already complete.
    Denied,
}

/// Claims job paths inside a shared output tree.
#[derive(Debug, Clone)]
pub struct JobClaimStore {
    root: PathBuf,
}

impl JobClaimStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Atomically create `path` as an empty claim marker.
    ///
    /// Returns `Denied` only when the path already exists. Any other failure
    /// (missing permissions, full disk, unreachable share) is an error.
    pub fn try_claim(&self, path: &Path) -> Result<ClaimOutcome> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create job directory {}", parent.display()))?;
        }
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(_) => {
                debug!(path = %path.display(), "job claimed");
                Ok(ClaimOutcome::Claimed)
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                debug!(path = %path.display(), "claim denied");
                Ok(ClaimOutcome::Denied)
            }
            Err(err) => Err(err).with_context(|| format!("claim {}", path.display())),
        }
    }

    /// Fail early if the output root cannot be created or written.
    pub fn ensure_writable(&self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("create output root {}", self.root.display()))?;
        let probe = self
            .root
            .join(format!(".benchrun-probe-{}", std::process::id()));
        fs::write(&probe, b"probe")
            .with_context(|| format!("output root not writable {}", self.root.display()))?;
        fs::remove_file(&probe).with_context(|| format!("remove probe {}", probe.display()))?;
        Ok(())
    }
}
