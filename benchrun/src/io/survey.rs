//! Progress scan and crash recovery for an output tree.
//!
//! Recovery is the documented operational procedure after an unclean
//! shutdown: delete every zero-byte file under the output root. Those jobs
//! become claimable again; nothing else needs cleaning up. Stray staging
//! files (`*.tmp`) left by a crash during persistence are removed as well.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::io::layout::{is_temp_file, parse_trial_file_name};
use crate::io::run_log::read_result;

/// Job counts for one case directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseStatus {
    pub family: String,
    pub case: String,
    pub complete: usize,
    /// Zero-byte markers: running elsewhere, or abandoned.
    pub claimed: usize,
    /// Non-empty files that do not parse as a result.
    pub invalid: usize,
}

/// Progress of a whole output tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Survey {
    pub cases: Vec<CaseStatus>,
    pub stray_temp_files: usize,
}

impl Survey {
    pub fn complete(&self) -> usize {
        self.cases.iter().map(|case| case.complete).sum()
    }

    pub fn claimed(&self) -> usize {
        self.cases.iter().map(|case| case.claimed).sum()
    }

    pub fn invalid(&self) -> usize {
        self.cases.iter().map(|case| case.invalid).sum()
    }
}

/// Scan `<root>/<family>/<case>/trial-*.json`. Unreadable results are
/// counted as invalid and reported as warnings instead of failing the scan.
pub fn survey(root: &Path) -> Result<(Survey, Vec<String>)> {
    let mut summary = Survey::default();
    let mut warnings = Vec::new();

    for family_dir in sorted_subdirs(root)? {
        for case_dir in sorted_subdirs(&family_dir)? {
            let mut status = CaseStatus {
                family: file_name(&family_dir),
                case: file_name(&case_dir),
                ..CaseStatus::default()
            };
            for path in sorted_entries(&case_dir)? {
                if is_temp_file(&path) {
                    summary.stray_temp_files += 1;
                    continue;
                }
                let is_trial = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .and_then(parse_trial_file_name)
                    .is_some();
                if !is_trial || !path.is_file() {
                    continue;
                }
                match read_result(&path) {
                    Ok(None) => status.claimed += 1,
                    Ok(Some(_)) => status.complete += 1,
                    Err(err) => {
                        status.invalid += 1;
                        warnings.push(format!("skip {}: {err:#}", path.display()));
                    }
                }
            }
            summary.cases.push(status);
        }
    }

    Ok((summary, warnings))
}

/// Delete every zero-byte file and every staging file under `root`.
///
/// Returns the affected paths in sorted order. With `dry_run`, nothing is
/// deleted.
pub fn recover(root: &Path, dry_run: bool) -> Result<Vec<PathBuf>> {
    let mut targets = Vec::new();
    if root.exists() {
        collect_recoverable(root, &mut targets)?;
    }
    targets.sort();
    for path in &targets {
        if dry_run {
            debug!(path = %path.display(), "would remove");
            continue;
        }
        fs::remove_file(path).with_context(|| format!("remove {}", path.display()))?;
    }
    info!(count = targets.len(), dry_run, "recovery scan complete");
    Ok(targets)
}

fn collect_recoverable(dir: &Path, targets: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry.context("read entry")?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .with_context(|| format!("stat {}", path.display()))?;
        if file_type.is_dir() {
            collect_recoverable(&path, targets)?;
            continue;
        }
        if !file_type.is_file() {
            continue;
        }
        let len = entry
            .metadata()
            .with_context(|| format!("stat {}", path.display()))?
            .len();
        if len == 0 || is_temp_file(&path) {
            targets.push(path);
        }
    }
    Ok(())
}

fn sorted_subdirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = sorted_entries(dir)?;
    dirs.retain(|path| path.is_dir());
    Ok(dirs)
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry.context("read entry")?;
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().expect("parent")).expect("create dir");
        fs::write(path, contents).expect("write");
    }

    #[test]
    fn missing_root_is_empty() {
        let temp = tempdir().expect("tempdir");
        let (summary, warnings) = survey(&temp.path().join("nope")).expect("survey");
        assert!(summary.cases.is_empty());
        assert!(warnings.is_empty());
        assert!(recover(&temp.path().join("nope"), false).expect("recover").is_empty());
    }

    #[test]
    fn counts_claimed_and_invalid_results() {
        let temp = tempdir().expect("tempdir");
        let case_dir = temp.path().join("symmetric/eil51");
        write(&case_dir.join("trial-00001.json"), "");
        write(&case_dir.join("trial-00002.json"), "not json");
        write(&case_dir.join("trial-00003.json.tmp"), "{");
        write(&case_dir.join("README"), "ignored");

        let (summary, warnings) = survey(temp.path()).expect("survey");
        assert_eq!(summary.cases.len(), 1);
        let status = &summary.cases[0];
        assert_eq!(status.family, "symmetric");
        assert_eq!(status.case, "eil51");
        assert_eq!(status.claimed, 1);
        assert_eq!(status.invalid, 1);
        assert_eq!(status.complete, 0);
        assert_eq!(summary.stray_temp_files, 1);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("trial-00002.json"));
    }

    #[test]
    fn recover_removes_only_empty_and_staging_files() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path();
        let empty = root.join("symmetric/a/trial-00001.json");
        let full = root.join("symmetric/a/trial-00002.json");
        let staged = root.join("asymmetric/b/trial-00001.json.tmp");
        write(&empty, "");
        write(&full, "{}");
        write(&staged, "{\"partial\":");

        let planned = recover(root, true).expect("dry run");
        assert_eq!(planned, vec![staged.clone(), empty.clone()]);
        assert!(empty.exists());

        let removed = recover(root, false).expect("recover");
        assert_eq!(removed, planned);
        assert!(!empty.exists());
        assert!(!staged.exists());
        assert!(full.exists());
    }
}
