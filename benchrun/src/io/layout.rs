//! Deterministic paths inside the shared output tree.
//!
//! ```text
//! <output_dir>/
//! ├── symmetric/<case>/trial-00001.json
//! └── asymmetric/<case>/trial-00001.json
//! ```
//!
//! Every machine sharing the tree must compute identical paths for the same
//! job; the path is the job's identity.

use std::path::{Path, PathBuf};

use crate::core::types::{BenchmarkCase, JobKey};

const TRIAL_PREFIX: &str = "trial-";
const RESULT_EXTENSION: &str = "json";
const TEMP_SUFFIX: &str = ".tmp";

/// Path computations rooted at one output directory.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn case_dir(&self, case: &BenchmarkCase) -> PathBuf {
        self.root.join(case.family()).join(&case.name)
    }

    /// The claim marker / result path for a job.
    pub fn job_path(&self, job: &JobKey<'_>) -> PathBuf {
        self.case_dir(job.case).join(trial_file_name(job.trial))
    }
}

pub fn trial_file_name(trial: u32) -> String {
    format!("{TRIAL_PREFIX}{trial:05}.{RESULT_EXTENSION}")
}

/// Parse a trial index back out of a result file name.
pub fn parse_trial_file_name(name: &str) -> Option<u32> {
    name.strip_prefix(TRIAL_PREFIX)?
        .strip_suffix(RESULT_EXTENSION)?
        .strip_suffix('.')?
        .parse()
        .ok()
}

/// Staging path used while a result is being written.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

pub fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(TEMP_SUFFIX))
}
