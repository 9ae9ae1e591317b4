//! Experiment configuration stored as TOML (default `benchrun.toml`).

use std::collections::HashSet;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};

use crate::core::budget::BudgetOverrides;
use crate::core::types::BenchmarkCase;

pub const DEFAULT_CONFIG_FILE: &str = "benchrun.toml";
pub const DEFAULT_MAX_RUNS: u32 = 30;

/// Experiment configuration (TOML).
///
/// Intended to be edited by humans. Missing fields take the documented
/// defaults; every machine sharing an output directory should use the same
/// `max_runs` and budget settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Root of the shared claim/result namespace.
    pub output_dir: PathBuf,

    /// Local worker pool size. `None` uses one thread per available processor.
    pub max_threads: Option<usize>,

    /// Trials enumerated per case.
    pub max_runs: u32,

    /// Selector of the deterministic initializer. `None` starts runs cold.
    pub initializer: Option<String>,

    pub budget: BudgetOverrides,

    /// Cases in enumeration order.
    pub cases: Vec<BenchmarkCase>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("results"),
            max_threads: None,
            max_runs: DEFAULT_MAX_RUNS,
            initializer: None,
            budget: BudgetOverrides::default(),
            cases: Vec::new(),
        }
    }
}

impl ExperimentConfig {
    /// Checks that hold regardless of whether an experiment is about to run.
    pub fn validate(&self) -> Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            bail!("output_dir must be non-empty");
        }
        if self.max_runs == 0 {
            bail!("max_runs must be > 0");
        }
        if self.max_threads == Some(0) {
            bail!("max_threads must be > 0 when set");
        }
        if let Some(selector) = &self.initializer
            && selector.trim().is_empty()
        {
            bail!("initializer must be non-empty when set");
        }
        let overrides = [
            ("budget.max_evaluations", self.budget.max_evaluations),
            (
                "budget.max_secondary_evaluations",
                self.budget.max_secondary_evaluations,
            ),
            ("budget.max_wall_clock_ms", self.budget.max_wall_clock_ms),
        ];
        for (name, value) in overrides {
            if value == Some(0) {
                bail!("{name} must be > 0 when set");
            }
        }
        let mut seen = HashSet::new();
        for (index, case) in self.cases.iter().enumerate() {
            validate_case_name(&case.name).with_context(|| format!("cases[{index}] invalid"))?;
            if case.nodes == 0 {
                bail!("cases[{index}].nodes must be > 0");
            }
            if !seen.insert((case.symmetric, case.name.as_str())) {
                return Err(anyhow!("duplicate case {}", case));
            }
        }
        Ok(())
    }

    /// Checks required before scheduling: a valid config with at least one case.
    pub fn validate_for_run(&self) -> Result<()> {
        self.validate()?;
        if self.cases.is_empty() {
            bail!("cases must be a non-empty array");
        }
        Ok(())
    }

    /// Effective local worker count.
    pub fn worker_count(&self) -> usize {
        self.max_threads.unwrap_or_else(|| {
            thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        })
    }
}

/// Load and validate config from a TOML file.
pub fn load_config(path: &Path) -> Result<ExperimentConfig> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ExperimentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ExperimentConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

fn validate_case_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("case name must be non-empty");
    }
    if name.contains("..") {
        bail!("case name must not contain '..'");
    }
    if !name
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
    {
        bail!("case name must use [A-Za-z0-9._-] only");
    }
    Ok(())
}
