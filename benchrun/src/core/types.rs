//! Shared deterministic types for the experiment core.
//!
//! These types define stable contracts between the scheduler, the executor and
//! the persisted result files. They perform no I/O.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::budget::ResourceBudget;

/// A problem instance identity. Loaded once, shared read-only by all workers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BenchmarkCase {
    /// Instance name, used as the directory name under the output root.
    pub name: String,
    /// Number of nodes; drives the default budget.
    pub nodes: u32,
    /// Symmetric and asymmetric instances are stored in separate subtrees.
    #[serde(default = "default_symmetric")]
    pub symmetric: bool,
}

fn default_symmetric() -> bool {
    true
}

impl BenchmarkCase {
    pub fn new(name: impl Into<String>, nodes: u32, symmetric: bool) -> Self {
        Self {
            name: name.into(),
            nodes,
            symmetric,
        }
    }

    /// Name of the subtree this case lives in.
    pub fn family(&self) -> &'static str {
        if self.symmetric {
            "symmetric"
        } else {
            "asymmetric"
        }
    }
}

impl fmt::Display for BenchmarkCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.family(), self.name)
    }
}

/// One unit of work: a case and a 1-based trial index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobKey<'a> {
    pub case: &'a BenchmarkCase,
    pub trial: u32,
}

/// Enumerate the job space: cases in the given order, trials `1..=max_runs`
/// ascending within each case.
pub fn enumerate_jobs(
    cases: &[BenchmarkCase],
    max_runs: u32,
) -> impl Iterator<Item = JobKey<'_>> {
    cases
        .iter()
        .flat_map(move |case| (1..=max_runs).map(move |trial| JobKey { case, trial }))
}

/// Immutable snapshot of a run's consumption and outcome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogPoint {
    pub consumed_evaluations: u64,
    pub consumed_secondary_evaluations: u64,
    pub consumed_runtime_ms: u64,
    /// Best objective seen so far; `None` until the first finite evaluation.
    pub objective: Option<f64>,
}

/// Cached output of the deterministic initializer for one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitResult {
    /// Selector of the initializer that produced this result.
    pub initializer: String,
    /// Consumption at the end of initialization.
    pub point: LogPoint,
    /// Best solution encoding found during initialization (empty if none).
    pub solution: Vec<u32>,
}

/// Solver identity recorded alongside every result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverInfo {
    pub name: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

/// Contents of a complete result file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub case: BenchmarkCase,
    pub trial: u32,
    pub solver: SolverInfo,
    pub budget: ResourceBudget,
    /// Checkpoint of the deterministic initialization, if one was applied.
    pub init: Option<LogPoint>,
    pub initializer: Option<String>,
    /// Consumption and best objective at the end of the run.
    pub result: LogPoint,
    /// One point per strict improvement of the best objective.
    pub trace: Vec<LogPoint>,
    pub best_solution: Vec<u32>,
    pub started_at: String,
    pub finished_at: String,
}
