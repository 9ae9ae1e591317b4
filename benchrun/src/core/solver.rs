//! Pluggable algorithm seams.
//!
//! The experiment core never implements an algorithm. It constructs solvers
//! through a [`SolverFactory`], one fresh instance per run, and optionally
//! warm-starts them with the output of a deterministic [`Initializer`].

use anyhow::Result;

use crate::core::context::RunHandle;
use crate::core::types::{BenchmarkCase, SolverInfo};

/// One optimization algorithm instance, exclusively owned by a single run.
pub trait Solver {
    /// Optimize `case`, registering every evaluation on `run` and returning
    /// once `run.should_terminate()` reports true (or earlier).
    fn solve(&mut self, case: &BenchmarkCase, run: &mut RunHandle<'_>) -> Result<()>;
}

/// Builds independent solver instances from a validated configuration.
///
/// Shared by reference across all worker threads; every call to
/// [`SolverFactory::create`] must return an instance with no mutable state
/// aliased with any other instance.
pub trait SolverFactory: Sync {
    /// Name and parameters recorded in every result file.
    fn info(&self) -> SolverInfo;

    fn create(&self) -> Result<Box<dyn Solver>>;
}

/// A deterministic warm-start procedure: the same case always yields the same
/// result, so it is computed once per case and shared by every trial.
pub trait Initializer: Send + Sync {
    fn initialize(&self, case: &BenchmarkCase, run: &mut RunHandle<'_>) -> Result<()>;
}
