//! Execution of one claimed job.
//!
//! The executor owns everything about a single run: the fresh solver
//! instance, the [`RunContext`] and the final persistence step. Until
//! [`write_result`] succeeds the job's path stays a zero-byte marker, which is
//! exactly the state a crash would leave behind.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use thiserror::Error;
use tracing::{info, instrument};

use crate::core::budget::{BudgetOverrides, ResourceBudget};
use crate::core::context::RunContext;
use crate::core::solver::SolverFactory;
use crate::core::types::{JobKey, RunRecord};
use crate::init_cache::DeterministicInitCache;
use crate::io::run_log::write_result;

/// A per-job failure. The claim marker is left empty in every case, so the
/// job is recoverable by deleting zero-byte files.
#[derive(Debug, Error)]
pub enum JobFault {
    #[error("deterministic initialization failed: {0:#}")]
    Initializer(anyhow::Error),
    #[error("solver failed: {0:#}")]
    Solver(anyhow::Error),
    #[error("solver panicked: {0}")]
    Panicked(String),
    #[error("persisting result failed: {0:#}")]
    Persistence(anyhow::Error),
}

/// Runs claimed jobs with solvers from one factory.
pub struct RunExecutor<'a> {
    factory: &'a dyn SolverFactory,
    init_cache: &'a DeterministicInitCache,
    overrides: BudgetOverrides,
}

impl<'a> RunExecutor<'a> {
    pub fn new(
        factory: &'a dyn SolverFactory,
        init_cache: &'a DeterministicInitCache,
        overrides: BudgetOverrides,
    ) -> Self {
        Self {
            factory,
            init_cache,
            overrides,
        }
    }

    fn budget_for(&self, job: &JobKey<'_>) -> ResourceBudget {
        ResourceBudget::resolve(job.case.nodes, &self.overrides)
    }

    /// Execute `job`, whose marker at `path` the caller has already claimed,
    /// and persist the result over the marker.
    #[instrument(skip_all, fields(case = %job.case, trial = job.trial))]
    pub fn execute(&self, job: &JobKey<'_>, path: &Path) -> Result<RunRecord, JobFault> {
        let budget = self.budget_for(job);

        let init = catch_unwind(AssertUnwindSafe(|| self.init_cache.get(job.case, &budget)))
            .map_err(panicked)?
            .map_err(JobFault::Initializer)?;

        // Panics while building the solver are job faults too.
        let (mut solver, solver_info) = catch_unwind(AssertUnwindSafe(|| {
            self.factory
                .create()
                .map(|solver| (solver, self.factory.info()))
        }))
        .map_err(panicked)?
        .map_err(JobFault::Solver)?;
        let mut ctx = match &init {
            Some(init) => RunContext::seeded(budget, Arc::clone(init)),
            None => RunContext::new(budget),
        };

        let started_at = timestamp();
        let solved = catch_unwind(AssertUnwindSafe(|| {
            solver.solve(job.case, &mut ctx.handle())
        }));
        match solved {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(JobFault::Solver(err)),
            Err(payload) => return Err(panicked(payload)),
        }
        let finished_at = timestamp();

        let exhausted = ctx.should_terminate();
        let outcome = ctx.into_outcome();
        let record = RunRecord {
            case: job.case.clone(),
            trial: job.trial,
            solver: solver_info,
            budget,
            init: init.as_ref().map(|init| init.point),
            initializer: init.as_ref().map(|init| init.initializer.clone()),
            result: outcome.result,
            trace: outcome.trace,
            best_solution: outcome.best_solution,
            started_at,
            finished_at,
        };
        write_result(path, &record).map_err(JobFault::Persistence)?;

        info!(
            evaluations = record.result.consumed_evaluations,
            secondary_evaluations = record.result.consumed_secondary_evaluations,
            runtime_ms = record.result.consumed_runtime_ms,
            objective = ?record.result.objective,
            budget_exhausted = exhausted,
            "run complete"
        );
        Ok(record)
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn panicked(payload: Box<dyn Any + Send>) -> JobFault {
    JobFault::Panicked(panic_message(payload.as_ref()))
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "non-string panic payload".to_string()
}
