//! Per-run mutable state and the narrow capability handed to solvers.
//!
//! A [`RunContext`] is exclusively owned by the worker executing one run. The
//! solver never sees it directly; it receives a [`RunHandle`] that can only
//! register consumption, query the budget and read the best-found state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::budget::ResourceBudget;
use crate::core::types::{InitResult, LogPoint};

/// Counters, best-found state and the clock for one run.
#[derive(Debug)]
pub struct RunContext {
    budget: ResourceBudget,
    started: Instant,
    runtime_offset: Duration,
    evaluations: u64,
    secondary_evaluations: u64,
    best_objective: Option<f64>,
    best_solution: Vec<u32>,
    trace: Vec<LogPoint>,
    warm_start: Option<Arc<InitResult>>,
}

/// What remains of a [`RunContext`] once the solver has returned.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub result: LogPoint,
    pub trace: Vec<LogPoint>,
    pub best_solution: Vec<u32>,
}

impl RunContext {
    /// A cold context: zero consumption, no incumbent.
    pub fn new(budget: ResourceBudget) -> Self {
        Self {
            budget,
            started: Instant::now(),
            runtime_offset: Duration::ZERO,
            evaluations: 0,
            secondary_evaluations: 0,
            best_objective: None,
            best_solution: Vec::new(),
            trace: Vec::new(),
            warm_start: None,
        }
    }

    /// A context continuing from a deterministic initialization checkpoint.
    ///
    /// The checkpoint's consumption counts against this run's budget and its
    /// solution becomes the starting incumbent.
    pub fn seeded(budget: ResourceBudget, init: Arc<InitResult>) -> Self {
        let mut ctx = Self::new(budget);
        ctx.runtime_offset = Duration::from_millis(init.point.consumed_runtime_ms);
        ctx.evaluations = init.point.consumed_evaluations;
        ctx.secondary_evaluations = init.point.consumed_secondary_evaluations;
        ctx.best_objective = init.point.objective;
        ctx.best_solution = init.solution.clone();
        ctx.warm_start = Some(init);
        ctx
    }

    pub fn budget(&self) -> &ResourceBudget {
        &self.budget
    }

    pub fn elapsed(&self) -> Duration {
        self.runtime_offset + self.started.elapsed()
    }

    pub fn should_terminate(&self) -> bool {
        self.budget
            .is_exhausted(self.evaluations, self.secondary_evaluations, self.elapsed())
    }

    pub fn snapshot(&self) -> LogPoint {
        LogPoint {
            consumed_evaluations: self.evaluations,
            consumed_secondary_evaluations: self.secondary_evaluations,
            consumed_runtime_ms: duration_ms(self.elapsed()),
            objective: self.best_objective,
        }
    }

    /// Borrow the solver-facing capability.
    pub fn handle(&mut self) -> RunHandle<'_> {
        RunHandle { ctx: self }
    }

    pub fn into_outcome(self) -> RunOutcome {
        let result = self.snapshot();
        RunOutcome {
            result,
            trace: self.trace,
            best_solution: self.best_solution,
        }
    }

    fn register_evaluation(&mut self, objective: f64, solution: &[u32]) -> bool {
        self.evaluations = self.evaluations.saturating_add(1);
        if !objective.is_finite() {
            return false;
        }
        let improved = self.best_objective.is_none_or(|best| objective < best);
        if improved {
            self.best_objective = Some(objective);
            self.best_solution.clear();
            self.best_solution.extend_from_slice(solution);
            let point = self.snapshot();
            self.trace.push(point);
        }
        improved
    }
}

/// Capability handed to a solver for the duration of one run.
///
/// Budget enforcement is cooperative: the solver is expected to call
/// [`RunHandle::should_terminate`] after every candidate evaluation.
#[derive(Debug)]
pub struct RunHandle<'a> {
    ctx: &'a mut RunContext,
}

impl RunHandle<'_> {
    /// Count one objective evaluation of `solution`. Returns true if it strictly
    /// improved the best objective. Non-finite objectives are counted but never
    /// become the incumbent.
    pub fn register_evaluation(&mut self, objective: f64, solution: &[u32]) -> bool {
        self.ctx.register_evaluation(objective, solution)
    }

    /// Count `count` secondary evaluations (e.g. single distance lookups).
    pub fn register_secondary_evaluations(&mut self, count: u64) {
        self.ctx.secondary_evaluations = self.ctx.secondary_evaluations.saturating_add(count);
    }

    /// True once any budget dimension is exhausted.
    pub fn should_terminate(&self) -> bool {
        self.ctx.should_terminate()
    }

    pub fn budget(&self) -> &ResourceBudget {
        self.ctx.budget()
    }

    pub fn best_objective(&self) -> Option<f64> {
        self.ctx.best_objective
    }

    pub fn best_solution(&self) -> &[u32] {
        &self.ctx.best_solution
    }

    pub fn consumed(&self) -> LogPoint {
        self.ctx.snapshot()
    }

    /// The deterministic initialization this run was seeded from, if any.
    pub fn warm_start(&self) -> Option<&InitResult> {
        self.ctx.warm_start.as_deref()
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
