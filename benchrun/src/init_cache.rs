//! Per-process memoization of deterministic initialization results.
//!
//! Each case gets its own slot. The first caller for a case computes the
//! result while holding that slot's lock; concurrent callers for the same case
//! block on the lock and then observe the cached value. Callers for other
//! cases are not affected. Processes do not share this cache: recomputing in
//! another process yields the same result.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::core::budget::ResourceBudget;
use crate::core::context::RunContext;
use crate::core::solver::Initializer;
use crate::core::types::{BenchmarkCase, InitResult};

type Slot = Arc<Mutex<Option<Arc<InitResult>>>>;

/// A selected initializer together with the selector it was resolved from.
#[derive(Clone)]
pub struct SelectedInitializer {
    pub selector: String,
    pub initializer: Arc<dyn Initializer>,
}

pub struct DeterministicInitCache {
    selected: Option<SelectedInitializer>,
    slots: Mutex<HashMap<(bool, String), Slot>>,
}

impl DeterministicInitCache {
    pub fn new(selected: Option<SelectedInitializer>) -> Self {
        Self {
            selected,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// A cache that never produces a warm start.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn selector(&self) -> Option<&str> {
        self.selected.as_ref().map(|sel| sel.selector.as_str())
    }

    /// Return the initialization result for `case`, computing it on first use.
    ///
    /// Returns `Ok(None)` when no initializer is configured. A failed
    /// computation is not cached; the next caller retries.
    #[instrument(skip_all, fields(case = %case))]
    pub fn get(
        &self,
        case: &BenchmarkCase,
        budget: &ResourceBudget,
    ) -> Result<Option<Arc<InitResult>>> {
        let Some(selected) = &self.selected else {
            return Ok(None);
        };

        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                slots
                    .entry((case.symmetric, case.name.clone()))
                    .or_default(),
            )
        };

        // A panic inside a previous computation poisons the slot but never
        // stores a value, so the inner state is still consistent.
        let mut cached = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(result) = cached.as_ref() {
            debug!("initialization cache hit");
            return Ok(Some(Arc::clone(result)));
        }

        let result = Arc::new(compute(selected, case, budget)?);
        info!(
            initializer = %selected.selector,
            objective = ?result.point.objective,
            evaluations = result.point.consumed_evaluations,
            "deterministic initialization computed"
        );
        *cached = Some(Arc::clone(&result));
        Ok(Some(result))
    }
}

fn compute(
    selected: &SelectedInitializer,
    case: &BenchmarkCase,
    budget: &ResourceBudget,
) -> Result<InitResult> {
    let mut ctx = RunContext::new(*budget);
    selected
        .initializer
        .initialize(case, &mut ctx.handle())
        .with_context(|| format!("initializer {} on {}", selected.selector, case))?;
    let outcome = ctx.into_outcome();
    Ok(InitResult {
        initializer: selected.selector.clone(),
        point: outcome.result,
        solution: outcome.best_solution,
    })
}
