//! Resource budgets bounding a single run.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default wall-clock limit per run: one hour.
pub const DEFAULT_MAX_WALL_CLOCK_MS: u64 = 60 * 60 * 1000;

/// Immutable limits for one run. Every dimension is inclusive: a run whose
/// consumption reaches a limit must stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceBudget {
    pub max_evaluations: u64,
    pub max_secondary_evaluations: u64,
    pub max_wall_clock_ms: u64,
}

/// Global overrides applied on top of the size-derived defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetOverrides {
    pub max_evaluations: Option<u64>,
    pub max_secondary_evaluations: Option<u64>,
    pub max_wall_clock_ms: Option<u64>,
}

impl ResourceBudget {
    /// Size-derived defaults: `100·n³` evaluations, `100·n⁴` secondary
    /// evaluations and one hour of wall clock. Saturates instead of overflowing.
    pub fn for_size(nodes: u32) -> Self {
        let n = u64::from(nodes);
        let cube = n.saturating_mul(n).saturating_mul(n);
        Self {
            max_evaluations: cube.saturating_mul(100),
            max_secondary_evaluations: cube.saturating_mul(n).saturating_mul(100),
            max_wall_clock_ms: DEFAULT_MAX_WALL_CLOCK_MS,
        }
    }

    /// Defaults for `nodes` with any configured overrides applied.
    pub fn resolve(nodes: u32, overrides: &BudgetOverrides) -> Self {
        let defaults = Self::for_size(nodes);
        Self {
            max_evaluations: overrides
                .max_evaluations
                .unwrap_or(defaults.max_evaluations),
            max_secondary_evaluations: overrides
                .max_secondary_evaluations
                .unwrap_or(defaults.max_secondary_evaluations),
            max_wall_clock_ms: overrides
                .max_wall_clock_ms
                .unwrap_or(defaults.max_wall_clock_ms),
        }
    }

    pub fn max_wall_clock(&self) -> Duration {
        Duration::from_millis(self.max_wall_clock_ms)
    }

    /// True once any dimension of `consumed` has reached its limit.
    pub fn is_exhausted(&self, evaluations: u64, secondary: u64, elapsed: Duration) -> bool {
        evaluations >= self.max_evaluations
            || secondary >= self.max_secondary_evaluations
            || elapsed >= self.max_wall_clock()
    }
}
