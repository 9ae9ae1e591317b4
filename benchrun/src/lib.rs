//! Distributed, crash-safe execution of optimization experiments.
//!
//! An experiment is a matrix of benchmark cases times trial indices. Every
//! job is claimed by atomically creating its result file in a shared output
//! tree, so any number of threads and machines can work on the same
//! experiment without talking to each other. The architecture keeps a strict
//! separation:
//!
//! - **[`core`]**: Pure data and logic (budgets, run contexts, solver seams).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Filesystem side effects (config, claims, result persistence,
//!   status and recovery).
//!
//! Orchestration modules ([`schedule`], [`execute`], [`init_cache`]) combine
//! the two. Embedding applications provide a [`core::solver::SolverFactory`]
//! and call [`schedule::Scheduler::run`].

pub mod core;
pub mod execute;
pub mod exit_codes;
pub mod init_cache;
pub mod initializers;
pub mod io;
pub mod logging;
pub mod schedule;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
