//! Test-only solvers, initializers and experiment builders.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, bail};
use tempfile::TempDir;

use crate::core::context::RunHandle;
use crate::core::solver::{Initializer, Solver, SolverFactory};
use crate::core::types::{BenchmarkCase, SolverInfo};
use crate::io::config::ExperimentConfig;

/// `count` small cases named `case-1..=case-count`; every third one is
/// asymmetric.
pub fn cases(count: usize) -> Vec<BenchmarkCase> {
    (1..=count)
        .map(|index| BenchmarkCase::new(format!("case-{index}"), 5, index % 3 != 0))
        .collect()
}

/// A single-threaded config writing to `output_dir`.
pub fn experiment_config(output_dir: &Path, case_count: usize, max_runs: u32) -> ExperimentConfig {
    ExperimentConfig {
        output_dir: output_dir.to_path_buf(),
        max_threads: Some(1),
        max_runs,
        cases: cases(case_count),
        ..ExperimentConfig::default()
    }
}

/// A config rooted in a fresh temporary directory. Keep the guard alive for
/// the duration of the test.
pub fn temp_experiment(case_count: usize, max_runs: u32) -> (TempDir, ExperimentConfig) {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = experiment_config(&temp.path().join("results"), case_count, max_runs);
    (temp, config)
}

/// Builds solvers that register up to `evaluations` strictly improving
/// candidates, checking the budget before each one.
#[derive(Debug, Default)]
pub struct ScriptedSolverFactory {
    evaluations: u32,
    created: AtomicUsize,
}

impl ScriptedSolverFactory {
    pub fn evaluations(evaluations: u32) -> Self {
        Self {
            evaluations,
            created: AtomicUsize::new(0),
        }
    }

    /// Number of solver instances handed out so far (one per executed run).
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl SolverFactory for ScriptedSolverFactory {
    fn info(&self) -> SolverInfo {
        SolverInfo {
            name: "scripted".to_string(),
            parameters: BTreeMap::from([(
                "evaluations".to_string(),
                self.evaluations.to_string(),
            )]),
        }
    }

    fn create(&self) -> Result<Box<dyn Solver>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSolver {
            evaluations: self.evaluations,
        }))
    }
}

struct ScriptedSolver {
    evaluations: u32,
}

impl Solver for ScriptedSolver {
    fn solve(&mut self, case: &BenchmarkCase, run: &mut RunHandle<'_>) -> Result<()> {
        let mut tour: Vec<u32> = (0..case.nodes).collect();
        for step in 0..self.evaluations {
            if run.should_terminate() {
                break;
            }
            tour.rotate_left(1);
            run.register_secondary_evaluations(u64::from(case.nodes));
            run.register_evaluation(f64::from(self.evaluations - step), &tour);
        }
        Ok(())
    }
}

/// Like [`ScriptedSolverFactory`], except that the first `create` panics.
#[derive(Debug, Default)]
pub struct PanicOnFirstCreateFactory {
    inner: ScriptedSolverFactory,
    attempts: AtomicUsize,
}

impl PanicOnFirstCreateFactory {
    pub fn evaluations(evaluations: u32) -> Self {
        Self {
            inner: ScriptedSolverFactory::evaluations(evaluations),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Number of `create` calls, including the one that panicked.
    pub fn created(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl SolverFactory for PanicOnFirstCreateFactory {
    fn info(&self) -> SolverInfo {
        self.inner.info()
    }

    fn create(&self) -> Result<Box<dyn Solver>> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("factory panic on first create");
        }
        self.inner.create()
    }
}

/// Builds solvers whose every run fails.
#[derive(Debug, Default)]
pub struct FailingSolverFactory;

impl SolverFactory for FailingSolverFactory {
    fn info(&self) -> SolverInfo {
        SolverInfo {
            name: "failing".to_string(),
            parameters: BTreeMap::new(),
        }
    }

    fn create(&self) -> Result<Box<dyn Solver>> {
        Ok(Box::new(FailingSolver))
    }
}

struct FailingSolver;

impl Solver for FailingSolver {
    fn solve(&mut self, _case: &BenchmarkCase, run: &mut RunHandle<'_>) -> Result<()> {
        run.register_evaluation(1.0, &[0]);
        bail!("scripted solver failure")
    }
}

/// Builds solvers that panic mid-run.
#[derive(Debug, Default)]
pub struct PanickingSolverFactory;

impl SolverFactory for PanickingSolverFactory {
    fn info(&self) -> SolverInfo {
        SolverInfo {
            name: "panicking".to_string(),
            parameters: BTreeMap::new(),
        }
    }

    fn create(&self) -> Result<Box<dyn Solver>> {
        Ok(Box::new(PanickingSolver))
    }
}

struct PanickingSolver;

impl Solver for PanickingSolver {
    fn solve(&mut self, _case: &BenchmarkCase, _run: &mut RunHandle<'_>) -> Result<()> {
        panic!("scripted panic")
    }
}

/// Identity-tour initializer that counts its invocations. The objective is
/// `2 * nodes` after one evaluation and `nodes` secondary evaluations.
#[derive(Debug, Default)]
pub struct CountingInitializer {
    calls: AtomicUsize,
}

impl CountingInitializer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Initializer for CountingInitializer {
    fn initialize(&self, case: &BenchmarkCase, run: &mut RunHandle<'_>) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let tour: Vec<u32> = (0..case.nodes).collect();
        run.register_secondary_evaluations(u64::from(case.nodes));
        run.register_evaluation(f64::from(case.nodes) * 2.0, &tour);
        Ok(())
    }
}
