//! The worker pool driving an experiment to completion.
//!
//! Workers share nothing but the output tree. Each one walks the full job
//! space in enumeration order and executes whatever it manages to claim; a
//! denied claim means another thread or machine owns the job, or it is
//! already done. Adding or removing workers changes throughput only.

use std::path::Path;
use std::thread;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, info, instrument};

use crate::core::solver::SolverFactory;
use crate::core::types::{BenchmarkCase, enumerate_jobs};
use crate::execute::{JobFault, RunExecutor, panic_message};
use crate::init_cache::DeterministicInitCache;
use crate::initializers::InitializerRegistry;
use crate::io::claim::{ClaimOutcome, JobClaimStore};
use crate::io::config::ExperimentConfig;
use crate::io::layout::OutputLayout;

/// Counts aggregated over every worker of one [`Scheduler::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExperimentReport {
    pub workers: usize,
    /// Jobs this process claimed and started.
    pub executed: usize,
    /// Executed jobs whose result was persisted.
    pub completed: usize,
    /// Claim attempts that found the path already present.
    pub denied: usize,
    /// Initializer, solver and panic faults.
    pub solver_faults: usize,
    pub persistence_faults: usize,
}

impl ExperimentReport {
    /// Jobs left claimed but incomplete by this run.
    pub fn faults(&self) -> usize {
        self.solver_faults + self.persistence_faults
    }

    fn merge(&mut self, other: &ExperimentReport) {
        self.executed += other.executed;
        self.completed += other.completed;
        self.denied += other.denied;
        self.solver_faults += other.solver_faults;
        self.persistence_faults += other.persistence_faults;
    }

    fn record_fault(&mut self, fault: &JobFault) {
        match fault {
            JobFault::Persistence(_) => self.persistence_faults += 1,
            JobFault::Initializer(_) | JobFault::Solver(_) | JobFault::Panicked(_) => {
                self.solver_faults += 1;
            }
        }
    }
}

/// Runs one experiment configuration with solvers from `factory`.
pub struct Scheduler<'a> {
    config: &'a ExperimentConfig,
    factory: &'a dyn SolverFactory,
    initializers: InitializerRegistry,
}

impl<'a> Scheduler<'a> {
    pub fn new(config: &'a ExperimentConfig, factory: &'a dyn SolverFactory) -> Self {
        Self {
            config,
            factory,
            initializers: InitializerRegistry::default(),
        }
    }

    /// Initializers the configured selector is resolved against.
    pub fn with_initializers(mut self, initializers: InitializerRegistry) -> Self {
        self.initializers = initializers;
        self
    }

    /// Run workers until the job space is exhausted.
    ///
    /// Configuration, output root and initializer problems are reported before
    /// any worker starts. Per-job faults are logged and counted; a claim I/O
    /// fault stops the worker that hit it and is returned once every worker
    /// has finished.
    #[instrument(skip_all, fields(output_dir = %self.config.output_dir.display()))]
    pub fn run(&self) -> Result<ExperimentReport> {
        let config = self.config;
        config.validate_for_run().context("invalid experiment config")?;

        let store = JobClaimStore::new(&config.output_dir);
        store.ensure_writable()?;
        let selected = self
            .initializers
            .resolve(config.initializer.as_deref())
            .context("resolve initializer")?;

        let cache = DeterministicInitCache::new(selected);
        let executor = RunExecutor::new(self.factory, &cache, config.budget);
        let layout = OutputLayout::new(&config.output_dir);
        let workers = config.worker_count();
        info!(
            workers,
            cases = config.cases.len(),
            max_runs = config.max_runs,
            initializer = cache.selector().unwrap_or("none"),
            "starting experiment"
        );

        let outcomes = thread::scope(|scope| -> Result<Vec<Result<ExperimentReport>>> {
            let mut handles = Vec::with_capacity(workers);
            for index in 0..workers {
                let worker = Worker {
                    cases: &config.cases,
                    max_runs: config.max_runs,
                    layout: &layout,
                    store: &store,
                    executor: &executor,
                };
                let name = format!("benchrun-worker-{index}");
                let handle = thread::Builder::new()
                    .name(name.clone())
                    .spawn_scoped(scope, move || worker.run())
                    .with_context(|| format!("spawn {name}"))?;
                handles.push((name, handle));
            }
            Ok(handles
                .into_iter()
                .map(|(name, handle)| {
                    handle.join().unwrap_or_else(|payload| {
                        Err(anyhow!(
                            "{name} panicked: {}",
                            panic_message(payload.as_ref())
                        ))
                    })
                })
                .collect())
        })?;

        let mut report = ExperimentReport {
            workers,
            ..ExperimentReport::default()
        };
        let mut first_err = None;
        for outcome in outcomes {
            match outcome {
                Ok(worker_report) => report.merge(&worker_report),
                Err(err) => {
                    let message = format!("{err:#}");
                    error!(error = %message, "worker stopped");
                    first_err.get_or_insert(err);
                }
            }
        }
        if let Some(err) = first_err {
            error!(
                executed = report.executed,
                completed = report.completed,
                denied = report.denied,
                faults = report.faults(),
                "experiment stopped early"
            );
            return Err(err.context(format!(
                "experiment stopped after {} completed and {} failed job(s)",
                report.completed,
                report.faults()
            )));
        }

        info!(
            executed = report.executed,
            completed = report.completed,
            denied = report.denied,
            faults = report.faults(),
            "experiment finished"
        );
        Ok(report)
    }
}

struct Worker<'s> {
    cases: &'s [BenchmarkCase],
    max_runs: u32,
    layout: &'s OutputLayout,
    store: &'s JobClaimStore,
    executor: &'s RunExecutor<'s>,
}

impl Worker<'_> {
    fn run(self) -> Result<ExperimentReport> {
        let mut report = ExperimentReport::default();
        for job in enumerate_jobs(self.cases, self.max_runs) {
            let path = self.layout.job_path(&job);
            let outcome = self
                .store
                .try_claim(&path)
                .with_context(|| format!("claim {} trial {}", job.case, job.trial))?;
            if outcome == ClaimOutcome::Denied {
                report.denied += 1;
                continue;
            }

            report.executed += 1;
            match self.executor.execute(&job, &path) {
                Ok(_) => report.completed += 1,
                Err(fault) => {
                    report.record_fault(&fault);
                    log_fault(&job.case.to_string(), job.trial, &path, &fault);
                }
            }
        }
        debug!(
            executed = report.executed,
            denied = report.denied,
            "job space exhausted"
        );
        Ok(report)
    }
}

fn log_fault(case: &str, trial: u32, path: &Path, fault: &JobFault) {
    error!(
        case,
        trial,
        path = %path.display(),
        error = %fault,
        "job failed; claim marker left for recovery"
    );
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::io::run_log::{JobState, job_state};
    use crate::test_support::{FailingSolverFactory, ScriptedSolverFactory, experiment_config};

    #[test]
    fn unwritable_output_root_fails_before_any_claim() {
        let temp = tempfile::tempdir().expect("tempdir");
        let blocker = temp.path().join("results");
        fs::write(&blocker, "not a directory").expect("write blocker");
        let mut config = experiment_config(&blocker, 1, 1);
        config.max_threads = Some(2);
        let factory = ScriptedSolverFactory::evaluations(1);

        let err = Scheduler::new(&config, &factory)
            .run()
            .expect_err("root is a file");
        assert!(format!("{err:#}").contains("output root"));
        assert_eq!(factory.created(), 0);
    }

    #[test]
    fn unknown_initializer_fails_before_any_claim() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut config = experiment_config(temp.path(), 1, 1);
        config.initializer = Some("heuristics::missing".to_string());
        let factory = ScriptedSolverFactory::evaluations(1);

        let err = Scheduler::new(&config, &factory)
            .run()
            .expect_err("unknown initializer");
        assert!(format!("{err:#}").contains("heuristics::missing"));
        assert!(!temp.path().join("symmetric").exists());
    }

    #[test]
    fn empty_case_list_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = experiment_config(temp.path(), 0, 1);
        let factory = ScriptedSolverFactory::evaluations(1);
        let err = Scheduler::new(&config, &factory)
            .run()
            .expect_err("no cases");
        assert!(format!("{err:#}").contains("cases"));
    }

    #[test]
    fn claim_io_fault_is_not_a_denial() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut config = experiment_config(temp.path(), 2, 1);
        config.max_threads = Some(1);
        // The first case directory cannot be created.
        fs::create_dir_all(temp.path().join("symmetric")).expect("family dir");
        fs::write(temp.path().join("symmetric").join(&config.cases[0].name), "x")
            .expect("blocker");
        let factory = ScriptedSolverFactory::evaluations(1);

        let err = Scheduler::new(&config, &factory)
            .run()
            .expect_err("claim fault");
        assert!(format!("{err:#}").contains("claim symmetric/"));
        assert_eq!(factory.created(), 0);
    }

    #[test]
    fn claim_io_fault_reports_work_done_before_it() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = experiment_config(temp.path(), 2, 1);
        fs::create_dir_all(temp.path().join("symmetric")).expect("family dir");
        fs::write(temp.path().join("symmetric").join(&config.cases[1].name), "x")
            .expect("blocker");
        let factory = ScriptedSolverFactory::evaluations(1);

        let err = Scheduler::new(&config, &factory)
            .run()
            .expect_err("claim fault");
        let message = format!("{err:#}");
        assert!(message.contains("stopped after 1 completed and 0 failed"));
        assert!(message.contains("claim symmetric/case-2 trial 1"));
        assert_eq!(factory.created(), 1);
    }

    #[test]
    fn solver_faults_are_isolated_per_job() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut config = experiment_config(temp.path(), 2, 2);
        config.max_threads = Some(2);
        let factory = FailingSolverFactory;

        let report = Scheduler::new(&config, &factory).run().expect("run");
        assert_eq!(report.executed, 4);
        assert_eq!(report.completed, 0);
        assert_eq!(report.solver_faults, 4);
        assert_eq!(report.faults(), 4);
        assert_eq!(report.denied, 4);

        let layout = OutputLayout::new(temp.path());
        for job in enumerate_jobs(&config.cases, config.max_runs) {
            let state = job_state(&layout.job_path(&job)).expect("state");
            assert_eq!(state, JobState::Claimed);
        }
    }
}
