//! End-to-end properties of the claim protocol and the scheduler.
//!
//! Every test works on its own temporary output tree. "Machines" are
//! simulated by independent schedulers or claim stores sharing that tree.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;

use benchrun::core::types::{RunRecord, enumerate_jobs};
use benchrun::initializers::InitializerRegistry;
use benchrun::io::claim::{ClaimOutcome, JobClaimStore};
use benchrun::io::config::ExperimentConfig;
use benchrun::io::layout::OutputLayout;
use benchrun::io::run_log::read_result;
use benchrun::io::survey::{recover, survey};
use benchrun::schedule::Scheduler;
use benchrun::test_support::{
    CountingInitializer, PanicOnFirstCreateFactory, ScriptedSolverFactory, temp_experiment,
};

fn records(config: &ExperimentConfig) -> Vec<RunRecord> {
    let layout = OutputLayout::new(&config.output_dir);
    enumerate_jobs(&config.cases, config.max_runs)
        .map(|job| {
            read_result(&layout.job_path(&job))
                .expect("read result")
                .expect("job complete")
        })
        .collect()
}

fn zero_byte_files(root: &Path) -> usize {
    recover(root, true).expect("scan").len()
}

#[test]
fn concurrent_claims_have_exactly_one_winner() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("symmetric/eil51/trial-00001.json");
    let barrier = Barrier::new(8);

    let outcomes: Vec<ClaimOutcome> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    let store = JobClaimStore::new(temp.path());
                    barrier.wait();
                    store.try_claim(&path).expect("claim")
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("join"))
            .collect()
    });

    let winners = outcomes
        .iter()
        .filter(|outcome| **outcome == ClaimOutcome::Claimed)
        .count();
    assert_eq!(winners, 1);
    assert_eq!(fs::metadata(&path).expect("marker").len(), 0);
}

#[test]
fn three_cases_two_trials_single_worker() {
    let (_temp, config) = temp_experiment(3, 2);
    let factory = ScriptedSolverFactory::evaluations(0);

    let report = Scheduler::new(&config, &factory).run().expect("run");

    assert_eq!(report.workers, 1);
    assert_eq!(report.executed, 6);
    assert_eq!(report.completed, 6);
    assert_eq!(report.faults(), 0);
    let records = records(&config);
    assert_eq!(records.len(), 6);
    for record in &records {
        assert_eq!(record.result.consumed_evaluations, 0);
        assert_eq!(record.result.objective, None);
        assert!(record.trace.is_empty());
        assert_eq!(record.solver.name, "scripted");
    }

    let (summary, warnings) = survey(&config.output_dir).expect("survey");
    assert!(warnings.is_empty());
    assert_eq!(summary.complete(), 6);
    assert_eq!(summary.claimed(), 0);
    assert_eq!(zero_byte_files(&config.output_dir), 0);
    assert!(config.output_dir.join("asymmetric/case-3").is_dir());
}

#[test]
fn rerun_against_complete_tree_does_no_work() {
    let (_temp, mut config) = temp_experiment(2, 3);
    config.max_threads = Some(3);
    let first = ScriptedSolverFactory::evaluations(5);
    Scheduler::new(&config, &first).run().expect("first run");
    assert_eq!(first.created(), 6);
    let before = records(&config);

    let second = ScriptedSolverFactory::evaluations(5);
    let report = Scheduler::new(&config, &second).run().expect("second run");

    assert_eq!(second.created(), 0);
    assert_eq!(report.executed, 0);
    assert_eq!(report.denied, 6 * 3);
    assert_eq!(records(&config), before);
}

#[test]
fn deleting_zero_byte_markers_makes_jobs_claimable_again() {
    let (_temp, config) = temp_experiment(2, 2);
    let layout = OutputLayout::new(&config.output_dir);
    let crashed = enumerate_jobs(&config.cases, config.max_runs)
        .nth(1)
        .expect("second job");
    let crashed_path = layout.job_path(&crashed);
    fs::create_dir_all(crashed_path.parent().expect("parent")).expect("case dir");
    fs::write(&crashed_path, "").expect("abandoned marker");

    let factory = ScriptedSolverFactory::evaluations(2);
    let report = Scheduler::new(&config, &factory).run().expect("run");
    assert_eq!(report.executed, 3);
    assert_eq!(report.denied, 1);
    assert_eq!(fs::metadata(&crashed_path).expect("marker").len(), 0);

    let removed = recover(&config.output_dir, false).expect("recover");
    assert_eq!(removed, vec![crashed_path.clone()]);

    let report = Scheduler::new(&config, &factory).run().expect("rerun");
    assert_eq!(report.executed, 1);
    assert_eq!(factory.created(), 4);
    assert_eq!(records(&config).len(), 4);
    assert_eq!(zero_byte_files(&config.output_dir), 0);
}

#[test]
fn panicking_factory_only_fails_its_own_job() {
    let (_temp, config) = temp_experiment(2, 2);
    let factory = PanicOnFirstCreateFactory::evaluations(2);

    let report = Scheduler::new(&config, &factory).run().expect("run");

    assert_eq!(report.executed, 4);
    assert_eq!(report.completed, 3);
    assert_eq!(report.solver_faults, 1);
    assert_eq!(factory.created(), 4);

    let layout = OutputLayout::new(&config.output_dir);
    let mut jobs = enumerate_jobs(&config.cases, config.max_runs);
    let first = jobs.next().expect("first job");
    assert_eq!(fs::metadata(layout.job_path(&first)).expect("marker").len(), 0);
    for job in jobs {
        let record = read_result(&layout.job_path(&job))
            .expect("read result")
            .expect("job complete");
        assert_eq!(record.result.consumed_evaluations, 2);
    }
}

#[test]
fn persisted_consumption_respects_evaluation_budget() {
    let (_temp, mut config) = temp_experiment(1, 3);
    config.budget.max_evaluations = Some(4);
    let factory = ScriptedSolverFactory::evaluations(50);

    Scheduler::new(&config, &factory).run().expect("run");

    for record in records(&config) {
        assert_eq!(record.budget.max_evaluations, 4);
        assert!(record.result.consumed_evaluations <= 4);
        assert_eq!(record.trace.len(), 4);
        assert_eq!(record.result.objective, Some(47.0));
    }
}

#[test]
fn initializer_runs_once_per_case_across_workers() {
    let (_temp, mut config) = temp_experiment(1, 8);
    config.max_threads = Some(4);
    config.initializer = Some("test::counting".to_string());
    let init = Arc::new(CountingInitializer::default());
    let mut registry = InitializerRegistry::new();
    registry
        .register("test::counting", init.clone())
        .expect("register");
    let factory = ScriptedSolverFactory::evaluations(0);

    let report = Scheduler::new(&config, &factory)
        .with_initializers(registry)
        .run()
        .expect("run");

    assert_eq!(report.completed, 8);
    assert_eq!(init.calls(), 1);
    let records = records(&config);
    for record in &records {
        assert_eq!(record.initializer.as_deref(), Some("test::counting"));
        assert_eq!(record.init, records[0].init);
        assert_eq!(record.result.consumed_evaluations, 1);
        assert_eq!(record.best_solution, vec![0, 1, 2, 3, 4]);
    }
}

#[test]
fn two_schedulers_share_one_output_tree() {
    let (_temp, mut config) = temp_experiment(4, 5);
    config.max_threads = Some(3);
    let machine_a = ScriptedSolverFactory::evaluations(3);
    let machine_b = ScriptedSolverFactory::evaluations(3);

    let (report_a, report_b) = thread::scope(|scope| {
        let a = scope.spawn(|| Scheduler::new(&config, &machine_a).run());
        let b = scope.spawn(|| Scheduler::new(&config, &machine_b).run());
        (
            a.join().expect("join a").expect("run a"),
            b.join().expect("join b").expect("run b"),
        )
    });

    assert_eq!(report_a.executed + report_b.executed, 20);
    assert_eq!(machine_a.created() + machine_b.created(), 20);
    assert_eq!(records(&config).len(), 20);
    assert_eq!(zero_byte_files(&config.output_dir), 0);
}
