//! Operational tooling for benchrun output trees.
//!
//! Experiments themselves run through the library (`Scheduler::run`) because
//! the solver is supplied by the embedding application. This binary covers
//! everything around a run: writing a starter config, validating it,
//! reporting progress and performing crash recovery.

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use benchrun::exit_codes;
use benchrun::io::claim::JobClaimStore;
use benchrun::io::config::{DEFAULT_CONFIG_FILE, ExperimentConfig, load_config, write_config};
use benchrun::io::survey::{Survey, recover, survey};
use benchrun::logging;

#[derive(Parser)]
#[command(
    name = "benchrun",
    version,
    about = "Crash-safe distributed experiment runner tooling"
)]
struct Cli {
    /// Experiment config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file if missing.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Load and validate the config and check the output root is writable.
    Validate,
    /// Report complete and claimed-but-incomplete jobs per case.
    Status,
    /// Delete every zero-byte marker and staging file under the output root.
    Recover {
        /// Only list the files that would be deleted.
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Validate => cmd_validate(&cli.config),
        Command::Status => cmd_status(&cli.config),
        Command::Recover { dry_run } => cmd_recover(&cli.config, dry_run),
    }
}

fn cmd_init(config_path: &Path, force: bool) -> Result<i32> {
    if !force && config_path.exists() {
        println!("{} exists; use --force to overwrite", config_path.display());
        return Ok(exit_codes::OK);
    }
    write_config(config_path, &ExperimentConfig::default())
        .with_context(|| format!("write {}", config_path.display()))?;
    println!("wrote {}", config_path.display());
    Ok(exit_codes::OK)
}

fn cmd_validate(config_path: &Path) -> Result<i32> {
    let config = load_config(config_path)?;
    config
        .validate_for_run()
        .with_context(|| format!("validate {}", config_path.display()))?;
    JobClaimStore::new(&config.output_dir).ensure_writable()?;
    let jobs = config.cases.len() * config.max_runs as usize;
    println!(
        "ok: {} cases x {} trials = {} jobs, {} workers, output {}",
        config.cases.len(),
        config.max_runs,
        jobs,
        config.worker_count(),
        config.output_dir.display()
    );
    Ok(exit_codes::OK)
}

fn cmd_status(config_path: &Path) -> Result<i32> {
    let config = load_config(config_path)?;
    let (summary, warnings) = survey(&config.output_dir)?;
    for warning in &warnings {
        eprintln!("warning: {warning}");
    }
    for case in &summary.cases {
        println!(
            "{}/{}: complete={} claimed={} invalid={}",
            case.family, case.case, case.complete, case.claimed, case.invalid
        );
    }
    print_totals(&config, &summary);
    if summary.claimed() > 0 {
        return Ok(exit_codes::INCOMPLETE);
    }
    Ok(exit_codes::OK)
}

fn print_totals(config: &ExperimentConfig, summary: &Survey) {
    let expected = config.cases.len() * config.max_runs as usize;
    println!(
        "total: complete={}/{} claimed={} invalid={} stray_temp_files={}",
        summary.complete(),
        expected,
        summary.claimed(),
        summary.invalid(),
        summary.stray_temp_files
    );
}

fn cmd_recover(config_path: &Path, dry_run: bool) -> Result<i32> {
    let config = load_config(config_path)?;
    let paths = recover(&config.output_dir, dry_run)?;
    for path in &paths {
        println!("{}", path.display());
    }
    let verb = if dry_run { "would remove" } else { "removed" };
    eprintln!("{verb} {} file(s)", paths.len());
    Ok(exit_codes::OK)
}
