#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs prey lattice trials and threshold searches.

mod config;
mod records;

use std::{
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use prey_lattice_engine::StopFlag;
use prey_lattice_search::ThresholdSearch;

use crate::{
    config::ExperimentConfig,
    records::{write_json, HistoryEntry, SearchRecord, SweepRecord, TrialRecord},
};

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "prey-lattice", version, about = "Predator-prey lattice extinction experiments")]
struct Cli {
    /// Experiment description (TOML); the quadrant experiment when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Result file (JSON); stdout when omitted
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Wall-clock budget in seconds after which running trials are cancelled
    #[arg(long, global = true)]
    time_limit: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a single trial
    Trial {
        /// Trial seed; the configured base seed when omitted
        #[arg(short, long)]
        seed: Option<u64>,

        /// Record the population after every step
        #[arg(long)]
        history: bool,
    },
    /// Bisect the configured parameter between the configured bounds
    Search,
    /// Repeat the search for every configured sweep value
    Sweep,
}

/// Entry point for the prey lattice command-line interface.
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = ExperimentConfig::load(cli.config.as_deref())?;
    let output = cli.output.as_deref();
    let time_limit = cli.time_limit.map(Duration::from_secs);

    match cli.command {
        Commands::Trial { seed, history } => {
            run_trial(&config, seed, history, time_limit, output)
        }
        Commands::Search => run_search(&config, time_limit, output),
        Commands::Sweep => run_sweep(&config, time_limit, output),
    }
}

fn run_trial(
    config: &ExperimentConfig,
    seed: Option<u64>,
    history: bool,
    time_limit: Option<Duration>,
    output: Option<&Path>,
) -> Result<()> {
    let plan = config.plan()?;
    let seed = seed.unwrap_or(config.search.base_seed);
    let stop = StopFlag::new();
    arm_time_limit(&stop, time_limit)?;

    let mut entries = Vec::new();
    let outcome = plan
        .run_observed(seed, &stop, |step, population| {
            if history {
                entries.push(HistoryEntry { step, population });
            }
        })
        .with_context(|| format!("trial with seed {seed} failed"))?;
    info!(
        "trial {seed} ended as {:?} after {} steps",
        outcome.kind(),
        outcome.steps()
    );

    write_json(
        &TrialRecord {
            config,
            seed,
            outcome,
            history: history.then_some(entries),
        },
        output,
    )
}

fn run_search(
    config: &ExperimentConfig,
    time_limit: Option<Duration>,
    output: Option<&Path>,
) -> Result<()> {
    let search = ThresholdSearch::new(config.plan()?, config.search)?;
    arm_time_limit(&search.stop_flag(), time_limit)?;

    let estimate = search
        .search(config.bounds.lower, config.bounds.upper)
        .context("threshold search failed")?;
    info!(
        "{} threshold {} after {} iterations",
        estimate.parameter.label(),
        estimate.threshold,
        estimate.iterations
    );
    write_json(&SearchRecord { config, estimate }, output)
}

fn run_sweep(
    config: &ExperimentConfig,
    time_limit: Option<Duration>,
    output: Option<&Path>,
) -> Result<()> {
    let search = ThresholdSearch::new(config.plan()?, config.search)?;
    arm_time_limit(&search.stop_flag(), time_limit)?;

    let points = search
        .sweep(
            config.sweep.parameter,
            &config.sweep.values,
            config.bounds.lower,
            config.bounds.upper,
        )
        .context("threshold sweep failed")?;
    for point in &points {
        info!(
            "{} = {}: threshold {}",
            point.swept.label(),
            point.value,
            point.estimate.threshold
        );
    }
    write_json(&SweepRecord { config, points }, output)
}

/// Raises `stop` from a detached timer thread once `limit` has elapsed.
fn arm_time_limit(stop: &StopFlag, limit: Option<Duration>) -> Result<()> {
    let Some(limit) = limit else {
        return Ok(());
    };
    let stop = stop.clone();
    let _timer = thread::Builder::new()
        .name("time-limit".to_owned())
        .spawn(move || {
            thread::sleep(limit);
            warn!("time limit of {}s reached; cancelling", limit.as_secs());
            stop.request_stop();
        })
        .context("failed to start the time limit thread")?;
    Ok(())
}
