use std::{
    any::Any,
    num::NonZeroUsize,
    panic::{self, AssertUnwindSafe},
};

use log::{info, warn};
use prey_lattice_core::{ConfigError, ControlParameter, OutcomeKind, TrialOutcome};
use prey_lattice_engine::{StopFlag, TrialPlan};
use rayon::prelude::*;

use crate::{
    derive_trial_seed, BatchSummary, SearchConfig, SearchError, SweepPoint, ThresholdEstimate,
};

/// Bisects a control parameter over batches of concurrent trials.
#[derive(Debug)]
pub struct ThresholdSearch {
    plan: TrialPlan,
    config: SearchConfig,
    pool: rayon::ThreadPool,
    stop: StopFlag,
}

impl ThresholdSearch {
    /// Validates the configuration and builds the worker pool.
    pub fn new(plan: TrialPlan, config: SearchConfig) -> Result<Self, SearchError> {
        config.validate()?;
        plan.parameters.validate()?;
        let threads = config.worker_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        });
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("trial-worker-{index}"))
            .build()?;
        info!(
            "threshold search over {} with {} trials per batch on {threads} threads",
            config.parameter.label(),
            config.trials_per_batch
        );
        Ok(Self {
            plan,
            config,
            pool,
            stop: StopFlag::new(),
        })
    }

    /// Shared flag that cancels outstanding trials at their next step boundary.
    ///
    /// The flag is never lowered again: once raised, every later search,
    /// sweep or batch on this instance returns [`SearchError::Cancelled`].
    #[must_use]
    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    /// Search configuration in use.
    #[must_use]
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Runs one batch of trials with the control parameter set to `value`.
    pub fn run_batch(&self, value: f64) -> Result<BatchSummary, SearchError> {
        let batch = self.plan_at(&self.plan, value)?;
        let mut summaries = self.run_batches(&[(value, &batch)])?;
        Ok(summaries.remove(0))
    }

    /// Finds the critical value between a survival-side `lower` and an extinction-side `upper`.
    ///
    /// The bounds need not be ordered numerically.
    pub fn search(&self, lower: f64, upper: f64) -> Result<ThresholdEstimate, SearchError> {
        self.search_plan(&self.plan, lower, upper)
    }

    /// Repeats the search with `swept` held at each of `values`.
    pub fn sweep(
        &self,
        swept: ControlParameter,
        values: &[f64],
        lower: f64,
        upper: f64,
    ) -> Result<Vec<SweepPoint>, SearchError> {
        if swept == self.config.parameter {
            return Err(ConfigError::InvalidSearchConfig(
                "the swept parameter must differ from the searched one",
            )
            .into());
        }

        let mut points = Vec::with_capacity(values.len());
        for value in values {
            info!("sweep point {} = {value}", swept.label());
            let plan = self
                .plan
                .with_parameters(swept.apply(&self.plan.parameters, *value));
            plan.parameters.validate()?;
            let estimate = self.search_plan(&plan, lower, upper)?;
            points.push(SweepPoint {
                swept,
                value: *value,
                estimate,
            });
        }
        Ok(points)
    }

    fn search_plan(
        &self,
        plan: &TrialPlan,
        mut lower: f64,
        mut upper: f64,
    ) -> Result<ThresholdEstimate, SearchError> {
        let lower_plan = self.plan_at(plan, lower)?;
        let upper_plan = self.plan_at(plan, upper)?;
        let mut batches = self.run_batches(&[(lower, &lower_plan), (upper, &upper_plan)])?;
        let (lower_batch, upper_batch) = (batches[0], batches[1]);
        if !lower_batch.is_extinction_free() || upper_batch.is_extinction_free() {
            warn!(
                "bounds {lower} and {upper} do not bracket the threshold ({} and {} extinctions)",
                lower_batch.extinct, upper_batch.extinct
            );
            return Err(ConfigError::BoundsDoNotBracket {
                lower_extinct: lower_batch.extinct,
                upper_extinct: upper_batch.extinct,
            }
            .into());
        }

        let mut last_aborted = lower_batch.aborted + upper_batch.aborted;
        let mut iterations = 0;
        loop {
            let settled = !self.config.abort_aware || last_aborted == 0;
            if settled && self.config.is_converged(lower, upper) {
                break;
            }
            if iterations >= self.config.max_iterations {
                warn!(
                    "bisection stopped after {iterations} iterations between {lower} and {upper}"
                );
                return Err(SearchError::NotConverged { iterations });
            }

            let mid = lower + (upper - lower) / 2.0;
            let mid_plan = self.plan_at(plan, mid)?;
            let batch = self.run_batches(&[(mid, &mid_plan)])?.remove(0);
            iterations += 1;
            if batch.is_extinction_free() {
                lower = mid;
            } else {
                upper = mid;
            }
            last_aborted = batch.aborted;
            info!(
                "iteration {iterations}: {} = {mid} had {}/{} extinctions; bracket [{lower}, {upper}]",
                self.config.parameter.label(),
                batch.extinct,
                batch.trials
            );
            batches.push(batch);
        }

        Ok(ThresholdEstimate {
            parameter: self.config.parameter,
            threshold: lower,
            lower,
            upper,
            iterations,
            batches,
        })
    }

    fn plan_at(&self, plan: &TrialPlan, value: f64) -> Result<TrialPlan, SearchError> {
        let parameters = self.config.parameter.apply(&plan.parameters, value);
        parameters.validate()?;
        Ok(plan.with_parameters(parameters))
    }

    /// Fans every `(value, plan)` batch out in a single join and summarises each in input order.
    fn run_batches(&self, batches: &[(f64, &TrialPlan)]) -> Result<Vec<BatchSummary>, SearchError> {
        let trials = self.config.trials_per_batch;
        let jobs: Vec<(usize, usize)> = (0..batches.len())
            .flat_map(|batch| (0..trials).map(move |trial| (batch, trial)))
            .collect();

        let results: Vec<Result<TrialOutcome, SearchError>> = self.pool.install(|| {
            jobs.into_par_iter()
                .map(|(batch, trial)| {
                    let (value, plan) = batches[batch];
                    let seed = derive_trial_seed(self.config.base_seed, value, trial);
                    run_guarded(plan, seed, &self.stop, value, trial)
                })
                .collect()
        });

        let mut summaries: Vec<BatchSummary> = batches
            .iter()
            .map(|(value, _)| BatchSummary::new(*value))
            .collect();
        for (index, result) in results.into_iter().enumerate() {
            let outcome = result?;
            if outcome.kind() == OutcomeKind::Cancelled {
                return Err(SearchError::Cancelled);
            }
            summaries[index / trials].record(&outcome);
        }
        if self.stop.is_set() {
            return Err(SearchError::Cancelled);
        }

        for summary in &summaries {
            info!(
                "batch at {} = {}: {} extinct, {} aborted, {} reached horizon",
                self.config.parameter.label(),
                summary.value,
                summary.extinct,
                summary.aborted,
                summary.reached_horizon
            );
        }
        Ok(summaries)
    }
}

fn run_guarded(
    plan: &TrialPlan,
    seed: u64,
    stop: &StopFlag,
    value: f64,
    trial: usize,
) -> Result<TrialOutcome, SearchError> {
    match panic::catch_unwind(AssertUnwindSafe(|| plan.run(seed, stop))) {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(source)) => Err(SearchError::TrialFailed {
            value,
            trial,
            source,
        }),
        Err(payload) => Err(SearchError::TrialPanicked {
            value,
            trial,
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
