use prey_lattice_core::{ConfigError, ControlParameter, OutcomeKind, TrialOutcome};
use serde::{Deserialize, Serialize};

const MAX_DECIMALS: u32 = 12;

/// Tuning knobs of a threshold search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of trials run at every probed value.
    pub trials_per_batch: usize,
    /// Decimal precision the bracket must reach.
    pub decimals: u32,
    /// Requires the final batch to contain no aborted trials before stopping.
    pub abort_aware: bool,
    /// Upper bound on the number of bisection steps.
    pub max_iterations: u32,
    /// Worker thread count; defaults to the available parallelism.
    pub worker_threads: Option<usize>,
    /// Seed every trial seed is derived from.
    pub base_seed: u64,
    /// Parameter varied by the search.
    pub parameter: ControlParameter,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            trials_per_batch: 8,
            decimals: 2,
            abort_aware: false,
            max_iterations: 64,
            worker_threads: None,
            base_seed: 0,
            parameter: ControlParameter::DeathRate,
        }
    }
}

impl SearchConfig {
    /// Rejects configurations the search cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trials_per_batch == 0 {
            return Err(ConfigError::InvalidSearchConfig(
                "trials_per_batch must be positive",
            ));
        }
        if self.decimals > MAX_DECIMALS {
            return Err(ConfigError::InvalidSearchConfig(
                "decimals must not exceed 12",
            ));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidSearchConfig(
                "max_iterations must be positive",
            ));
        }
        if self.worker_threads == Some(0) {
            return Err(ConfigError::InvalidSearchConfig(
                "worker_threads must be positive",
            ));
        }
        Ok(())
    }

    /// Width below which the bracket counts as converged.
    #[must_use]
    pub fn tolerance(&self) -> f64 {
        10f64.powi(-(self.decimals as i32))
    }

    /// Reports whether the bracket has reached the configured precision.
    #[must_use]
    pub fn is_converged(&self, lower: f64, upper: f64) -> bool {
        let scale = 10f64.powi(self.decimals as i32);
        (lower * scale).round() == (upper * scale).round()
            || (upper - lower).abs() <= self.tolerance()
    }
}

/// Aggregate outcome counts of one batch.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Control parameter value the batch ran at.
    pub value: f64,
    /// Number of trials that produced an outcome.
    pub trials: usize,
    /// Trials whose predators died out.
    pub extinct: usize,
    /// Trials stopped by the population ceiling.
    pub aborted: usize,
    /// Trials that reached the horizon.
    pub reached_horizon: usize,
}

impl BatchSummary {
    pub(crate) fn new(value: f64) -> Self {
        Self {
            value,
            trials: 0,
            extinct: 0,
            aborted: 0,
            reached_horizon: 0,
        }
    }

    pub(crate) fn record(&mut self, outcome: &TrialOutcome) {
        self.trials += 1;
        match outcome.kind() {
            OutcomeKind::Extinct => self.extinct += 1,
            OutcomeKind::Aborted => self.aborted += 1,
            OutcomeKind::ReachedHorizon => self.reached_horizon += 1,
            OutcomeKind::Cancelled => {}
        }
    }

    /// Reports whether no trial in the batch went extinct.
    #[must_use]
    pub const fn is_extinction_free(&self) -> bool {
        self.extinct == 0
    }
}

/// Result of a converged threshold search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThresholdEstimate {
    /// Parameter that was searched.
    pub parameter: ControlParameter,
    /// Best estimate of the critical value; equal to the survival-side bound.
    pub threshold: f64,
    /// Final survival-side bound.
    pub lower: f64,
    /// Final extinction-side bound.
    pub upper: f64,
    /// Number of bisection steps performed.
    pub iterations: u32,
    /// Every batch run, starting with the two bound batches.
    pub batches: Vec<BatchSummary>,
}

/// Threshold found while another parameter was held at `value`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    /// Parameter held fixed for this point.
    pub swept: ControlParameter,
    /// Value the swept parameter was held at.
    pub value: f64,
    /// Threshold search result at that value.
    pub estimate: ThresholdEstimate,
}
