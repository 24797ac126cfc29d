#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Concurrent extinction-threshold search.
//!
//! A [`ThresholdSearch`] runs batches of independent trials on a rayon pool
//! and bisects a [`ControlParameter`](prey_lattice_core::ControlParameter)
//! between a survival-side and an extinction-side bound until the bracket is
//! narrower than the requested decimal precision.

use prey_lattice_core::ConfigError;
use prey_lattice_engine::TrialError;
use thiserror::Error;

mod config;
mod search;
mod seed;

pub use config::{BatchSummary, SearchConfig, SweepPoint, ThresholdEstimate};
pub use search::ThresholdSearch;
pub use seed::derive_trial_seed;

/// Failure that ends a threshold search without an estimate.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The search configuration or its bounds were rejected.
    #[error("search setup rejected: {0}")]
    Setup(#[from] ConfigError),
    /// A trial returned an error instead of an outcome.
    #[error("trial {trial} at {value} failed: {source}")]
    TrialFailed {
        /// Control parameter value of the failing batch.
        value: f64,
        /// Index of the trial within its batch.
        trial: usize,
        /// Underlying trial failure.
        source: TrialError,
    },
    /// A trial panicked.
    #[error("trial {trial} at {value} panicked: {message}")]
    TrialPanicked {
        /// Control parameter value of the failing batch.
        value: f64,
        /// Index of the trial within its batch.
        trial: usize,
        /// Panic payload rendered as text.
        message: String,
    },
    /// The stop flag was raised before the search converged.
    #[error("search was cancelled")]
    Cancelled,
    /// The iteration cap was reached before the bracket converged.
    #[error("search did not converge within {iterations} iterations")]
    NotConverged {
        /// Number of bisection steps performed.
        iterations: u32,
    },
    /// The worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
