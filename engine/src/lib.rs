#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Step composition and trial execution for the prey lattice simulation.
//!
//! [`SimulationEngine`] wires the phase systems to the world in a fixed order,
//! [`initialize`] seeds a fresh world and [`TrialRunner`] steps it until one of
//! the stopping conditions in [`TrialLimits`](prey_lattice_core::TrialLimits)
//! is met. [`TrialPlan`] bundles everything a worker thread needs to run one
//! trial from a seed.

use prey_lattice_core::{ConfigError, InvariantViolation};
use thiserror::Error;

mod engine;
mod setup;
mod trial;

pub use engine::{SimulationEngine, StepReport};
pub use setup::{initialize, TerrainRecipe, TerrainSource};
pub use trial::{StopFlag, TrialPlan, TrialRunner};

/// Failure that prevents a trial from producing an outcome.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum TrialError {
    /// The trial configuration was rejected before stepping.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The world detected an internal inconsistency while stepping.
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}
