use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use log::debug;
use prey_lattice_core::{
    ConfigError, InvariantViolation, OutcomeKind, PopulationCounts, SimulationParameters,
    TrialLimits, TrialOutcome,
};
use prey_lattice_world::{query, World};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::{initialize, SimulationEngine, TerrainSource, TrialError};

/// Cooperative cancellation signal shared between a driver and its trials.
#[derive(Clone, Debug, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    /// Creates a flag that is not yet set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks every holder of the flag to stop at its next step boundary.
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Reports whether a stop was requested.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Steps one world until a stopping condition is reached.
#[derive(Debug)]
pub struct TrialRunner {
    engine: SimulationEngine,
    world: World,
    limits: TrialLimits,
}

impl TrialRunner {
    /// Prepares a runner for an initialized world.
    pub fn new(
        world: World,
        parameters: &SimulationParameters,
        limits: TrialLimits,
    ) -> Result<Self, ConfigError> {
        let engine = SimulationEngine::new(parameters, query::terrain(&world))?;
        Ok(Self {
            engine,
            world,
            limits,
        })
    }

    /// Runs the trial to completion.
    pub fn run<R: Rng>(
        &mut self,
        rng: &mut R,
        stop: &StopFlag,
    ) -> Result<TrialOutcome, InvariantViolation> {
        self.run_observed(rng, stop, |_, _| {})
    }

    /// Runs the trial, reporting the step index and population after every step.
    ///
    /// The horizon and the stop flag are checked before each step; extinction
    /// and the population ceiling are checked after it.
    pub fn run_observed<R, F>(
        &mut self,
        rng: &mut R,
        stop: &StopFlag,
        mut observer: F,
    ) -> Result<TrialOutcome, InvariantViolation>
    where
        R: Rng,
        F: FnMut(u64, PopulationCounts),
    {
        let mut steps = 0;
        let mut population = query::population(&self.world);
        if population.predators == 0 {
            return Ok(TrialOutcome::new(OutcomeKind::Extinct, steps, population));
        }

        let kind = loop {
            if steps >= self.limits.horizon {
                break OutcomeKind::ReachedHorizon;
            }
            if stop.is_set() {
                break OutcomeKind::Cancelled;
            }

            population = self.engine.step(&mut self.world, rng)?.population;
            steps += 1;
            observer(steps, population);

            if population.predators == 0 {
                break OutcomeKind::Extinct;
            }
            if let Some(ceiling) = self.limits.population_ceiling {
                if steps > self.limits.ceiling_grace_steps && population.total() > ceiling {
                    break OutcomeKind::Aborted;
                }
            }
        };

        debug!(
            "trial finished after {steps} steps as {kind:?} with {} prey and {} predators",
            population.prey, population.predators
        );
        Ok(TrialOutcome::new(kind, steps, population))
    }

    /// Read-only access to the world being stepped.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }
}

/// Self-contained description of a trial: terrain, rates and limits.
#[derive(Clone, Debug)]
pub struct TrialPlan {
    /// Where the trial obtains its terrain.
    pub terrain: TerrainSource,
    /// Rates used by every phase.
    pub parameters: SimulationParameters,
    /// Stopping limits.
    pub limits: TrialLimits,
}

impl TrialPlan {
    /// Runs the plan with a generator seeded from `seed`.
    pub fn run(&self, seed: u64, stop: &StopFlag) -> Result<TrialOutcome, TrialError> {
        self.run_observed(seed, stop, |_, _| {})
    }

    /// Runs the plan and reports the population after every step.
    pub fn run_observed<F>(
        &self,
        seed: u64,
        stop: &StopFlag,
        observer: F,
    ) -> Result<TrialOutcome, TrialError>
    where
        F: FnMut(u64, PopulationCounts),
    {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let terrain = self.terrain.resolve(&mut rng)?;
        let world = initialize(terrain, &self.parameters, &mut rng)?;
        let mut runner = TrialRunner::new(world, &self.parameters, self.limits)?;
        Ok(runner.run_observed(&mut rng, stop, observer)?)
    }

    /// Copy of the plan with different rates.
    #[must_use]
    pub fn with_parameters(&self, parameters: SimulationParameters) -> Self {
        Self {
            terrain: self.terrain.clone(),
            parameters,
            limits: self.limits,
        }
    }
}
