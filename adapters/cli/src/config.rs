//! TOML description of an experiment.
//!
//! Every table is optional. An empty file reproduces the quadrant extinction
//! experiment: a 16×16 torus split into four 8×8 zones, 5 % prey and predator
//! seeding, growth rate 0.2, and migration open to predators only. Trials run
//! for 1000 steps with a population ceiling of 1200 that applies once those
//! 1000 steps have passed, and ten abort-aware trials per batch bisect the
//! death rate between 0.1 and 0.4. The sweep varies the migration rate over 0, 0.25, 0.5, 0.75
//! and 1. A table that is present but incomplete takes the remaining fields
//! from the library defaults of its type.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use prey_lattice_core::{
    BoundaryPolicy, ConfigError, ControlParameter, MigrationScope, SimulationParameters,
    TrialLimits,
};
use prey_lattice_engine::{TerrainRecipe, TerrainSource, TrialPlan};
use prey_lattice_search::SearchConfig;
use prey_lattice_world::PatchLayout;
use serde::{Deserialize, Serialize};

/// Complete experiment: terrain, rates, limits and search settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ExperimentConfig {
    /// Terrain recipe and edge behaviour.
    pub(crate) terrain: TerrainSettings,
    /// Rates shared by every trial.
    pub(crate) parameters: SimulationParameters,
    /// Stopping limits of a single trial.
    pub(crate) limits: TrialLimits,
    /// Bisection tuning.
    pub(crate) search: SearchConfig,
    /// Initial bracket of the searched parameter.
    pub(crate) bounds: Bounds,
    /// Values held by the `sweep` subcommand.
    pub(crate) sweep: SweepSettings,
}

/// `[terrain]` table: a tagged recipe plus the boundary policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct TerrainSettings {
    /// Grid recipe, selected by its `kind` key.
    #[serde(flatten)]
    pub(crate) recipe: TerrainRecipe,
    /// Edge behaviour of the grid.
    #[serde(default)]
    pub(crate) boundary: BoundaryPolicy,
}

/// Survival-side and extinction-side starting values.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Bounds {
    /// Value expected to produce no extinctions.
    pub(crate) lower: f64,
    /// Value expected to produce at least one extinction.
    pub(crate) upper: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            lower: 0.1,
            upper: 0.4,
        }
    }
}

/// Parameter held fixed at each sweep point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct SweepSettings {
    pub(crate) parameter: ControlParameter,
    pub(crate) values: Vec<f64>,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            parameter: ControlParameter::MigrationRate,
            values: vec![0.0, 0.25, 0.5, 0.75, 1.0],
        }
    }
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            terrain: TerrainSettings {
                recipe: TerrainRecipe::Patches(PatchLayout {
                    habitable_area: 256,
                    patch_count: 4,
                    gap: 0,
                }),
                boundary: BoundaryPolicy::Toroidal,
            },
            parameters: SimulationParameters {
                migration_scope: MigrationScope::PredatorsOnly,
                ..SimulationParameters::default()
            },
            limits: TrialLimits {
                horizon: 1_000,
                population_ceiling: Some(1_200),
                ceiling_grace_steps: 1_000,
            },
            search: SearchConfig {
                trials_per_batch: 10,
                abort_aware: true,
                ..SearchConfig::default()
            },
            bounds: Bounds::default(),
            sweep: SweepSettings::default(),
        }
    }
}

impl ExperimentConfig {
    /// Reads `path`, or returns the default experiment when no path is given.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("failed to load config: {}", path.display()))
    }

    /// Parses and validates a TOML document.
    pub(crate) fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("malformed experiment config")?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects rates and search settings before any trial runs.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        self.parameters.validate()?;
        self.search.validate()?;
        if self.sweep.parameter == self.search.parameter {
            return Err(ConfigError::InvalidSearchConfig(
                "the swept parameter must differ from the searched one",
            ));
        }
        Ok(())
    }

    /// Builds the trial plan shared by every subcommand.
    pub(crate) fn plan(&self) -> Result<TrialPlan, ConfigError> {
        let terrain =
            TerrainSource::from_recipe(self.terrain.recipe.clone(), self.terrain.boundary)?;
        Ok(TrialPlan {
            terrain,
            parameters: self.parameters,
            limits: self.limits,
        })
    }
}
