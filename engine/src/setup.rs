use std::sync::Arc;

use log::{debug, warn};
use prey_lattice_core::{
    AgentKind, BirthCause, BoundaryPolicy, Command, ConfigError, SimulationParameters, ZoneId,
};
use prey_lattice_world::{self as world, NoiseLayout, NoiseOffset, PatchLayout, TerrainGrid, World};
use rand::{seq::index, Rng};
use serde::{Deserialize, Serialize};

use crate::TrialError;

/// Declarative description of how to build a terrain grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerrainRecipe {
    /// Every cell belongs to zone 1.
    Uniform {
        /// Number of columns.
        columns: u32,
        /// Number of rows.
        rows: u32,
    },
    /// Square patches separated by uninhabitable gaps.
    Patches(PatchLayout),
    /// Thresholded fractal noise labelled into islands.
    Noise(NoiseLayout),
    /// Explicit row-major zone identifiers.
    Zones {
        /// Number of columns.
        columns: u32,
        /// Number of rows.
        rows: u32,
        /// Zone of every cell; 0 marks uninhabitable cells.
        zones: Vec<u32>,
    },
}

impl TerrainRecipe {
    /// Builds the terrain described by the recipe.
    pub fn build(&self, boundary: BoundaryPolicy) -> Result<TerrainGrid, ConfigError> {
        match self {
            Self::Uniform { columns, rows } => TerrainGrid::uniform(*columns, *rows, boundary),
            Self::Patches(layout) => TerrainGrid::from_patches(*layout, boundary),
            Self::Noise(layout) => TerrainGrid::from_noise(layout, boundary),
            Self::Zones {
                columns,
                rows,
                zones,
            } => TerrainGrid::from_zones(
                *columns,
                *rows,
                zones.iter().copied().map(ZoneId::new).collect(),
                boundary,
            ),
        }
    }

    /// Reports whether the recipe yields a different grid for every trial seed.
    #[must_use]
    pub fn varies_per_trial(&self) -> bool {
        matches!(
            self,
            Self::Noise(NoiseLayout {
                offset: NoiseOffset::Seeded(_),
                ..
            })
        )
    }
}

/// Where a trial obtains its terrain.
#[derive(Clone, Debug)]
pub enum TerrainSource {
    /// One deterministic grid shared by every trial.
    Shared(Arc<TerrainGrid>),
    /// A fresh grid built by every trial, with seeded noise reseeded from the trial generator.
    PerTrial {
        /// Grid description.
        recipe: TerrainRecipe,
        /// Edge behaviour of the grid.
        boundary: BoundaryPolicy,
    },
}

impl TerrainSource {
    /// Builds a shared grid for deterministic recipes and defers seeded ones to each trial.
    pub fn from_recipe(
        recipe: TerrainRecipe,
        boundary: BoundaryPolicy,
    ) -> Result<Self, ConfigError> {
        if recipe.varies_per_trial() {
            // Fail on unusable layouts before any worker starts.
            let _ = recipe.build(boundary)?;
            Ok(Self::PerTrial { recipe, boundary })
        } else {
            Ok(Self::Shared(Arc::new(recipe.build(boundary)?)))
        }
    }

    /// Produces the grid for one trial.
    pub fn resolve<R: Rng>(&self, rng: &mut R) -> Result<Arc<TerrainGrid>, ConfigError> {
        match self {
            Self::Shared(terrain) => Ok(Arc::clone(terrain)),
            Self::PerTrial { recipe, boundary } => {
                let recipe = match recipe {
                    TerrainRecipe::Noise(layout) => TerrainRecipe::Noise(NoiseLayout {
                        offset: NoiseOffset::Seeded(rng.gen()),
                        ..*layout
                    }),
                    other => other.clone(),
                };
                recipe.build(*boundary).map(Arc::new)
            }
        }
    }
}

/// Creates a world over `terrain` seeded with the initial prey and predator populations.
///
/// Agents are placed on distinct habitable cells sampled without replacement;
/// the first `floor(H · initial_prey_fraction)` samples receive prey and the
/// following `floor(H · initial_predator_fraction)` receive predators.
pub fn initialize<R: Rng>(
    terrain: Arc<TerrainGrid>,
    parameters: &SimulationParameters,
    rng: &mut R,
) -> Result<World, TrialError> {
    parameters.validate()?;
    let habitable = terrain.habitable_cells();
    let available = habitable.len();
    if available == 0
        && (parameters.initial_prey_fraction > 0.0 || parameters.initial_predator_fraction > 0.0)
    {
        warn!("refusing to seed agents on terrain without habitable cells");
        return Err(ConfigError::NoHabitableCells.into());
    }

    let prey = fraction_of(available, parameters.initial_prey_fraction);
    let predators = fraction_of(available, parameters.initial_predator_fraction);
    let requested = prey + predators;
    if requested > available {
        return Err(ConfigError::InsufficientHabitat {
            requested,
            available,
        }
        .into());
    }

    let mut world = World::new(terrain);
    let mut events = Vec::new();
    for (position, sampled) in index::sample(rng, available, requested).iter().enumerate() {
        let kind = if position < prey {
            AgentKind::Prey
        } else {
            AgentKind::Predator
        };
        world::apply(
            &mut world,
            Command::SpawnAgent {
                kind,
                cell: habitable[sampled],
                cause: BirthCause::Seeding,
            },
            &mut events,
        )?;
    }

    debug!("seeded {prey} prey and {predators} predators on {available} habitable cells");
    Ok(world)
}

fn fraction_of(available: usize, fraction: f64) -> usize {
    (available as f64 * fraction).floor() as usize
}
