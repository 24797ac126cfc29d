#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Reproduction phase: empty habitable cells spawn prey.

use prey_lattice_core::{AgentKind, BirthCause, CensusView, Command};
use prey_lattice_world::TerrainGrid;
use rand::Rng;

/// Pure system that seeds new prey on habitable cells without prey.
#[derive(Clone, Copy, Debug)]
pub struct Reproduction {
    growth_rate: f64,
}

impl Reproduction {
    /// Creates the reproduction system for the provided per-cell birth probability.
    #[must_use]
    pub const fn new(growth_rate: f64) -> Self {
        Self { growth_rate }
    }

    /// Draws one birth per prey-free habitable cell in row-major order.
    pub fn handle<R: Rng>(
        &self,
        terrain: &TerrainGrid,
        census: CensusView<'_>,
        rng: &mut R,
        out: &mut Vec<Command>,
    ) {
        for cell in terrain.cells() {
            if !terrain.is_habitable(cell) || census.has_prey(cell) {
                continue;
            }
            if rng.gen_bool(self.growth_rate) {
                out.push(Command::SpawnAgent {
                    kind: AgentKind::Prey,
                    cell,
                    cause: BirthCause::Reproduction,
                });
            }
        }
    }
}
