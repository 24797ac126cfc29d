#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Movement phase: every agent proposes at most one hop to a neighbouring cell.

use prey_lattice_core::{
    AgentKind, AgentSnapshot, AgentView, CellCoord, CensusView, Command, MigrationScope,
    MovementRule, SimulationParameters,
};
use prey_lattice_world::TerrainGrid;
use rand::{distributions::WeightedIndex, prelude::Distribution, seq::SliceRandom, Rng};

const MIN_HABITAT_DISTANCE: f64 = 1.0e-9;

/// Pure system that turns an agent snapshot into movement commands.
#[derive(Debug)]
pub struct Movement {
    rule: MovementRule,
    migration_rate: f64,
    scope: MigrationScope,
    candidates: Vec<CellCoord>,
    weights: Vec<f64>,
}

impl Movement {
    /// Creates the movement system for the provided run parameters.
    #[must_use]
    pub fn new(parameters: &SimulationParameters) -> Self {
        Self {
            rule: parameters.movement,
            migration_rate: parameters.migration_rate,
            scope: parameters.migration_scope,
            candidates: Vec::new(),
            weights: Vec::new(),
        }
    }

    /// Emits one [`Command::MoveAgent`] for every agent that found a destination.
    ///
    /// Non-migrating agents keep to their own zone whenever it offers a
    /// habitable neighbour. Prey then drop cells holding prey in `census`; the
    /// world rejects any prey that still lands on a cell filled earlier in the
    /// same phase.
    pub fn handle<R: Rng>(
        &mut self,
        agents: &AgentView,
        census: CensusView<'_>,
        terrain: &TerrainGrid,
        rng: &mut R,
        out: &mut Vec<Command>,
    ) {
        for agent in agents.iter() {
            let migrating = self.scope.permits(agent.kind) && rng.gen_bool(self.migration_rate);
            self.collect_candidates(agent, migrating, census, terrain);
            if let Some(to) = self.pick(terrain, rng) {
                if to != agent.cell {
                    out.push(Command::MoveAgent {
                        agent: agent.id,
                        to,
                    });
                }
            }
        }
    }

    fn collect_candidates(
        &mut self,
        agent: &AgentSnapshot,
        migrating: bool,
        census: CensusView<'_>,
        terrain: &TerrainGrid,
    ) {
        self.candidates.clear();
        self.candidates.extend(
            terrain
                .neighbors(agent.cell)
                .iter()
                .filter(|cell| terrain.is_habitable(*cell)),
        );

        if !migrating {
            let zone = terrain.zone_at(agent.cell);
            if self
                .candidates
                .iter()
                .any(|cell| terrain.zone_at(*cell) == zone)
            {
                self.candidates.retain(|cell| terrain.zone_at(*cell) == zone);
            }
        }

        // Zone choice comes first: a prey boxed in by prey stays put.
        if agent.kind == AgentKind::Prey {
            self.candidates.retain(|cell| !census.has_prey(*cell));
        }
    }

    fn pick<R: Rng>(&mut self, terrain: &TerrainGrid, rng: &mut R) -> Option<CellCoord> {
        let MovementRule::HabitatPreference { preferred_value } = self.rule else {
            return self.candidates.choose(rng).copied();
        };

        self.weights.clear();
        for cell in &self.candidates {
            let Some(value) = terrain.habitat_value(*cell) else {
                return self.candidates.choose(rng).copied();
            };
            self.weights
                .push(1.0 / (value - preferred_value).abs().max(MIN_HABITAT_DISTANCE));
        }

        let index = WeightedIndex::new(&self.weights).ok()?.sample(rng);
        self.candidates.get(index).copied()
    }
}
