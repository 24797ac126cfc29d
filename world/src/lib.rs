#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state for the prey lattice simulation.
//!
//! The world pairs an immutable [`TerrainGrid`] with the [`AgentStore`] that
//! owns every agent. All mutation funnels through [`apply`], which validates
//! each [`Command`] against the terrain and the current census before touching
//! the store, and reports the result as [`Event`] values.

use std::sync::Arc;

use prey_lattice_core::{
    AgentKind, Command, Event, InvariantViolation, MoveRejection, SpawnRejection,
};

mod store;
mod terrain;

pub use store::{Agent, AgentStore};
pub use terrain::{Neighbors, NoiseLayout, NoiseOffset, PatchLayout, TerrainGrid};

/// Represents the authoritative simulation state of a single trial.
#[derive(Clone, Debug)]
pub struct World {
    store: AgentStore,
    tick_index: u64,
}

impl World {
    /// Creates an empty world over the provided terrain.
    #[must_use]
    pub fn new(terrain: Arc<TerrainGrid>) -> Self {
        Self {
            store: AgentStore::new(terrain),
            tick_index: 0,
        }
    }
}

/// Applies the provided command to the world, mutating state deterministically.
///
/// Spawn and move requests that break a placement rule are reported as
/// rejection events. Commands naming dead agents are invariant violations and
/// abort the trial.
pub fn apply(
    world: &mut World,
    command: Command,
    out_events: &mut Vec<Event>,
) -> Result<(), InvariantViolation> {
    match command {
        Command::Tick => {
            world.tick_index = world.tick_index.saturating_add(1);
            world.store.age_all();
            out_events.push(Event::TimeAdvanced {
                tick: world.tick_index,
            });
        }
        Command::SpawnAgent { kind, cell, cause } => {
            if !world.store.terrain().is_habitable(cell) {
                out_events.push(Event::SpawnRejected {
                    kind,
                    cell,
                    reason: SpawnRejection::Uninhabitable,
                });
                return Ok(());
            }
            match world.store.create(kind, cell) {
                Some(agent) => out_events.push(Event::AgentSpawned {
                    agent,
                    kind,
                    cell,
                    cause,
                }),
                None => out_events.push(Event::SpawnRejected {
                    kind,
                    cell,
                    reason: SpawnRejection::PreyPresent,
                }),
            }
        }
        Command::MoveAgent { agent, to } => {
            let current = *world
                .store
                .get(agent)
                .ok_or(InvariantViolation::UnknownAgent(agent))?;
            let rejection = if !world.store.terrain().is_habitable(to) {
                Some(MoveRejection::Uninhabitable)
            } else if current.kind() == AgentKind::Prey
                && current.cell() != to
                && world.store.census(to).prey > 0
            {
                Some(MoveRejection::PreyPresent)
            } else {
                None
            };

            if let Some(reason) = rejection {
                out_events.push(Event::MoveRejected { agent, to, reason });
            } else {
                let from = world.store.move_agent(agent, to)?;
                out_events.push(Event::AgentMoved { agent, from, to });
            }
        }
        Command::RemoveAgent { agent, cause } => {
            let removed = world.store.remove(agent)?;
            out_events.push(Event::AgentRemoved {
                agent,
                kind: removed.kind(),
                cell: removed.cell(),
                cause,
            });
        }
        Command::FeedAgent { agent } => {
            world.store.mark_fed(agent)?;
            out_events.push(Event::AgentFed { agent });
        }
    }
    Ok(())
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::sync::Arc;

    use super::{AgentStore, TerrainGrid, World};
    use prey_lattice_core::{AgentId, AgentView, CellCoord, CensusView, PopulationCounts};

    /// Provides read-only access to the world's terrain.
    #[must_use]
    pub fn terrain(world: &World) -> &Arc<TerrainGrid> {
        world.store.terrain()
    }

    /// Captures a read-only view of every live agent.
    #[must_use]
    pub fn agent_view(world: &World) -> AgentView {
        world.store.agent_view()
    }

    /// Exposes a read-only view of the dense per-cell census.
    #[must_use]
    pub fn census_view(world: &World) -> CensusView<'_> {
        world.store.census_view()
    }

    /// Population totals split by kind.
    #[must_use]
    pub fn population(world: &World) -> PopulationCounts {
        world.store.population()
    }

    /// Handles of the agents currently in the cell.
    #[must_use]
    pub fn agents_at(world: &World, cell: CellCoord) -> Vec<AgentId> {
        world.store.agents_at(cell)
    }

    /// Number of ticks applied since the world was created.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }

    /// Provides read-only access to the underlying agent store.
    #[must_use]
    pub fn store(world: &World) -> &AgentStore {
        &world.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prey_lattice_core::{
        AgentId, BirthCause, BoundaryPolicy, CellCoord, PopulationCounts, RemovalCause, ZoneId,
    };

    fn strip_world() -> World {
        let zones = vec![
            ZoneId::new(1),
            ZoneId::new(1),
            ZoneId::UNINHABITABLE,
            ZoneId::new(2),
        ];
        let terrain =
            TerrainGrid::from_zones(4, 1, zones, BoundaryPolicy::Clipped).expect("terrain");
        World::new(Arc::new(terrain))
    }

    fn spawn(world: &mut World, kind: AgentKind, cell: CellCoord) -> AgentId {
        let mut events = Vec::new();
        apply(
            world,
            Command::SpawnAgent {
                kind,
                cell,
                cause: BirthCause::Seeding,
            },
            &mut events,
        )
        .expect("spawn applies");
        match events.as_slice() {
            [Event::AgentSpawned { agent, .. }] => *agent,
            other => panic!("unexpected spawn events: {other:?}"),
        }
    }

    #[test]
    fn tick_advances_clock_and_ages_agents() {
        let mut world = strip_world();
        let id = spawn(&mut world, AgentKind::Prey, CellCoord::new(0, 0));
        let mut events = Vec::new();
        apply(&mut world, Command::Tick, &mut events).expect("tick");

        assert_eq!(events, vec![Event::TimeAdvanced { tick: 1 }]);
        assert_eq!(query::tick_index(&world), 1);
        assert_eq!(
            query::store(&world).get(id).map(Agent::age_since_fed),
            Some(1)
        );
    }

    #[test]
    fn spawn_on_water_is_rejected() {
        let mut world = strip_world();
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::SpawnAgent {
                kind: AgentKind::Predator,
                cell: CellCoord::new(2, 0),
                cause: BirthCause::Seeding,
            },
            &mut events,
        )
        .expect("apply");

        assert_eq!(
            events,
            vec![Event::SpawnRejected {
                kind: AgentKind::Predator,
                cell: CellCoord::new(2, 0),
                reason: SpawnRejection::Uninhabitable,
            }]
        );
        assert_eq!(query::population(&world), PopulationCounts::default());
    }

    #[test]
    fn prey_cannot_move_onto_prey() {
        let mut world = strip_world();
        let mover = spawn(&mut world, AgentKind::Prey, CellCoord::new(0, 0));
        let _ = spawn(&mut world, AgentKind::Prey, CellCoord::new(1, 0));
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::MoveAgent {
                agent: mover,
                to: CellCoord::new(1, 0),
            },
            &mut events,
        )
        .expect("apply");

        assert_eq!(
            events,
            vec![Event::MoveRejected {
                agent: mover,
                to: CellCoord::new(1, 0),
                reason: MoveRejection::PreyPresent,
            }]
        );
        assert_eq!(query::agents_at(&world, CellCoord::new(0, 0)), vec![mover]);
    }

    #[test]
    fn predators_may_share_cells_with_prey() {
        let mut world = strip_world();
        let _ = spawn(&mut world, AgentKind::Prey, CellCoord::new(1, 0));
        let hunter = spawn(&mut world, AgentKind::Predator, CellCoord::new(0, 0));
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::MoveAgent {
                agent: hunter,
                to: CellCoord::new(1, 0),
            },
            &mut events,
        )
        .expect("apply");

        assert_eq!(
            events,
            vec![Event::AgentMoved {
                agent: hunter,
                from: CellCoord::new(0, 0),
                to: CellCoord::new(1, 0),
            }]
        );
        let census = query::census_view(&world).at(CellCoord::new(1, 0));
        assert_eq!((census.prey, census.predators), (1, 1));
    }

    #[test]
    fn removing_a_dead_agent_is_an_invariant_violation() {
        let mut world = strip_world();
        let id = spawn(&mut world, AgentKind::Predator, CellCoord::new(3, 0));
        let mut events = Vec::new();
        let remove = Command::RemoveAgent {
            agent: id,
            cause: RemovalCause::Mortality,
        };
        apply(&mut world, remove, &mut events).expect("first removal");
        assert_eq!(
            apply(&mut world, remove, &mut events),
            Err(InvariantViolation::UnknownAgent(id))
        );
        assert_eq!(events.len(), 1);
        assert!(query::store(&world).check_invariants().is_ok());
    }
}
