use log::debug;
use prey_lattice_core::{
    BirthCause, Command, ConfigError, Event, InvariantViolation, MovementRule, PopulationCounts,
    RemovalCause, SimulationParameters,
};
use prey_lattice_system_movement::Movement;
use prey_lattice_system_mortality::Mortality;
use prey_lattice_system_predation::Predation;
use prey_lattice_system_reproduction::Reproduction;
use prey_lattice_world::{self as world, query, TerrainGrid, World};
use rand::Rng;

/// Counts describing what happened during a single step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Tick index reached by the step.
    pub tick: u64,
    /// Agents created by reproduction, predation or conversion.
    pub births: usize,
    /// Agents removed by the starvation rule.
    pub starved: usize,
    /// Predators removed by natural death.
    pub died: usize,
    /// Prey removed by predators.
    pub preyed_upon: usize,
    /// Accepted movement requests.
    pub moves: usize,
    /// Movement requests refused by the world.
    pub rejected_moves: usize,
    /// Population totals after the step.
    pub population: PopulationCounts,
}

impl StepReport {
    fn record(&mut self, event: &Event) {
        match event {
            Event::TimeAdvanced { tick } => self.tick = *tick,
            Event::AgentSpawned { cause, .. } => {
                if !matches!(cause, BirthCause::Seeding) {
                    self.births += 1;
                }
            }
            Event::AgentRemoved { cause, .. } => match cause {
                RemovalCause::Starvation => self.starved += 1,
                RemovalCause::Predation => self.preyed_upon += 1,
                RemovalCause::Mortality => self.died += 1,
            },
            Event::AgentMoved { .. } => self.moves += 1,
            Event::MoveRejected { .. } => self.rejected_moves += 1,
            Event::SpawnRejected { .. } | Event::AgentFed { .. } => {}
        }
    }
}

/// Applies the per-step phases to a world in their fixed order.
#[derive(Debug)]
pub struct SimulationEngine {
    movement: Movement,
    predation: Predation,
    reproduction: Reproduction,
    mortality: Mortality,
    commands: Vec<Command>,
    events: Vec<Event>,
}

impl SimulationEngine {
    /// Creates an engine for the provided parameters after validating them against the terrain.
    pub fn new(
        parameters: &SimulationParameters,
        terrain: &TerrainGrid,
    ) -> Result<Self, ConfigError> {
        parameters.validate()?;
        if matches!(parameters.movement, MovementRule::HabitatPreference { .. })
            && !terrain.has_habitat_layer()
        {
            return Err(ConfigError::MissingHabitatLayer);
        }

        Ok(Self {
            movement: Movement::new(parameters),
            predation: Predation::new(parameters.predation),
            reproduction: Reproduction::new(parameters.growth_rate),
            mortality: Mortality::new(parameters.death_rate, parameters.starvation),
            commands: Vec::new(),
            events: Vec::new(),
        })
    }

    /// Advances the world by one step: tick, starvation, movement, predation,
    /// reproduction and death. Each phase reads a snapshot taken at its start
    /// and its commands are fully applied before the next phase begins.
    pub fn step<R: Rng>(
        &mut self,
        world: &mut World,
        rng: &mut R,
    ) -> Result<StepReport, InvariantViolation> {
        let mut report = StepReport::default();
        self.commands.clear();
        self.events.clear();

        self.commands.push(Command::Tick);
        self.flush(world, &mut report)?;

        self.mortality.starvation(
            &query::agent_view(world),
            query::census_view(world),
            &mut self.commands,
        );
        self.flush(world, &mut report)?;

        self.movement.handle(
            &query::agent_view(world),
            query::census_view(world),
            query::terrain(world),
            rng,
            &mut self.commands,
        );
        self.flush(world, &mut report)?;

        self.predation.handle(
            &query::agent_view(world),
            query::census_view(world),
            rng,
            &mut self.commands,
        );
        self.flush(world, &mut report)?;

        self.reproduction.handle(
            query::terrain(world),
            query::census_view(world),
            rng,
            &mut self.commands,
        );
        self.flush(world, &mut report)?;

        self.mortality
            .deaths(&query::agent_view(world), rng, &mut self.commands);
        self.flush(world, &mut report)?;

        report.population = query::population(world);
        debug!(
            "tick {}: births {}, starved {}, died {}, preyed upon {}, moves {} ({} rejected), prey {}, predators {}",
            report.tick,
            report.births,
            report.starved,
            report.died,
            report.preyed_upon,
            report.moves,
            report.rejected_moves,
            report.population.prey,
            report.population.predators,
        );
        Ok(report)
    }

    fn flush(
        &mut self,
        world: &mut World,
        report: &mut StepReport,
    ) -> Result<(), InvariantViolation> {
        for command in self.commands.drain(..) {
            world::apply(world, command, &mut self.events)?;
        }
        for event in self.events.drain(..) {
            report.record(&event);
        }
        Ok(())
    }
}
