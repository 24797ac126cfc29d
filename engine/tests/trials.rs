use std::{
    collections::{hash_map::DefaultHasher, HashSet},
    hash::{Hash, Hasher},
    sync::Arc,
};

use prey_lattice_core::{
    AgentKind, BirthCause, BoundaryPolicy, CellCoord, Command, ConfigError, MovementRule,
    OutcomeKind, PopulationCounts, PredationRule, SimulationParameters, StarvationRule,
    TrialLimits, ZoneId,
};
use prey_lattice_engine::{
    initialize, SimulationEngine, StopFlag, TerrainRecipe, TerrainSource, TrialError, TrialPlan,
    TrialRunner,
};
use prey_lattice_world::{self as world, query, NoiseLayout, NoiseOffset, TerrainGrid, World};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn empty_parameters() -> SimulationParameters {
    SimulationParameters {
        initial_prey_fraction: 0.0,
        initial_predator_fraction: 0.0,
        ..SimulationParameters::default()
    }
}

fn torus(edge: u32) -> Arc<TerrainGrid> {
    Arc::new(TerrainGrid::uniform(edge, edge, BoundaryPolicy::Toroidal).expect("terrain"))
}

fn place(world: &mut World, kind: AgentKind, cell: CellCoord) {
    let mut events = Vec::new();
    world::apply(
        world,
        Command::SpawnAgent {
            kind,
            cell,
            cause: BirthCause::Seeding,
        },
        &mut events,
    )
    .expect("spawn");
}

#[test]
fn lone_predator_dies_and_distant_prey_survive() {
    let parameters = SimulationParameters {
        growth_rate: 0.0,
        death_rate: 1.0,
        migration_rate: 0.0,
        ..empty_parameters()
    };
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut world = initialize(torus(10), &parameters, &mut rng).expect("empty world");
    place(&mut world, AgentKind::Predator, CellCoord::new(0, 0));
    for (column, row) in [(5, 5), (5, 7), (7, 5), (7, 7), (3, 3)] {
        place(&mut world, AgentKind::Prey, CellCoord::new(column, row));
    }

    let mut runner = TrialRunner::new(world, &parameters, TrialLimits::default()).expect("runner");
    let outcome = runner.run(&mut rng, &StopFlag::new()).expect("trial");

    assert_eq!(outcome.kind(), OutcomeKind::Extinct);
    assert_eq!(outcome.steps(), 1);
    assert_eq!(query::population(runner.world()), outcome.population());
    assert_eq!(query::tick_index(runner.world()), 1);
    assert_eq!(
        outcome.population(),
        PopulationCounts {
            prey: 5,
            predators: 0
        }
    );
}

#[test]
fn terrain_without_habitat_cannot_be_seeded() {
    let terrain =
        TerrainGrid::from_zones(3, 3, vec![ZoneId::UNINHABITABLE; 9], BoundaryPolicy::Toroidal)
            .expect("terrain");
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let result = initialize(Arc::new(terrain), &SimulationParameters::default(), &mut rng);
    assert!(matches!(
        result,
        Err(TrialError::Config(ConfigError::NoHabitableCells))
    ));
}

#[test]
fn overfull_initial_population_is_rejected() {
    let parameters = SimulationParameters {
        initial_prey_fraction: 0.6,
        initial_predator_fraction: 0.5,
        ..SimulationParameters::default()
    };
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let result = initialize(torus(10), &parameters, &mut rng);
    assert!(matches!(
        result,
        Err(TrialError::Config(ConfigError::InsufficientHabitat {
            requested: 110,
            available: 100
        }))
    ));
}

#[test]
fn initial_population_occupies_distinct_cells() {
    let parameters = SimulationParameters {
        initial_prey_fraction: 0.25,
        initial_predator_fraction: 0.1,
        ..SimulationParameters::default()
    };
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let world = initialize(torus(10), &parameters, &mut rng).expect("world");

    assert_eq!(
        query::population(&world),
        PopulationCounts {
            prey: 25,
            predators: 10
        }
    );
    let cells: HashSet<_> = query::agent_view(&world)
        .iter()
        .map(|agent| agent.cell)
        .collect();
    assert_eq!(cells.len(), 35);
}

#[test]
fn every_step_conserves_population() {
    let parameters = SimulationParameters {
        migration_rate: 0.3,
        growth_rate: 0.3,
        death_rate: 0.2,
        initial_prey_fraction: 0.2,
        initial_predator_fraction: 0.1,
        predation: PredationRule::Contagion {
            predator_birth_rate: 0.6,
        },
        starvation: Some(StarvationRule { threshold: 4 }),
        ..SimulationParameters::default()
    };
    let terrain = Arc::new(
        TerrainGrid::from_zones(
            12,
            12,
            (0..144)
                .map(|index| ZoneId::new(if index % 7 == 3 { 0 } else { 1 + index % 3 }))
                .collect(),
            BoundaryPolicy::Clipped,
        )
        .expect("terrain"),
    );
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let mut world = initialize(terrain, &parameters, &mut rng).expect("world");
    let mut engine = SimulationEngine::new(&parameters, query::terrain(&world)).expect("engine");

    for _ in 0..40 {
        let before = query::population(&world).total();
        let report = engine.step(&mut world, &mut rng).expect("step");
        let after = report.population.total();

        assert_eq!(
            after + report.starved + report.died + report.preyed_upon,
            before + report.births
        );
        assert_eq!(report.population, query::population(&world));
        query::store(&world)
            .check_invariants()
            .expect("store stays consistent");
        let prey_cells: HashSet<_> = query::agent_view(&world)
            .iter()
            .filter(|agent| agent.kind == AgentKind::Prey)
            .map(|agent| agent.cell)
            .collect();
        assert_eq!(prey_cells.len(), report.population.prey);
    }
}

fn plan(parameters: SimulationParameters, limits: TrialLimits) -> TrialPlan {
    TrialPlan {
        terrain: TerrainSource::from_recipe(
            TerrainRecipe::Uniform {
                columns: 16,
                rows: 16,
            },
            BoundaryPolicy::Toroidal,
        )
        .expect("terrain"),
        parameters,
        limits,
    }
}

fn trajectory_fingerprint(plan: &TrialPlan, seed: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    let outcome = plan
        .run_observed(seed, &StopFlag::new(), |step, population| {
            step.hash(&mut hasher);
            population.hash(&mut hasher);
        })
        .expect("trial");
    outcome.hash(&mut hasher);
    hasher.finish()
}

#[test]
fn identical_seeds_replay_identical_trajectories() {
    let limits = TrialLimits {
        horizon: 60,
        ..TrialLimits::default()
    };
    let trial = plan(SimulationParameters::default(), limits);
    assert_eq!(
        trajectory_fingerprint(&trial, 31),
        trajectory_fingerprint(&trial, 31)
    );

    let seeded = TrialPlan {
        terrain: TerrainSource::from_recipe(
            TerrainRecipe::Noise(NoiseLayout {
                columns: 20,
                rows: 20,
                period: 6.0,
                octaves: 2,
                water_level: -0.2,
                offset: NoiseOffset::Seeded(1),
            }),
            BoundaryPolicy::Toroidal,
        )
        .expect("terrain"),
        parameters: SimulationParameters {
            movement: MovementRule::HabitatPreference {
                preferred_value: 0.5,
            },
            ..SimulationParameters::default()
        },
        limits,
    };
    assert!(matches!(seeded.terrain, TerrainSource::PerTrial { .. }));
    assert_eq!(
        trajectory_fingerprint(&seeded, 8),
        trajectory_fingerprint(&seeded, 8)
    );
}

#[test]
fn stop_flag_cancels_before_the_first_step() {
    let stop = StopFlag::new();
    stop.request_stop();
    let outcome = plan(SimulationParameters::default(), TrialLimits::default())
        .run(5, &stop)
        .expect("trial");
    assert_eq!(outcome.kind(), OutcomeKind::Cancelled);
    assert_eq!(outcome.steps(), 0);
}

#[test]
fn crowded_trials_abort_after_the_grace_period() {
    let parameters = SimulationParameters {
        growth_rate: 1.0,
        death_rate: 0.0,
        ..SimulationParameters::default()
    };
    let limits = TrialLimits {
        horizon: 100,
        population_ceiling: Some(40),
        ceiling_grace_steps: 3,
    };
    let outcome = plan(parameters, limits).run(12, &StopFlag::new()).expect("trial");

    assert_eq!(outcome.kind(), OutcomeKind::Aborted);
    assert_eq!(outcome.steps(), 4);
    assert!(outcome.population().total() > 40);
}

#[test]
fn horizon_ends_surviving_trials() {
    let parameters = SimulationParameters {
        death_rate: 0.0,
        ..SimulationParameters::default()
    };
    let limits = TrialLimits {
        horizon: 15,
        ..TrialLimits::default()
    };
    let mut steps_seen = Vec::new();
    let outcome = plan(parameters, limits)
        .run_observed(3, &StopFlag::new(), |step, _| steps_seen.push(step))
        .expect("trial");

    assert_eq!(outcome.kind(), OutcomeKind::ReachedHorizon);
    assert_eq!(outcome.steps(), 15);
    assert_eq!(steps_seen, (1..=15).collect::<Vec<_>>());
}

#[test]
fn habitat_preference_requires_a_habitat_layer() {
    let parameters = SimulationParameters {
        movement: MovementRule::HabitatPreference {
            preferred_value: 0.3,
        },
        ..SimulationParameters::default()
    };
    let error = plan(parameters, TrialLimits::default())
        .run(0, &StopFlag::new())
        .expect_err("missing layer");
    assert_eq!(error, TrialError::Config(ConfigError::MissingHabitatLayer));
}
