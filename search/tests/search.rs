use prey_lattice_core::{
    BoundaryPolicy, ConfigError, ControlParameter, MovementRule, SimulationParameters,
    TrialLimits,
};
use prey_lattice_engine::{TerrainRecipe, TerrainSource, TrialError, TrialPlan};
use prey_lattice_search::{SearchConfig, SearchError, ThresholdSearch};

fn plan(parameters: SimulationParameters) -> TrialPlan {
    TrialPlan {
        terrain: TerrainSource::from_recipe(
            TerrainRecipe::Uniform {
                columns: 8,
                rows: 8,
            },
            BoundaryPolicy::Toroidal,
        )
        .expect("terrain"),
        parameters,
        limits: TrialLimits {
            horizon: 20,
            ..TrialLimits::default()
        },
    }
}

fn seeded_parameters() -> SimulationParameters {
    SimulationParameters {
        initial_prey_fraction: 0.1,
        initial_predator_fraction: 0.1,
        ..SimulationParameters::default()
    }
}

fn config(worker_threads: usize) -> SearchConfig {
    SearchConfig {
        trials_per_batch: 4,
        decimals: 2,
        worker_threads: Some(worker_threads),
        base_seed: 77,
        ..SearchConfig::default()
    }
}

#[test]
fn death_rate_bisection_converges_within_the_iteration_bound() {
    let search = ThresholdSearch::new(plan(seeded_parameters()), config(2)).expect("search");
    let estimate = search.search(0.0, 1.0).expect("estimate");

    assert!((0.0..=1.0).contains(&estimate.threshold));
    assert_eq!(estimate.threshold, estimate.lower);
    assert!(estimate.iterations <= 7, "{} iterations", estimate.iterations);
    assert!(search.config().is_converged(estimate.lower, estimate.upper));
    assert_eq!(estimate.batches.len(), 2 + estimate.iterations as usize);
    assert!(estimate.batches.iter().all(|batch| batch.trials == 4));

    let encoded = serde_json::to_string(&estimate).expect("serialize");
    assert!(encoded.contains("\"parameter\":\"death_rate\""));
}

#[test]
fn estimates_do_not_depend_on_worker_count() {
    let single = ThresholdSearch::new(plan(seeded_parameters()), config(1))
        .expect("search")
        .search(0.0, 1.0)
        .expect("estimate");
    let several = ThresholdSearch::new(plan(seeded_parameters()), config(3))
        .expect("search")
        .search(0.0, 1.0)
        .expect("estimate");
    assert_eq!(single, several);
}

#[test]
fn swapped_bounds_are_reported_instead_of_searched() {
    let search = ThresholdSearch::new(plan(seeded_parameters()), config(2)).expect("search");
    let error = search.search(1.0, 0.0).expect_err("bounds on the wrong sides");
    assert!(matches!(
        error,
        SearchError::Setup(ConfigError::BoundsDoNotBracket {
            lower_extinct: 4,
            upper_extinct: 0
        })
    ));
}

#[test]
fn iteration_cap_reports_non_convergence() {
    let capped = SearchConfig {
        max_iterations: 1,
        ..config(2)
    };
    let search = ThresholdSearch::new(plan(seeded_parameters()), capped).expect("search");
    assert!(matches!(
        search.search(0.0, 1.0),
        Err(SearchError::NotConverged { iterations: 1 })
    ));
}

#[test]
fn aborted_batches_keep_an_abort_aware_search_bisecting() {
    // Six predators push the population past the ceiling on the first step
    // unless every one of them dies in it.
    let crowded = TrialPlan {
        limits: TrialLimits {
            horizon: 20,
            population_ceiling: Some(5),
            ceiling_grace_steps: 0,
        },
        ..plan(seeded_parameters())
    };
    let plain = SearchConfig {
        max_iterations: 10,
        ..config(2)
    };

    let estimate = ThresholdSearch::new(crowded.clone(), plain)
        .expect("search")
        .search(0.0, 1.0)
        .expect("estimate");
    assert_eq!(estimate.batches[0].aborted, 4);
    assert_eq!(estimate.batches[1].extinct, 4);
    assert!(estimate.iterations <= 7, "{} iterations", estimate.iterations);
    assert!(plain.is_converged(estimate.lower, estimate.upper));

    let aware = SearchConfig {
        abort_aware: true,
        ..plain
    };
    match ThresholdSearch::new(crowded, aware)
        .expect("search")
        .search(0.0, 1.0)
    {
        Err(SearchError::NotConverged { iterations }) => assert_eq!(iterations, 10),
        Ok(settled) => {
            assert!(settled.iterations >= estimate.iterations);
            assert_eq!(
                settled.batches[..estimate.batches.len()],
                estimate.batches[..]
            );
            assert_eq!(settled.batches.last().map(|batch| batch.aborted), Some(0));
        }
        Err(other) => panic!("unexpected search error {other:?}"),
    }
}

#[test]
fn raised_stop_flag_cancels_the_search() {
    let search = ThresholdSearch::new(plan(seeded_parameters()), config(2)).expect("search");
    search.stop_flag().request_stop();
    assert!(matches!(
        search.search(0.0, 1.0),
        Err(SearchError::Cancelled)
    ));
}

#[test]
fn cancelled_search_stays_cancelled() {
    let search = ThresholdSearch::new(plan(seeded_parameters()), config(2)).expect("search");
    search.stop_flag().request_stop();
    assert!(matches!(
        search.search(0.0, 1.0),
        Err(SearchError::Cancelled)
    ));
    assert!(matches!(search.run_batch(0.0), Err(SearchError::Cancelled)));
    assert!(matches!(
        search.sweep(ControlParameter::MigrationRate, &[0.0], 0.0, 1.0),
        Err(SearchError::Cancelled)
    ));
}

#[test]
fn failing_trials_surface_with_their_batch_value() {
    let parameters = SimulationParameters {
        movement: MovementRule::HabitatPreference {
            preferred_value: 0.2,
        },
        ..seeded_parameters()
    };
    let search = ThresholdSearch::new(plan(parameters), config(2)).expect("search");
    match search.run_batch(0.5) {
        Err(SearchError::TrialFailed { value, source, .. }) => {
            assert_eq!(value, 0.5);
            assert_eq!(source, TrialError::Config(ConfigError::MissingHabitatLayer));
        }
        other => panic!("expected a trial failure, got {other:?}"),
    }
}

#[test]
fn invalid_configurations_fail_before_any_trial() {
    let empty = SearchConfig {
        trials_per_batch: 0,
        ..config(2)
    };
    assert!(matches!(
        ThresholdSearch::new(plan(seeded_parameters()), empty),
        Err(SearchError::Setup(ConfigError::InvalidSearchConfig(_)))
    ));

    let search = ThresholdSearch::new(plan(seeded_parameters()), config(2)).expect("search");
    assert!(matches!(
        search.search(0.0, 1.5),
        Err(SearchError::Setup(ConfigError::ProbabilityOutOfRange { .. }))
    ));
}

#[test]
fn sweep_searches_once_per_value() {
    let coarse = SearchConfig {
        decimals: 1,
        ..config(2)
    };
    let search = ThresholdSearch::new(plan(seeded_parameters()), coarse).expect("search");
    let points = search
        .sweep(ControlParameter::MigrationRate, &[0.0, 1.0], 0.0, 1.0)
        .expect("sweep");

    assert_eq!(points.len(), 2);
    assert_eq!(points[0].value, 0.0);
    assert_eq!(points[1].value, 1.0);
    assert!(points
        .iter()
        .all(|point| point.swept == ControlParameter::MigrationRate));

    assert!(matches!(
        search.sweep(ControlParameter::DeathRate, &[0.5], 0.0, 1.0),
        Err(SearchError::Setup(ConfigError::InvalidSearchConfig(_)))
    ));
}
