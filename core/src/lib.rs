#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the prey lattice engine.
//!
//! This crate defines the message surface that connects the authoritative
//! world, the pure phase systems, and the drivers built on top of them. Phase
//! systems read immutable views such as [`AgentView`] and [`CensusView`] and
//! respond with [`Command`] batches. The world executes those commands via its
//! `apply` entry point and broadcasts [`Event`] values describing every
//! accepted or rejected mutation, which the engine tallies into step reports.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Location of a single lattice cell expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new lattice cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }
}

/// Habitat identifier attached to every lattice cell.
///
/// Zone `0` marks uninhabitable terrain; every positive value names a habitat
/// zone that biases non-migratory movement.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ZoneId(u32);

impl ZoneId {
    /// Zone identifier reserved for uninhabitable cells.
    pub const UNINHABITABLE: ZoneId = ZoneId(0);

    /// Creates a zone identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the zone.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Reports whether agents may occupy cells carrying this zone.
    #[must_use]
    pub const fn is_habitable(&self) -> bool {
        self.0 != 0
    }
}

/// Stable arena handle naming a single live agent.
///
/// The slot index addresses the store's backing array while the generation
/// distinguishes successive occupants of a recycled slot, so stale handles are
/// detected instead of aliasing a newer agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId {
    index: u32,
    generation: u32,
}

impl AgentId {
    /// Creates a handle from its slot index and generation.
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index inside the owning store.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the slot at the time the handle was issued.
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

/// Species of an agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Agents that reproduce on empty cells and are eaten by predators.
    Prey,
    /// Agents that feed on prey and die stochastically.
    Predator,
}

/// Policy describing how neighbourhoods behave at the lattice edge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Coordinates wrap around both axes, turning the lattice into a torus.
    #[default]
    Toroidal,
    /// Positions beyond the lattice edge are dropped from neighbourhoods.
    Clipped,
}

/// Rule applied to cells that contain both prey and predators.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum PredationRule {
    /// Every eaten prey is replaced by a newborn predator in the vacated cell.
    #[default]
    ConsumeAndSpawn,
    /// Eaten prey turn into predators with the given probability and vanish otherwise.
    Contagion {
        /// Probability that an eaten prey is converted into a predator.
        predator_birth_rate: f64,
    },
}

/// Rule used to choose among candidate cells during the movement phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum MovementRule {
    /// Candidates are sampled uniformly.
    #[default]
    Uniform,
    /// Candidates are weighted by closeness of their habitat value to a preferred value.
    HabitatPreference {
        /// Habitat value agents gravitate toward.
        preferred_value: f64,
    },
}

/// Selects which agent kinds may cross zone borders when migrating.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationScope {
    /// Prey and predators migrate with the configured rate.
    #[default]
    AllAgents,
    /// Only predators migrate; prey always stay within their zone when possible.
    PredatorsOnly,
}

impl MigrationScope {
    /// Reports whether agents of the provided kind are allowed to migrate.
    #[must_use]
    pub const fn permits(self, kind: AgentKind) -> bool {
        match self {
            Self::AllAgents => true,
            Self::PredatorsOnly => matches!(kind, AgentKind::Predator),
        }
    }
}

/// Optional starvation rule removing agents that went too long without food.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StarvationRule {
    /// Agents whose steps since their last meal exceed this value are removed.
    pub threshold: u32,
}

/// Read-only rate configuration for a single simulation run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParameters {
    /// Probability that an agent may leave its zone during a movement step.
    pub migration_rate: f64,
    /// Probability that an empty habitable cell spawns a prey each step.
    pub growth_rate: f64,
    /// Probability that a predator dies each step.
    pub death_rate: f64,
    /// Fraction of habitable cells seeded with prey.
    pub initial_prey_fraction: f64,
    /// Fraction of habitable cells seeded with predators.
    pub initial_predator_fraction: f64,
    /// Active predation sub-rule.
    pub predation: PredationRule,
    /// Active movement sampling rule.
    pub movement: MovementRule,
    /// Agent kinds allowed to migrate across zones.
    pub migration_scope: MigrationScope,
    /// Optional starvation rule.
    pub starvation: Option<StarvationRule>,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            migration_rate: 0.0,
            growth_rate: 0.2,
            death_rate: 0.25,
            initial_prey_fraction: 0.05,
            initial_predator_fraction: 0.05,
            predation: PredationRule::default(),
            movement: MovementRule::default(),
            migration_scope: MigrationScope::default(),
            starvation: None,
        }
    }
}

impl SimulationParameters {
    /// Confirms every probability lies within `[0, 1]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_probability("migration_rate", self.migration_rate)?;
        check_probability("growth_rate", self.growth_rate)?;
        check_probability("death_rate", self.death_rate)?;
        check_probability("initial_prey_fraction", self.initial_prey_fraction)?;
        check_probability("initial_predator_fraction", self.initial_predator_fraction)?;
        if let PredationRule::Contagion {
            predator_birth_rate,
        } = self.predation
        {
            check_probability("predator_birth_rate", predator_birth_rate)?;
        }
        if let MovementRule::HabitatPreference { preferred_value } = self.movement {
            if !preferred_value.is_finite() {
                return Err(ConfigError::InvalidPreferredValue(preferred_value));
            }
        }
        Ok(())
    }
}

fn check_probability(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ProbabilityOutOfRange { name, value })
    }
}

/// Rate parameter that a threshold search varies while holding the rest fixed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlParameter {
    /// Predator death probability.
    #[default]
    DeathRate,
    /// Prey birth probability.
    GrowthRate,
    /// Cross-zone movement probability.
    MigrationRate,
}

impl ControlParameter {
    /// Returns a copy of `parameters` with this parameter replaced by `value`.
    #[must_use]
    pub fn apply(self, parameters: &SimulationParameters, value: f64) -> SimulationParameters {
        let mut adjusted = *parameters;
        match self {
            Self::DeathRate => adjusted.death_rate = value,
            Self::GrowthRate => adjusted.growth_rate = value,
            Self::MigrationRate => adjusted.migration_rate = value,
        }
        adjusted
    }

    /// Reads the current value of this parameter.
    #[must_use]
    pub fn value(self, parameters: &SimulationParameters) -> f64 {
        match self {
            Self::DeathRate => parameters.death_rate,
            Self::GrowthRate => parameters.growth_rate,
            Self::MigrationRate => parameters.migration_rate,
        }
    }

    /// Stable snake-case label used in logs and result records.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::DeathRate => "death_rate",
            Self::GrowthRate => "growth_rate",
            Self::MigrationRate => "migration_rate",
        }
    }
}

/// Stopping limits applied to a single trial.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialLimits {
    /// Number of steps after which the trial ends with [`OutcomeKind::ReachedHorizon`].
    pub horizon: u64,
    /// Total population above which the trial is aborted as overcrowded.
    pub population_ceiling: Option<usize>,
    /// Number of initial steps during which the population ceiling is not enforced.
    pub ceiling_grace_steps: u64,
}

impl Default for TrialLimits {
    fn default() -> Self {
        Self {
            horizon: 1_000,
            population_ceiling: None,
            ceiling_grace_steps: 0,
        }
    }
}

/// Population totals split by agent kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PopulationCounts {
    /// Number of live prey.
    pub prey: usize,
    /// Number of live predators.
    pub predators: usize,
}

impl PopulationCounts {
    /// Total number of live agents.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.prey + self.predators
    }
}

/// Terminal state reported by a trial.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// The step horizon was reached with predators still alive.
    ReachedHorizon,
    /// The predator population died out.
    Extinct,
    /// The total population exceeded the configured ceiling.
    Aborted,
    /// The trial observed its stop flag before reaching any other outcome.
    Cancelled,
}

/// Immutable result of a single trial.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrialOutcome {
    kind: OutcomeKind,
    steps: u64,
    population: PopulationCounts,
}

impl TrialOutcome {
    /// Captures the terminal state of a trial.
    #[must_use]
    pub const fn new(kind: OutcomeKind, steps: u64, population: PopulationCounts) -> Self {
        Self {
            kind,
            steps,
            population,
        }
    }

    /// Terminal outcome category.
    #[must_use]
    pub const fn kind(&self) -> OutcomeKind {
        self.kind
    }

    /// Number of steps executed before the trial stopped.
    #[must_use]
    pub const fn steps(&self) -> u64 {
        self.steps
    }

    /// Population totals when the trial stopped.
    #[must_use]
    pub const fn population(&self) -> PopulationCounts {
        self.population
    }

    /// Reports whether the predators died out.
    #[must_use]
    pub const fn is_extinct(&self) -> bool {
        matches!(self.kind, OutcomeKind::Extinct)
    }
}

/// Reason a newborn agent entered the lattice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BirthCause {
    /// Placed while seeding the initial population.
    Seeding,
    /// Prey born on an empty habitable cell.
    Reproduction,
    /// Predator born in the cell of a prey it consumed.
    Predation,
    /// Prey converted into a predator under the contagion rule.
    Conversion,
}

/// Reason an agent left the lattice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalCause {
    /// Exceeded the starvation threshold.
    Starvation,
    /// Eaten by a predator.
    Predation,
    /// Predator died of natural causes.
    Mortality,
}

/// Reasons the world refused to create an agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpawnRejection {
    /// The cell is uninhabitable or outside the lattice.
    Uninhabitable,
    /// Prey may not share a cell with other prey.
    PreyPresent,
}

/// Reasons the world refused to move an agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveRejection {
    /// The destination is uninhabitable or outside the lattice.
    Uninhabitable,
    /// A prey attempted to enter a cell already holding prey.
    PreyPresent,
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Advances the tick counter and ages every agent by one step.
    Tick,
    /// Requests creation of a new agent in the provided cell.
    SpawnAgent {
        /// Kind of agent to create.
        kind: AgentKind,
        /// Cell the agent should occupy.
        cell: CellCoord,
        /// Reason for the birth.
        cause: BirthCause,
    },
    /// Requests that an agent relocate to the provided cell.
    MoveAgent {
        /// Agent attempting to move.
        agent: AgentId,
        /// Destination cell.
        to: CellCoord,
    },
    /// Requests removal of an agent from the lattice.
    RemoveAgent {
        /// Agent to remove.
        agent: AgentId,
        /// Reason for the removal.
        cause: RemovalCause,
    },
    /// Resets the agent's steps-since-fed counter.
    FeedAgent {
        /// Agent that found food or shelter.
        agent: AgentId,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Tick index reached after advancing.
        tick: u64,
    },
    /// Confirms that an agent was created.
    AgentSpawned {
        /// Handle issued to the new agent.
        agent: AgentId,
        /// Kind of the new agent.
        kind: AgentKind,
        /// Cell the agent occupies.
        cell: CellCoord,
        /// Reason for the birth.
        cause: BirthCause,
    },
    /// Reports that a spawn request was refused.
    SpawnRejected {
        /// Kind of agent requested.
        kind: AgentKind,
        /// Cell provided in the request.
        cell: CellCoord,
        /// Specific reason the spawn failed.
        reason: SpawnRejection,
    },
    /// Confirms that an agent moved between two cells.
    AgentMoved {
        /// Agent that moved.
        agent: AgentId,
        /// Cell the agent occupied before moving.
        from: CellCoord,
        /// Cell the agent occupies after moving.
        to: CellCoord,
    },
    /// Reports that a move request was refused.
    MoveRejected {
        /// Agent that attempted to move.
        agent: AgentId,
        /// Requested destination.
        to: CellCoord,
        /// Specific reason the move failed.
        reason: MoveRejection,
    },
    /// Confirms that an agent was removed.
    AgentRemoved {
        /// Handle of the removed agent.
        agent: AgentId,
        /// Kind of the removed agent.
        kind: AgentKind,
        /// Cell the agent occupied when removed.
        cell: CellCoord,
        /// Reason for the removal.
        cause: RemovalCause,
    },
    /// Confirms that an agent's hunger counter was reset.
    AgentFed {
        /// Agent that was fed.
        agent: AgentId,
    },
}

/// Immutable representation of a single agent's state used for queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AgentSnapshot {
    /// Handle of the agent.
    pub id: AgentId,
    /// Kind of the agent.
    pub kind: AgentKind,
    /// Cell currently occupied by the agent.
    pub cell: CellCoord,
    /// Steps elapsed since the agent last ate.
    pub age_since_fed: u32,
}

/// Read-only snapshot describing every live agent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AgentView {
    snapshots: Vec<AgentSnapshot>,
}

impl AgentView {
    /// Creates a new agent view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<AgentSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured agent snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &AgentSnapshot> {
        self.snapshots.iter()
    }

    /// Number of captured agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether the view holds no agents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<AgentSnapshot> {
        self.snapshots
    }
}

/// Per-cell agent counts derived by the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CellCensus {
    /// Number of prey in the cell.
    pub prey: u32,
    /// Number of predators in the cell.
    pub predators: u32,
}

impl CellCensus {
    /// Total number of agents in the cell.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.prey + self.predators
    }
}

/// Read-only view into the dense per-cell census.
#[derive(Clone, Copy, Debug)]
pub struct CensusView<'a> {
    cells: &'a [CellCensus],
    columns: u32,
    rows: u32,
}

impl<'a> CensusView<'a> {
    /// Captures a new census view backed by the provided row-major cell slice.
    #[must_use]
    pub fn new(cells: &'a [CellCensus], columns: u32, rows: u32) -> Self {
        Self {
            cells,
            columns,
            rows,
        }
    }

    /// Returns the counts recorded for the provided cell; cells outside the lattice are empty.
    #[must_use]
    pub fn at(&self, cell: CellCoord) -> CellCensus {
        self.index(cell)
            .and_then(|index| self.cells.get(index).copied())
            .unwrap_or_default()
    }

    /// Reports whether the cell currently holds at least one prey.
    #[must_use]
    pub fn has_prey(&self, cell: CellCoord) -> bool {
        self.at(cell).prey > 0
    }

    /// Provides the dimensions of the underlying grid.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.columns, self.rows)
    }

    fn index(&self, cell: CellCoord) -> Option<usize> {
        if cell.column() < self.columns && cell.row() < self.rows {
            let row = usize::try_from(cell.row()).ok()?;
            let column = usize::try_from(cell.column()).ok()?;
            let width = usize::try_from(self.columns).ok()?;
            Some(row * width + column)
        } else {
            None
        }
    }
}

/// Invalid construction input surfaced to the caller and never retried.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// A probability was outside `[0, 1]` or not a number.
    #[error("{name} must lie within [0, 1], got {value}")]
    ProbabilityOutOfRange {
        /// Name of the offending parameter.
        name: &'static str,
        /// Provided value.
        value: f64,
    },
    /// The preferred habitat value is not finite.
    #[error("preferred habitat value must be finite, got {0}")]
    InvalidPreferredValue(f64),
    /// A grid with zero columns or rows was requested.
    #[error("terrain grid must have at least one column and one row")]
    EmptyGrid,
    /// The zone buffer length does not match the grid dimensions.
    #[error("expected {expected} zone entries, got {actual}")]
    ZoneCountMismatch {
        /// Number of cells implied by the dimensions.
        expected: usize,
        /// Number of zone entries supplied.
        actual: usize,
    },
    /// The patch layout cannot produce a positive-size patch.
    #[error("patch layout with area {habitable_area}, {patch_count} patches and gap {gap} is not satisfiable")]
    InvalidPatchLayout {
        /// Requested total habitable area.
        habitable_area: u32,
        /// Requested number of patches.
        patch_count: u32,
        /// Requested gap between patches.
        gap: u32,
    },
    /// The noise layout parameters are unusable.
    #[error("noise layout is invalid: {0}")]
    InvalidNoiseLayout(&'static str),
    /// A positive initial population was requested on a grid without habitat.
    #[error("terrain has no habitable cells")]
    NoHabitableCells,
    /// The initial population does not fit into the habitable cells.
    #[error("initial population of {requested} agents exceeds {available} habitable cells")]
    InsufficientHabitat {
        /// Number of agents requested.
        requested: usize,
        /// Number of habitable cells available.
        available: usize,
    },
    /// Habitat-preference movement was selected on terrain without habitat values.
    #[error("habitat preference movement requires terrain with a habitat value layer")]
    MissingHabitatLayer,
    /// The threshold search bounds land on the same side of the boundary.
    #[error("search bounds do not bracket the threshold (lower extinct: {lower_extinct}, upper extinct: {upper_extinct})")]
    BoundsDoNotBracket {
        /// Number of extinct trials observed at the lower bound.
        lower_extinct: usize,
        /// Number of extinct trials observed at the upper bound.
        upper_extinct: usize,
    },
    /// The threshold search configuration is unusable.
    #[error("invalid search configuration: {0}")]
    InvalidSearchConfig(&'static str),
}

/// Internal consistency failure that aborts the current trial.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// The handle does not name a live agent.
    #[error("agent {0:?} is not registered")]
    UnknownAgent(AgentId),
    /// The coordinate lies outside the lattice.
    #[error("cell {0:?} lies outside the lattice")]
    CellOutOfBounds(CellCoord),
    /// The bucket and registry indices disagree.
    #[error("agent {0:?} is indexed inconsistently")]
    IndexMismatch(AgentId),
    /// The stored census of a cell disagrees with its bucket.
    #[error("census of cell {0:?} disagrees with its bucket")]
    CensusMismatch(CellCoord),
    /// The running totals disagree with the registry.
    #[error("population totals disagree with the registry")]
    TotalsMismatch,
}

#[cfg(test)]
mod tests {
    use super::{
        AgentId, AgentKind, AgentSnapshot, AgentView, CellCensus, CellCoord, CensusView,
        ConfigError, ControlParameter, MigrationScope, OutcomeKind, PopulationCounts,
        PredationRule, SimulationParameters, StarvationRule, TrialOutcome, ZoneId,
    };
    use serde::{de::DeserializeOwned, Serialize};

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn trial_outcome_round_trips_through_bincode() {
        let outcome = TrialOutcome::new(
            OutcomeKind::Aborted,
            1_200,
            PopulationCounts {
                prey: 900,
                predators: 301,
            },
        );
        assert_round_trip(&outcome);
    }

    #[test]
    fn search_inputs_round_trip_through_bincode() {
        assert_round_trip(&ControlParameter::GrowthRate);
        assert_round_trip(&Some(StarvationRule { threshold: 4 }));
        assert_round_trip(&(CellCoord::new(3, 9), ZoneId::new(2)));
    }

    #[test]
    fn contagion_requires_a_probability() {
        let parameters = SimulationParameters {
            predation: PredationRule::Contagion {
                predator_birth_rate: -0.1,
            },
            ..SimulationParameters::default()
        };
        assert!(matches!(
            parameters.validate(),
            Err(ConfigError::ProbabilityOutOfRange {
                name: "predator_birth_rate",
                ..
            })
        ));
    }

    #[test]
    fn zone_zero_is_uninhabitable() {
        assert!(!ZoneId::UNINHABITABLE.is_habitable());
        assert!(ZoneId::new(3).is_habitable());
    }

    #[test]
    fn validation_rejects_out_of_range_probabilities() {
        let parameters = SimulationParameters {
            death_rate: 1.5,
            ..SimulationParameters::default()
        };
        assert_eq!(
            parameters.validate(),
            Err(ConfigError::ProbabilityOutOfRange {
                name: "death_rate",
                value: 1.5,
            })
        );

        let nan = SimulationParameters {
            growth_rate: f64::NAN,
            ..SimulationParameters::default()
        };
        assert!(nan.validate().is_err());
        assert!(SimulationParameters::default().validate().is_ok());
    }

    #[test]
    fn control_parameter_replaces_only_its_field() {
        let base = SimulationParameters::default();
        let adjusted = ControlParameter::MigrationRate.apply(&base, 0.75);
        assert_eq!(adjusted.migration_rate, 0.75);
        assert_eq!(adjusted.death_rate, base.death_rate);
        assert_eq!(ControlParameter::MigrationRate.value(&adjusted), 0.75);
    }

    #[test]
    fn migration_scope_filters_prey() {
        assert!(MigrationScope::AllAgents.permits(AgentKind::Prey));
        assert!(!MigrationScope::PredatorsOnly.permits(AgentKind::Prey));
        assert!(MigrationScope::PredatorsOnly.permits(AgentKind::Predator));
    }

    #[test]
    fn agent_view_orders_snapshots_by_handle() {
        let view = AgentView::from_snapshots(vec![
            AgentSnapshot {
                id: AgentId::new(4, 0),
                kind: AgentKind::Prey,
                cell: CellCoord::new(0, 0),
                age_since_fed: 0,
            },
            AgentSnapshot {
                id: AgentId::new(1, 2),
                kind: AgentKind::Predator,
                cell: CellCoord::new(1, 0),
                age_since_fed: 3,
            },
        ]);
        let order: Vec<_> = view.iter().map(|snapshot| snapshot.id.index()).collect();
        assert_eq!(order, vec![1, 4]);
    }

    #[test]
    fn census_view_reports_empty_outside_grid() {
        let cells = vec![
            CellCensus {
                prey: 1,
                predators: 0,
            },
            CellCensus {
                prey: 0,
                predators: 2,
            },
        ];
        let view = CensusView::new(&cells, 2, 1);
        assert!(view.has_prey(CellCoord::new(0, 0)));
        assert_eq!(view.at(CellCoord::new(1, 0)).predators, 2);
        assert_eq!(view.at(CellCoord::new(5, 5)), CellCensus::default());
    }
}
