//! Dual-indexed arena that owns every live agent.

use std::sync::Arc;

use prey_lattice_core::{
    AgentId, AgentKind, AgentSnapshot, AgentView, CellCensus, CellCoord, CensusView,
    InvariantViolation, PopulationCounts,
};

use crate::terrain::TerrainGrid;

/// State of a single live agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Agent {
    kind: AgentKind,
    cell: CellCoord,
    age_since_fed: u32,
}

impl Agent {
    /// Species of the agent.
    #[must_use]
    pub const fn kind(&self) -> AgentKind {
        self.kind
    }

    /// Cell currently occupied by the agent.
    #[must_use]
    pub const fn cell(&self) -> CellCoord {
        self.cell
    }

    /// Steps elapsed since the agent last ate.
    #[must_use]
    pub const fn age_since_fed(&self) -> u32 {
        self.age_since_fed
    }
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    agent: Agent,
    registry_slot: usize,
}

#[derive(Clone, Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

/// Owns every agent and keeps the per-cell buckets, registry and census in lockstep.
///
/// A handle is in the registry iff it sits in exactly one bucket, and that
/// bucket belongs to the agent's cell. Membership only changes through
/// [`AgentStore::create`], [`AgentStore::remove`] and [`AgentStore::move_agent`].
#[derive(Clone, Debug)]
pub struct AgentStore {
    terrain: Arc<TerrainGrid>,
    slots: Vec<Slot>,
    free: Vec<u32>,
    registry: Vec<AgentId>,
    buckets: Vec<Vec<AgentId>>,
    census: Vec<CellCensus>,
    totals: PopulationCounts,
    prey_exclusion: bool,
}

impl AgentStore {
    /// Creates an empty store over the provided terrain with prey exclusion enabled.
    #[must_use]
    pub fn new(terrain: Arc<TerrainGrid>) -> Self {
        let cells = terrain.cell_count();
        Self {
            terrain,
            slots: Vec::new(),
            free: Vec::new(),
            registry: Vec::new(),
            buckets: vec![Vec::new(); cells],
            census: vec![CellCensus::default(); cells],
            totals: PopulationCounts::default(),
            prey_exclusion: true,
        }
    }

    /// Enables or disables the rule that refuses a second prey in a cell.
    #[must_use]
    pub fn with_prey_exclusion(mut self, enabled: bool) -> Self {
        self.prey_exclusion = enabled;
        self
    }

    /// Terrain the store places agents on.
    #[must_use]
    pub fn terrain(&self) -> &Arc<TerrainGrid> {
        &self.terrain
    }

    /// Places a new agent, returning `None` without mutating anything when the
    /// cell is uninhabitable or already holds prey that would be duplicated.
    pub fn create(&mut self, kind: AgentKind, cell: CellCoord) -> Option<AgentId> {
        let cell_index = self.terrain.index(cell)?;
        if !self.terrain.is_habitable(cell) {
            return None;
        }
        if self.prey_exclusion && kind == AgentKind::Prey && self.census[cell_index].prey > 0 {
            return None;
        }

        let id = match self.free.pop() {
            Some(index) => AgentId::new(index, self.slots[index as usize].generation),
            None => {
                let index = u32::try_from(self.slots.len()).ok()?;
                self.slots.push(Slot::default());
                AgentId::new(index, 0)
            }
        };

        self.slots[id.index() as usize].entry = Some(Entry {
            agent: Agent {
                kind,
                cell,
                age_since_fed: 0,
            },
            registry_slot: self.registry.len(),
        });
        self.registry.push(id);
        self.buckets[cell_index].push(id);
        self.count(kind, cell_index, true);
        Some(id)
    }

    /// Removes the agent and returns its final state.
    pub fn remove(&mut self, id: AgentId) -> Result<Agent, InvariantViolation> {
        let entry = self.entry(id)?;
        let cell_index = self
            .terrain
            .index(entry.agent.cell)
            .ok_or(InvariantViolation::CellOutOfBounds(entry.agent.cell))?;

        self.detach_from_bucket(id, cell_index)?;
        let _ = self.registry.swap_remove(entry.registry_slot);
        if let Some(moved) = self.registry.get(entry.registry_slot).copied() {
            if let Some(moved_entry) = self.entry_mut(moved) {
                moved_entry.registry_slot = entry.registry_slot;
            }
        }

        let slot = &mut self.slots[id.index() as usize];
        slot.entry = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index());
        self.count(entry.agent.kind, cell_index, false);
        Ok(entry.agent)
    }

    /// Relocates the agent and returns the cell it left. Habitability is not checked.
    pub fn move_agent(
        &mut self,
        id: AgentId,
        to: CellCoord,
    ) -> Result<CellCoord, InvariantViolation> {
        let entry = self.entry(id)?;
        let to_index = self
            .terrain
            .index(to)
            .ok_or(InvariantViolation::CellOutOfBounds(to))?;
        let from = entry.agent.cell;
        if from == to {
            return Ok(from);
        }
        let from_index = self
            .terrain
            .index(from)
            .ok_or(InvariantViolation::CellOutOfBounds(from))?;

        self.detach_from_bucket(id, from_index)?;
        self.buckets[to_index].push(id);
        self.count(entry.agent.kind, from_index, false);
        self.count(entry.agent.kind, to_index, true);
        if let Some(stored) = self.entry_mut(id) {
            stored.agent.cell = to;
        }
        Ok(from)
    }

    /// Current state of the agent, if the handle is live.
    #[must_use]
    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.slots
            .get(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.entry.as_ref())
            .map(|entry| &entry.agent)
    }

    /// Handles of the agents in the cell.
    #[must_use]
    pub fn agents_at(&self, cell: CellCoord) -> Vec<AgentId> {
        self.terrain
            .index(cell)
            .map(|index| self.buckets[index].clone())
            .unwrap_or_default()
    }

    /// Handles of every live agent.
    #[must_use]
    pub fn all_agents(&self) -> Vec<AgentId> {
        self.registry.clone()
    }

    /// Agent counts recorded for the cell.
    #[must_use]
    pub fn census(&self, cell: CellCoord) -> CellCensus {
        self.terrain
            .index(cell)
            .map(|index| self.census[index])
            .unwrap_or_default()
    }

    /// Read-only view of the dense census.
    #[must_use]
    pub fn census_view(&self) -> CensusView<'_> {
        let (columns, rows) = self.terrain.dimensions();
        CensusView::new(&self.census, columns, rows)
    }

    /// Snapshot of every live agent ordered by handle.
    #[must_use]
    pub fn agent_view(&self) -> AgentView {
        let snapshots = self
            .registry
            .iter()
            .filter_map(|id| {
                self.get(*id).map(|agent| AgentSnapshot {
                    id: *id,
                    kind: agent.kind,
                    cell: agent.cell,
                    age_since_fed: agent.age_since_fed,
                })
            })
            .collect();
        AgentView::from_snapshots(snapshots)
    }

    /// Running totals by kind.
    #[must_use]
    pub const fn population(&self) -> PopulationCounts {
        self.totals
    }

    /// Number of live agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Reports whether no agents are alive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Increments every agent's steps-since-fed counter.
    pub fn age_all(&mut self) {
        for slot in &mut self.slots {
            if let Some(entry) = slot.entry.as_mut() {
                entry.agent.age_since_fed = entry.agent.age_since_fed.saturating_add(1);
            }
        }
    }

    /// Resets the agent's steps-since-fed counter.
    pub fn mark_fed(&mut self, id: AgentId) -> Result<(), InvariantViolation> {
        let entry = self
            .entry_mut(id)
            .ok_or(InvariantViolation::UnknownAgent(id))?;
        entry.agent.age_since_fed = 0;
        Ok(())
    }

    /// Audits buckets, registry, census and totals against each other.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut expected_census = vec![CellCensus::default(); self.census.len()];
        let mut totals = PopulationCounts::default();

        for (registry_slot, id) in self.registry.iter().enumerate() {
            let entry = self.entry(*id)?;
            if entry.registry_slot != registry_slot {
                return Err(InvariantViolation::IndexMismatch(*id));
            }
            let cell_index = self
                .terrain
                .index(entry.agent.cell)
                .ok_or(InvariantViolation::CellOutOfBounds(entry.agent.cell))?;
            let holders = self
                .buckets
                .iter()
                .enumerate()
                .flat_map(|(index, bucket)| {
                    bucket
                        .iter()
                        .filter(move |candidate| *candidate == id)
                        .map(move |_| index)
                })
                .collect::<Vec<_>>();
            if holders != [cell_index] {
                return Err(InvariantViolation::IndexMismatch(*id));
            }
            match entry.agent.kind {
                AgentKind::Prey => {
                    expected_census[cell_index].prey += 1;
                    totals.prey += 1;
                }
                AgentKind::Predator => {
                    expected_census[cell_index].predators += 1;
                    totals.predators += 1;
                }
            }
        }

        let bucketed: usize = self.buckets.iter().map(Vec::len).sum();
        if bucketed != self.registry.len() {
            let stray = self
                .buckets
                .iter()
                .flatten()
                .find(|id| self.get(**id).is_none())
                .copied()
                .unwrap_or(AgentId::new(u32::MAX, u32::MAX));
            return Err(InvariantViolation::UnknownAgent(stray));
        }

        for (cell, (recorded, expected)) in self
            .terrain
            .cells()
            .zip(self.census.iter().zip(expected_census.iter()))
        {
            if recorded != expected {
                return Err(InvariantViolation::CensusMismatch(cell));
            }
        }
        if totals != self.totals {
            return Err(InvariantViolation::TotalsMismatch);
        }
        Ok(())
    }

    fn entry(&self, id: AgentId) -> Result<Entry, InvariantViolation> {
        self.slots
            .get(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.entry)
            .ok_or(InvariantViolation::UnknownAgent(id))
    }

    fn entry_mut(&mut self, id: AgentId) -> Option<&mut Entry> {
        self.slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.entry.as_mut())
    }

    fn detach_from_bucket(
        &mut self,
        id: AgentId,
        cell_index: usize,
    ) -> Result<(), InvariantViolation> {
        let bucket = &mut self.buckets[cell_index];
        let position = bucket
            .iter()
            .position(|candidate| *candidate == id)
            .ok_or(InvariantViolation::IndexMismatch(id))?;
        let _ = bucket.swap_remove(position);
        Ok(())
    }

    fn count(&mut self, kind: AgentKind, cell_index: usize, added: bool) {
        let census = &mut self.census[cell_index];
        let (cell_count, total) = match kind {
            AgentKind::Prey => (&mut census.prey, &mut self.totals.prey),
            AgentKind::Predator => (&mut census.predators, &mut self.totals.predators),
        };
        if added {
            *cell_count += 1;
            *total += 1;
        } else {
            *cell_count -= 1;
            *total -= 1;
        }
    }
}
