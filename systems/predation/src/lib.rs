#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Predation phase: predators consume the prey they share a cell with.

use std::collections::BTreeMap;

use prey_lattice_core::{
    AgentId, AgentKind, AgentView, BirthCause, CellCoord, CensusView, Command, PredationRule,
    RemovalCause,
};
use rand::Rng;

#[derive(Debug, Default)]
struct Encounter {
    prey: Vec<AgentId>,
    predators: Vec<AgentId>,
}

/// Pure system that resolves shared cells into removal, birth and feeding commands.
#[derive(Debug)]
pub struct Predation {
    rule: PredationRule,
    encounters: BTreeMap<CellCoord, Encounter>,
}

impl Predation {
    /// Creates the predation system for the provided rule.
    #[must_use]
    pub fn new(rule: PredationRule) -> Self {
        Self {
            rule,
            encounters: BTreeMap::new(),
        }
    }

    /// Emits commands for every cell holding both prey and predators, in ascending cell order.
    ///
    /// In each such cell `min(prey, predators)` prey are taken and the same
    /// number of predators are fed.
    pub fn handle<R: Rng>(
        &mut self,
        agents: &AgentView,
        census: CensusView<'_>,
        rng: &mut R,
        out: &mut Vec<Command>,
    ) {
        self.encounters.clear();
        for agent in agents.iter() {
            let counts = census.at(agent.cell);
            if counts.prey == 0 || counts.predators == 0 {
                continue;
            }
            let encounter = self.encounters.entry(agent.cell).or_default();
            match agent.kind {
                AgentKind::Prey => encounter.prey.push(agent.id),
                AgentKind::Predator => encounter.predators.push(agent.id),
            }
        }

        for (cell, encounter) in &self.encounters {
            let taken = encounter.prey.len().min(encounter.predators.len());
            for prey in encounter.prey.iter().take(taken) {
                out.push(Command::RemoveAgent {
                    agent: *prey,
                    cause: RemovalCause::Predation,
                });
                let birth = match self.rule {
                    PredationRule::ConsumeAndSpawn => Some(BirthCause::Predation),
                    PredationRule::Contagion {
                        predator_birth_rate,
                    } => rng
                        .gen_bool(predator_birth_rate)
                        .then_some(BirthCause::Conversion),
                };
                if let Some(cause) = birth {
                    out.push(Command::SpawnAgent {
                        kind: AgentKind::Predator,
                        cell: *cell,
                        cause,
                    });
                }
            }
            for predator in encounter.predators.iter().take(taken) {
                out.push(Command::FeedAgent { agent: *predator });
            }
        }
    }
}
