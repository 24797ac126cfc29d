#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Starvation and natural death phases.

use prey_lattice_core::{
    AgentKind, AgentView, CensusView, Command, RemovalCause, StarvationRule,
};
use rand::Rng;

/// Pure system that removes starving agents and predators that die of old age.
#[derive(Clone, Copy, Debug)]
pub struct Mortality {
    death_rate: f64,
    starvation: Option<StarvationRule>,
}

impl Mortality {
    /// Creates the mortality system.
    #[must_use]
    pub const fn new(death_rate: f64, starvation: Option<StarvationRule>) -> Self {
        Self {
            death_rate,
            starvation,
        }
    }

    /// Feeds prey that occupy a cell alone and removes agents that went hungry too long.
    ///
    /// Emits nothing when no starvation rule is configured.
    pub fn starvation(&self, agents: &AgentView, census: CensusView<'_>, out: &mut Vec<Command>) {
        let Some(rule) = self.starvation else {
            return;
        };
        for agent in agents.iter() {
            let sheltered = agent.kind == AgentKind::Prey && census.at(agent.cell).total() == 1;
            if sheltered {
                out.push(Command::FeedAgent { agent: agent.id });
            } else if agent.age_since_fed > rule.threshold {
                out.push(Command::RemoveAgent {
                    agent: agent.id,
                    cause: RemovalCause::Starvation,
                });
            }
        }
    }

    /// Removes each predator independently with the configured death probability.
    pub fn deaths<R: Rng>(&self, agents: &AgentView, rng: &mut R, out: &mut Vec<Command>) {
        for agent in agents.iter() {
            if agent.kind == AgentKind::Predator && rng.gen_bool(self.death_rate) {
                out.push(Command::RemoveAgent {
                    agent: agent.id,
                    cause: RemovalCause::Mortality,
                });
            }
        }
    }
}
