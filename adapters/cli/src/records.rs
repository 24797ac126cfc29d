//! JSON result records written by the subcommands.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result};
use prey_lattice_core::{PopulationCounts, TrialOutcome};
use prey_lattice_search::{SweepPoint, ThresholdEstimate};
use serde::Serialize;

use crate::config::ExperimentConfig;

/// Population after one step of a recorded trial.
#[derive(Clone, Copy, Debug, Serialize)]
pub(crate) struct HistoryEntry {
    pub(crate) step: u64,
    pub(crate) population: PopulationCounts,
}

/// Output of the `trial` subcommand.
#[derive(Debug, Serialize)]
pub(crate) struct TrialRecord<'a> {
    pub(crate) config: &'a ExperimentConfig,
    pub(crate) seed: u64,
    pub(crate) outcome: TrialOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) history: Option<Vec<HistoryEntry>>,
}

/// Output of the `search` subcommand.
#[derive(Debug, Serialize)]
pub(crate) struct SearchRecord<'a> {
    pub(crate) config: &'a ExperimentConfig,
    pub(crate) estimate: ThresholdEstimate,
}

/// Output of the `sweep` subcommand.
#[derive(Debug, Serialize)]
pub(crate) struct SweepRecord<'a> {
    pub(crate) config: &'a ExperimentConfig,
    pub(crate) points: Vec<SweepPoint>,
}

/// Writes `record` as pretty JSON to `output`, or to stdout when no path is given.
pub(crate) fn write_json<T: Serialize>(record: &T, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create output: {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, record)
                .with_context(|| format!("failed to write output: {}", path.display()))?;
            writeln!(writer)?;
            writer.flush()?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, record)
                .context("failed to write result to stdout")?;
            writeln!(stdout)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use prey_lattice_core::OutcomeKind;

    use super::*;

    #[test]
    fn trial_record_omits_missing_history() {
        let config = ExperimentConfig::default();
        let outcome = TrialOutcome::new(
            OutcomeKind::Extinct,
            12,
            PopulationCounts {
                prey: 30,
                predators: 0,
            },
        );
        let record = TrialRecord {
            config: &config,
            seed: 3,
            outcome,
            history: None,
        };
        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(value["outcome"]["kind"], "extinct");
        assert_eq!(value["config"]["terrain"]["kind"], "patches");
        assert!(value.get("history").is_none());

        let recorded = TrialRecord {
            history: Some(vec![HistoryEntry {
                step: 1,
                population: PopulationCounts {
                    prey: 31,
                    predators: 2,
                },
            }]),
            ..record
        };
        let value = serde_json::to_value(&recorded).expect("serialize");
        assert_eq!(value["history"][0]["population"]["predators"], 2);
    }
}
