//! JSON exporter for external plotting and analysis tools.
//!
//! Exports a finished run's round-by-round history together with the state
//! histogram of every round.

use crate::error::SimError;

use popsim_core::{PopulationNetwork, State};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;

/// A single round of simulation data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundFrame {
    /// Round number (0 = initial configuration)
    pub round: u64,

    /// State of every agent, in population order
    pub states: Vec<State>,

    /// Number of agents in each state
    pub counts: Vec<usize>,
}

/// Complete simulation export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimExport {
    /// Protocol name
    pub protocol: String,

    /// Seed used
    pub seed: u64,

    pub node_count: usize,
    pub state_count: usize,

    /// Whether the population reached unanimity
    pub converged: bool,

    /// Consensus state if converged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consensus: Option<State>,

    /// Rounds executed
    pub rounds: u64,

    /// All rounds
    pub history: Vec<RoundFrame>,
}

impl SimExport {
    /// Captures the current history of `network`.
    pub fn from_network<R: RngCore>(network: &PopulationNetwork<R>, seed: u64) -> Self {
        let state_count = network.state_count();
        let history = network
            .history()
            .iter()
            .map(|(round, states)| RoundFrame {
                round,
                states: states.to_vec(),
                counts: popsim_core::count_states(states, state_count),
            })
            .collect();

        Self {
            protocol: network.protocol().name(),
            seed,
            node_count: network.node_count(),
            state_count,
            converged: network.has_converged(),
            consensus: network.consensus(),
            rounds: network.round(),
            history,
        }
    }

    /// Serializes to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> Result<(), SimError> {
        let json = self.to_json()?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
