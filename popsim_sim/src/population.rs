//! Population arguments as accepted on the command line.

use crate::error::SimError;

use popsim_core::NetworkConfig;
use std::str::FromStr;

/// The `--states` argument: either a number of states, assigned at random,
/// or a comma-separated list of agents per state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatesArg {
    /// `K` states, every agent's initial state drawn uniformly
    Count(usize),

    /// Agents per state; must add up to the node count
    Counts(Vec<usize>),
}

impl StatesArg {
    /// Builds the population configuration for `nodes` agents.
    pub fn to_config(&self, nodes: usize) -> NetworkConfig {
        match self {
            StatesArg::Count(states) => NetworkConfig::new(nodes, *states),
            StatesArg::Counts(counts) => {
                NetworkConfig::new(nodes, counts.len()).with_state_config(counts.clone())
            }
        }
    }
}

impl FromStr for StatesArg {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            part.trim()
                .parse::<usize>()
                .map_err(|e| SimError::invalid_states(format!("'{}': {}", part.trim(), e)))
        };

        if s.contains(',') {
            let counts = s.split(',').map(parse).collect::<Result<Vec<_>, _>>()?;
            Ok(StatesArg::Counts(counts))
        } else {
            Ok(StatesArg::Count(parse(s)?))
        }
    }
}
