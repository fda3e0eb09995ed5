//! Error types for the population protocol engine.

use thiserror::Error;

/// Errors raised while constructing a [`PopulationNetwork`](crate::PopulationNetwork).
///
/// Construction either succeeds completely or returns one of these; a network
/// is never left half-built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// The population must contain at least one agent
    #[error("Number of nodes must be positive")]
    NoNodes,

    /// The state alphabet must contain at least one state
    #[error("Number of states must be positive")]
    NoStates,

    /// More states than agents were requested
    #[error("Number of states ({states}) must be less than or equal to number of nodes ({nodes})")]
    TooManyStates { states: usize, nodes: usize },

    /// Explicit configuration does not account for every agent
    #[error("The number of nodes in the state configuration ({configured}) does not match the number of nodes provided ({nodes})")]
    NodeCountMismatch { configured: usize, nodes: usize },

    /// Explicit configuration has the wrong number of states
    #[error("The number of states in the state configuration ({configured}) does not match the number of states provided ({states})")]
    StateCountMismatch { configured: usize, states: usize },

    /// More faulty agents than agents
    #[error("Number of faulty agents ({faulty}) exceeds number of nodes ({nodes})")]
    TooManyFaulty { faulty: usize, nodes: usize },

    /// An agent was given a state outside `0..state_count`
    #[error("Agent {index} has state {state}, outside of 0..{states}")]
    StateOutOfRange {
        index: usize,
        state: usize,
        states: usize,
    },
}

/// Errors raised by a [`Protocol`](crate::Protocol).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The protocol needs more distinct neighbours than the population offers
    #[error("Insufficient neighbours: protocol samples {required}, only {available} available")]
    InsufficientNeighbours { required: usize, available: usize },

    /// k-majority was asked for an even or too small sample
    #[error("Invalid k-majority sample size {0}: must be odd and at least 3")]
    InvalidSampleSize(usize),

    /// No protocol is registered under this name
    #[error("Unknown protocol: {0}")]
    UnknownProtocol(String),
}

impl ProtocolError {
    /// Creates an insufficient-neighbours error.
    pub fn insufficient(required: usize, available: usize) -> Self {
        Self::InsufficientNeighbours {
            required,
            available,
        }
    }
}

/// Errors raised by the [`HistoryLog`](crate::HistoryLog).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// A round was logged twice. Indicates a round-counter bug.
    #[error("Data for round {0} already exists in history log")]
    DuplicateRoundLog(u64),
}

/// Errors surfaced by [`PopulationNetwork::run_round`](crate::PopulationNetwork::run_round).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoundError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    History(#[from] HistoryError),
}
