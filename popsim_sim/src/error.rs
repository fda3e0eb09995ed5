//! Error types for the simulation harness.

use popsim_core::{ConfigurationError, ProtocolError, RoundError};
use thiserror::Error;

/// Errors that can occur while running or exporting simulations.
#[derive(Debug, Error)]
pub enum SimError {
    /// Population could not be built
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// A round failed
    #[error("Round error: {0}")]
    Round(#[from] RoundError),

    /// Protocol lookup failed
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// `--states` argument could not be parsed
    #[error("Invalid state argument: {0}")]
    InvalidStates(String),

    /// Export file could not be written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Export could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SimError {
    /// Creates an invalid-states error.
    pub fn invalid_states(msg: impl Into<String>) -> Self {
        Self::InvalidStates(msg.into())
    }
}
