//! Population Protocol Simulation Engine
//!
//! A population is a complete graph of anonymous finite-state agents. In each
//! synchronous round every agent samples a few others from the previous
//! round's snapshot and picks its next state with a [`Protocol`] rule, until
//! the whole population agrees on one state.
//!
//! # Components
//!
//! - [`Agent`]: a state cell, honest or faulty (frozen)
//! - [`Protocol`]: voter, two-choice and k-majority update rules
//! - [`HistoryLog`]: the state vector of every executed round
//! - [`PopulationNetwork`]: owns the agents and the RNG, runs rounds
//!
//! # Usage
//!
//! ```
//! use popsim_core::{NetworkConfig, PopulationNetwork, Protocol};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let config = NetworkConfig::new(100, 2).with_max_rounds(1_000);
//! let mut network = PopulationNetwork::new(
//!     config,
//!     Protocol::three_majority(),
//!     ChaCha8Rng::seed_from_u64(42),
//! )?;
//!
//! network.run_until_finished()?;
//! assert!(network.has_finished());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod agent;
pub mod error;
pub mod history;
pub mod network;
pub mod protocol;

pub use agent::{Agent, State};
pub use error::{ConfigurationError, HistoryError, ProtocolError, RoundError};
pub use history::{count_states, HistoryLog};
pub use network::{NetworkConfig, PopulationNetwork};
pub use protocol::{is_unanimous, majority, KMajority, Neighbours, Protocol};
