//! Agents - the state cells of a population.

use serde::{Deserialize, Serialize};

/// A state value drawn from the alphabet `0..state_count`.
pub type State = usize;

/// A single member of the population.
///
/// Agents carry no identity of their own; an agent is identified by its
/// position in the owning network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Agent {
    /// Follows the protocol: every update overwrites the state.
    Honest { state: State },

    /// Crash-faulty / adversarial agent whose opinion never changes.
    Faulty { state: State },
}

impl Agent {
    /// Creates an honest agent.
    pub fn honest(state: State) -> Self {
        Agent::Honest { state }
    }

    /// Creates a faulty agent frozen at `state`.
    pub fn faulty(state: State) -> Self {
        Agent::Faulty { state }
    }

    /// Returns the current state.
    pub fn state(&self) -> State {
        match self {
            Agent::Honest { state } | Agent::Faulty { state } => *state,
        }
    }

    /// Assigns a new state. Faulty agents ignore the assignment.
    pub fn update_state(&mut self, new_state: State) {
        if let Agent::Honest { state } = self {
            *state = new_state;
        }
    }

    /// Returns true for the faulty variant.
    pub fn is_faulty(&self) -> bool {
        matches!(self, Agent::Faulty { .. })
    }
}
