//! Append-only round-by-round record of a population.

use crate::agent::State;
use crate::error::HistoryError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maps each round number to the state vector observed at the end of that
/// round. Round 0 is the initial configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryLog {
    rounds: BTreeMap<u64, Vec<State>>,
}

impl HistoryLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a log whose round 0 entry is `initial`.
    pub fn starting_with(initial: Vec<State>) -> Self {
        let mut rounds = BTreeMap::new();
        rounds.insert(0, initial);
        Self { rounds }
    }

    /// Records the state vector for `round`.
    ///
    /// Each round may be recorded once; a second record for the same round
    /// is rejected and leaves the existing entry untouched.
    pub fn record(&mut self, round: u64, states: Vec<State>) -> Result<(), HistoryError> {
        if self.rounds.contains_key(&round) {
            return Err(HistoryError::DuplicateRoundLog(round));
        }
        self.rounds.insert(round, states);
        Ok(())
    }

    /// Returns the state vector logged for `round`.
    pub fn get(&self, round: u64) -> Option<&[State]> {
        self.rounds.get(&round).map(Vec::as_slice)
    }

    /// Returns the most recently logged round and its states.
    pub fn latest(&self) -> Option<(u64, &[State])> {
        self.rounds
            .iter()
            .next_back()
            .map(|(round, states)| (*round, states.as_slice()))
    }

    /// Number of logged rounds (including round 0).
    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    /// Iterates over `(round, states)` in round order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &[State])> + '_ {
        self.rounds
            .iter()
            .map(|(round, states)| (*round, states.as_slice()))
    }

    /// Histogram of `round`: entry `s` is the number of agents in state `s`.
    ///
    /// States at or beyond `state_count` are not counted.
    pub fn state_counts(&self, round: u64, state_count: usize) -> Option<Vec<usize>> {
        self.get(round).map(|states| count_states(states, state_count))
    }

    /// Number of agents in `state` for every logged round, in round order.
    pub fn count_series(&self, state: State) -> Vec<(u64, usize)> {
        self.iter()
            .map(|(round, states)| (round, states.iter().filter(|s| **s == state).count()))
            .collect()
    }
}

/// Counts how many entries of `states` hold each value in `0..state_count`.
pub fn count_states(states: &[State], state_count: usize) -> Vec<usize> {
    let mut counts = vec![0; state_count];
    for &state in states {
        if let Some(slot) = counts.get_mut(state) {
            *slot += 1;
        }
    }
    counts
}
