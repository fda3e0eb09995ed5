//! PopulationNetwork - a fully connected population driven in synchronous rounds.
//!
//! # Round Semantics
//!
//! Every round is simultaneous: all agents sample from one frozen snapshot of
//! the previous round. Updating agents in place while others are still
//! sampling would let later agents observe earlier agents' new states within
//! the same round, which is not a population-protocol round at all.
//!
//! ```text
//! round r snapshot ──┬── agent 0 samples (without itself) ──► next[0]
//!                    ├── agent 1 samples (without itself) ──► next[1]
//!                    └── ...                               ──► next[n-1]
//!                                  commit next[..] ──► history[r + 1]
//! ```

use crate::agent::{Agent, State};
use crate::error::{ConfigurationError, ProtocolError, RoundError};
use crate::history::{count_states, HistoryLog};
use crate::protocol::{Neighbours, Protocol};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Construction parameters for a [`PopulationNetwork`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Number of agents
    pub node_count: usize,

    /// Size of the state alphabet
    pub state_count: usize,

    /// Agents per state; `None` draws every agent's state uniformly at random
    #[serde(default)]
    pub state_config: Option<Vec<usize>>,

    /// Maximum number of rounds to execute (`None` = unbounded)
    #[serde(default)]
    pub max_rounds: Option<u64>,

    /// The last `faulty_count` agents never change state
    #[serde(default)]
    pub faulty_count: usize,
}

impl NetworkConfig {
    /// Creates a configuration with random initial states.
    pub fn new(node_count: usize, state_count: usize) -> Self {
        Self {
            node_count,
            state_count,
            state_config: None,
            max_rounds: None,
            faulty_count: 0,
        }
    }

    /// Creates a configuration from explicit per-state counts.
    ///
    /// The node and state counts are taken from `counts` itself.
    pub fn from_counts(counts: Vec<usize>) -> Self {
        Self::new(counts.iter().sum(), counts.len()).with_state_config(counts)
    }

    /// Sets explicit per-state counts.
    pub fn with_state_config(mut self, counts: Vec<usize>) -> Self {
        self.state_config = Some(counts);
        self
    }

    /// Caps the number of executed rounds.
    pub fn with_max_rounds(mut self, max_rounds: u64) -> Self {
        self.max_rounds = Some(max_rounds);
        self
    }

    /// Marks the last `count` agents as faulty.
    pub fn with_faulty(mut self, count: usize) -> Self {
        self.faulty_count = count;
        self
    }

    /// Checks the configuration without building anything.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let nodes = self.node_count;
        let states = self.state_count;

        if nodes == 0 {
            return Err(ConfigurationError::NoNodes);
        }
        if states == 0 {
            return Err(ConfigurationError::NoStates);
        }
        if states > nodes {
            return Err(ConfigurationError::TooManyStates { states, nodes });
        }
        if let Some(counts) = &self.state_config {
            let configured: usize = counts.iter().sum();
            if configured != nodes {
                return Err(ConfigurationError::NodeCountMismatch { configured, nodes });
            }
            if counts.len() != states {
                return Err(ConfigurationError::StateCountMismatch {
                    configured: counts.len(),
                    states,
                });
            }
        }
        if self.faulty_count > nodes {
            return Err(ConfigurationError::TooManyFaulty {
                faulty: self.faulty_count,
                nodes,
            });
        }
        Ok(())
    }

    /// Produces the initial state of every agent, in population order.
    fn initial_states<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<State> {
        match &self.state_config {
            Some(counts) => counts
                .iter()
                .enumerate()
                .flat_map(|(state, &count)| std::iter::repeat(state).take(count))
                .collect(),
            None => (0..self.node_count)
                .map(|_| rng.gen_range(0..self.state_count))
                .collect(),
        }
    }
}

/// A fully connected population of agents running one protocol.
///
/// The network owns its random source, so a seeded RNG makes the whole
/// trajectory reproducible. It is not internally synchronized; share it
/// across threads only behind the caller's own lock.
#[derive(Debug, Clone)]
pub struct PopulationNetwork<R: RngCore> {
    agents: Vec<Agent>,
    state_count: usize,
    protocol: Protocol,
    max_rounds: Option<u64>,
    round: u64,
    history: HistoryLog,
    rng: R,
}

impl<R: RngCore> PopulationNetwork<R> {
    /// Builds a population from `config`.
    ///
    /// Random initial states (when no explicit configuration is given) are
    /// drawn from `rng`, which the network then keeps for its rounds.
    pub fn new(config: NetworkConfig, protocol: Protocol, mut rng: R) -> Result<Self, ConfigurationError> {
        config.validate()?;

        let honest = config.node_count - config.faulty_count;
        let agents = config
            .initial_states(&mut rng)
            .into_iter()
            .enumerate()
            .map(|(index, state)| {
                if index < honest {
                    Agent::honest(state)
                } else {
                    Agent::faulty(state)
                }
            })
            .collect();

        Self::from_agents(config.state_count, agents, protocol, config.max_rounds, rng)
    }

    /// Builds a population from an explicit list of agents.
    pub fn from_agents(
        state_count: usize,
        agents: Vec<Agent>,
        protocol: Protocol,
        max_rounds: Option<u64>,
        rng: R,
    ) -> Result<Self, ConfigurationError> {
        let nodes = agents.len();
        if nodes == 0 {
            return Err(ConfigurationError::NoNodes);
        }
        if state_count == 0 {
            return Err(ConfigurationError::NoStates);
        }
        if state_count > nodes {
            return Err(ConfigurationError::TooManyStates {
                states: state_count,
                nodes,
            });
        }
        if let Some((index, agent)) = agents
            .iter()
            .enumerate()
            .find(|(_, agent)| agent.state() >= state_count)
        {
            return Err(ConfigurationError::StateOutOfRange {
                index,
                state: agent.state(),
                states: state_count,
            });
        }

        let history = HistoryLog::starting_with(agents.iter().map(Agent::state).collect());

        debug!(
            "Created population: nodes={} states={} faulty={} protocol={}",
            nodes,
            state_count,
            agents.iter().filter(|a| a.is_faulty()).count(),
            protocol
        );

        Ok(Self {
            agents,
            state_count,
            protocol,
            max_rounds,
            round: 0,
            history,
            rng,
        })
    }

    /// Executes one synchronous round.
    ///
    /// Does nothing once the population has converged or the round cap is
    /// reached. Fails with [`ProtocolError::InsufficientNeighbours`] before
    /// touching any agent if the population is too small for the protocol.
    pub fn run_round(&mut self) -> Result<(), RoundError> {
        if self.has_finished() {
            trace!("Round {} skipped: population finished", self.round + 1);
            return Ok(());
        }

        let available = self.agents.len() - 1;
        let required = self.protocol.sample_size();
        if required > available {
            return Err(ProtocolError::insufficient(required, available).into());
        }

        let snapshot = self.states();
        let mut next = Vec::with_capacity(snapshot.len());
        for (index, &state) in snapshot.iter().enumerate() {
            let neighbours = Neighbours::excluding(&snapshot, index);
            next.push(self.protocol.run(state, neighbours, &mut self.rng)?);
        }

        // Log first so a rejected entry leaves the agents on the snapshot
        let mut committed = self.agents.clone();
        for (agent, state) in committed.iter_mut().zip(next) {
            agent.update_state(state);
        }
        let round = self.round + 1;
        self.history
            .record(round, committed.iter().map(Agent::state).collect())?;
        self.agents = committed;
        self.round = round;

        debug!(
            "Round {} complete: counts={:?}",
            round,
            self.state_counts()
        );
        if self.has_converged() {
            debug!("Converged at round {} on state {:?}", round, self.consensus());
        }
        Ok(())
    }

    /// Runs rounds until the population finishes; returns the number of
    /// rounds executed by this call.
    ///
    /// Without a round cap this only returns once the protocol converges.
    pub fn run_until_finished(&mut self) -> Result<u64, RoundError> {
        let start = self.round;
        while !self.has_finished() {
            self.run_round()?;
        }
        Ok(self.round - start)
    }

    /// True iff every agent currently holds the same state.
    pub fn has_converged(&self) -> bool {
        self.protocol.is_converged(&self.states())
    }

    /// True once converged or once the round cap has been reached.
    pub fn has_finished(&self) -> bool {
        self.cap_reached() || self.has_converged()
    }

    fn cap_reached(&self) -> bool {
        self.max_rounds.is_some_and(|max| self.round >= max)
    }

    /// The consensus state, if the population has converged.
    pub fn consensus(&self) -> Option<State> {
        if self.has_converged() {
            self.agents.first().map(Agent::state)
        } else {
            None
        }
    }

    /// Current state of every agent, in population order.
    pub fn states(&self) -> Vec<State> {
        self.agents.iter().map(Agent::state).collect()
    }

    /// Histogram of the current states.
    pub fn state_counts(&self) -> Vec<usize> {
        count_states(&self.states(), self.state_count)
    }

    pub fn node_count(&self) -> usize {
        self.agents.len()
    }

    pub fn state_count(&self) -> usize {
        self.state_count
    }

    /// Number of rounds executed so far.
    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn max_rounds(&self) -> Option<u64> {
        self.max_rounds
    }

    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    /// Consumes the network, returning its history.
    pub fn into_history(self) -> HistoryLog {
        self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HistoryError;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng(seed: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(seed)
    }

    #[test]
    fn test_explicit_configuration_fills_blocks() {
        let config = NetworkConfig::new(6, 3).with_state_config(vec![1, 3, 2]);
        let network = PopulationNetwork::new(config, Protocol::Voter, rng(1)).unwrap();

        assert_eq!(network.states(), vec![0, 1, 1, 1, 2, 2]);
        assert_eq!(network.node_count(), 6);
        assert_eq!(network.round(), 0);
        assert_eq!(network.history().get(0), Some(&[0, 1, 1, 1, 2, 2][..]));
    }

    #[test]
    fn test_random_configuration_within_alphabet() {
        let network =
            PopulationNetwork::new(NetworkConfig::new(50, 4), Protocol::Voter, rng(3)).unwrap();
        let states = network.states();
        assert_eq!(states.len(), 50);
        assert!(states.iter().all(|s| *s < 4));
        assert_eq!(network.history().get(0), Some(states.as_slice()));
    }

    #[test]
    fn test_configuration_errors() {
        let build = |config: NetworkConfig| {
            PopulationNetwork::new(config, Protocol::Voter, rng(0)).map(|_| ())
        };

        assert_eq!(
            build(NetworkConfig::new(3, 4)),
            Err(ConfigurationError::TooManyStates { states: 4, nodes: 3 })
        );
        assert_eq!(
            build(NetworkConfig::new(5, 2).with_state_config(vec![3, 3])),
            Err(ConfigurationError::NodeCountMismatch { configured: 6, nodes: 5 })
        );
        assert_eq!(
            build(NetworkConfig::new(5, 2).with_state_config(vec![2, 2, 1])),
            Err(ConfigurationError::StateCountMismatch { configured: 3, states: 2 })
        );
        assert_eq!(build(NetworkConfig::new(0, 0)), Err(ConfigurationError::NoNodes));
        assert_eq!(build(NetworkConfig::new(4, 0)), Err(ConfigurationError::NoStates));
        assert_eq!(
            build(NetworkConfig::new(4, 2).with_faulty(5)),
            Err(ConfigurationError::TooManyFaulty { faulty: 5, nodes: 4 })
        );
    }

    #[test]
    fn test_from_agents_rejects_out_of_range_state() {
        let agents = vec![Agent::honest(0), Agent::honest(2)];
        let result = PopulationNetwork::from_agents(2, agents, Protocol::Voter, None, rng(0));
        assert_eq!(
            result.map(|_| ()),
            Err(ConfigurationError::StateOutOfRange { index: 1, state: 2, states: 2 })
        );
    }

    #[test]
    fn test_unanimous_start_is_converged() {
        let config = NetworkConfig::new(4, 2).with_state_config(vec![4, 0]);
        let network = PopulationNetwork::new(config, Protocol::three_majority(), rng(0)).unwrap();

        assert!(network.has_converged());
        assert!(network.has_finished());
        assert_eq!(network.consensus(), Some(0));
        assert_eq!(network.round(), 0);
    }

    #[test]
    fn test_single_agent_trivially_converged() {
        let mut network =
            PopulationNetwork::new(NetworkConfig::new(1, 1), Protocol::three_majority(), rng(0))
                .unwrap();
        assert!(network.has_converged());
        // No neighbours, but a converged population never samples
        network.run_round().unwrap();
        assert_eq!(network.round(), 0);
    }

    #[test]
    fn test_run_round_after_convergence_is_noop() {
        let config = NetworkConfig::from_counts(vec![0, 5]);
        let mut network = PopulationNetwork::new(config, Protocol::Voter, rng(9)).unwrap();
        let before = network.history().clone();

        for _ in 0..3 {
            network.run_round().unwrap();
        }

        assert_eq!(network.round(), 0);
        assert_eq!(network.states(), vec![1; 5]);
        assert_eq!(network.history(), &before);
    }

    #[test]
    fn test_insufficient_neighbours_leaves_population_untouched() {
        let config = NetworkConfig::new(3, 2).with_state_config(vec![2, 1]);
        let mut network = PopulationNetwork::new(config, Protocol::three_majority(), rng(0)).unwrap();

        let err = network.run_round().unwrap_err();
        assert_eq!(err, RoundError::Protocol(ProtocolError::insufficient(3, 2)));
        assert_eq!(network.states(), vec![0, 0, 1]);
        assert_eq!(network.round(), 0);
        assert_eq!(network.history().len(), 1);
    }

    #[test]
    fn test_duplicate_round_leaves_population_untouched() {
        let config = NetworkConfig::from_counts(vec![1, 1]).with_max_rounds(4);
        let mut network = PopulationNetwork::new(config, Protocol::Voter, rng(0)).unwrap();
        network.history.record(1, vec![0, 0]).unwrap();
        let agents = network.agents().to_vec();

        let err = network.run_round().unwrap_err();
        assert_eq!(err, RoundError::History(HistoryError::DuplicateRoundLog(1)));
        assert_eq!(network.agents(), agents.as_slice());
        assert_eq!(network.states(), vec![0, 1]);
        assert_eq!(network.round(), 0);
        assert_eq!(network.history().get(1), Some(&[0, 0][..]));
    }

    #[test]
    fn test_two_choice_preserves_population() {
        let config = NetworkConfig::new(5, 2).with_state_config(vec![3, 2]);
        let mut network = PopulationNetwork::new(config, Protocol::TwoChoice, rng(11)).unwrap();

        network.run_round().unwrap();

        let states = network.states();
        assert_eq!(states.len(), 5);
        assert!(states.iter().all(|s| *s == 0 || *s == 1));
        assert_eq!(network.state_counts().iter().sum::<usize>(), 5);
        assert_eq!(network.round(), 1);
        assert_eq!(network.history().len(), 2);
    }

    #[test]
    fn test_round_cap_is_inclusive() {
        let config = NetworkConfig::from_counts(vec![1, 1]).with_max_rounds(0);
        let mut network = PopulationNetwork::new(config, Protocol::Voter, rng(0)).unwrap();
        assert!(network.has_finished());
        network.run_round().unwrap();
        assert_eq!(network.round(), 0);

        // Two voters copy each other forever, so only the cap stops them
        let config = NetworkConfig::from_counts(vec![1, 1]).with_max_rounds(3);
        let mut network = PopulationNetwork::new(config, Protocol::Voter, rng(0)).unwrap();
        for _ in 0..10 {
            network.run_round().unwrap();
        }

        assert_eq!(network.round(), 3);
        assert!(network.has_finished());
        assert!(!network.has_converged());
        let rounds: Vec<u64> = network.history().iter().map(|(r, _)| r).collect();
        assert_eq!(rounds, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_faulty_agents_keep_state() {
        let config = NetworkConfig::new(6, 3)
            .with_state_config(vec![2, 2, 2])
            .with_faulty(2)
            .with_max_rounds(20);
        let mut network = PopulationNetwork::new(config, Protocol::Voter, rng(5)).unwrap();
        assert_eq!(network.agents().iter().filter(|a| a.is_faulty()).count(), 2);

        for _ in 0..20 {
            network.run_round().unwrap();
            let states = network.states();
            assert_eq!(&states[4..], &[2, 2]);
        }
    }

    #[test]
    fn test_run_until_finished() {
        let config = NetworkConfig::new(30, 2).with_max_rounds(500);
        let mut network = PopulationNetwork::new(config, Protocol::three_majority(), rng(42)).unwrap();
        let executed = network.run_until_finished().unwrap();

        assert!(network.has_finished());
        assert_eq!(executed, network.round());
        assert_eq!(network.history().len() as u64, network.round() + 1);
    }

    #[test]
    fn test_same_seed_same_history() {
        let run = || {
            let mut network = PopulationNetwork::new(
                NetworkConfig::new(10, 2).with_max_rounds(100),
                Protocol::three_majority(),
                rng(42),
            )
            .unwrap();
            network.run_until_finished().unwrap();
            network.into_history()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_updates_are_simultaneous() {
        // Voter with a single neighbour is deterministic: each agent copies
        // the other. Synchronous rounds swap the two states; updating in
        // place would make agent 1 copy agent 0's fresh value and converge.
        let config = NetworkConfig::new(2, 2)
            .with_state_config(vec![1, 1])
            .with_max_rounds(4);
        let mut network = PopulationNetwork::new(config, Protocol::Voter, rng(0)).unwrap();

        network.run_round().unwrap();
        assert_eq!(network.states(), vec![1, 0]);
        assert!(!network.has_converged());

        network.run_round().unwrap();
        assert_eq!(network.states(), vec![0, 1]);
    }
}
