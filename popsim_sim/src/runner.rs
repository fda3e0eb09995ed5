//! Scenario runner - executes population scenarios over many seeded trials.

use crate::context::SimContext;
use crate::error::SimError;
use crate::scenarios::ScenarioId;

use popsim_core::{NetworkConfig, PopulationNetwork, Protocol, ProtocolError, RoundError, State};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Share of trials that must converge (or pick the expected winner) for a
/// scenario to pass.
const REQUIRED_RATE: f64 = 0.9;

/// Scenario populations are never smaller than this.
const MIN_NODES: usize = 10;

/// Result of a single trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialOutcome {
    /// Trial index within the batch
    pub trial: u64,

    /// Seed the trial's RNG was derived from
    pub seed: u64,

    /// Rounds executed
    pub rounds: u64,

    /// Consensus state if the population converged
    pub consensus: Option<State>,

    /// Round failure, if any
    pub error: Option<RoundError>,
}

/// Statistics aggregated over a batch of trials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrialStats {
    /// Trials executed
    pub trials: usize,

    /// Trials that reached unanimity
    pub converged: usize,

    /// Trials that stopped on a round error
    pub errors: usize,

    /// Errors that were `InsufficientNeighbours`
    pub insufficient_neighbours: usize,

    /// Sum of rounds-to-convergence over converged trials
    pub total_convergence_rounds: u64,

    /// Slowest convergence observed
    pub max_convergence_rounds: Option<u64>,

    /// How often each state won
    pub winners: BTreeMap<State, usize>,
}

impl TrialStats {
    /// Folds one trial into the statistics.
    pub fn record(&mut self, outcome: &TrialOutcome) {
        self.trials += 1;

        if let Some(error) = &outcome.error {
            self.errors += 1;
            if matches!(
                error,
                RoundError::Protocol(ProtocolError::InsufficientNeighbours { .. })
            ) {
                self.insufficient_neighbours += 1;
            }
        }

        if let Some(state) = outcome.consensus {
            self.converged += 1;
            self.total_convergence_rounds += outcome.rounds;
            self.max_convergence_rounds = Some(
                self.max_convergence_rounds
                    .map_or(outcome.rounds, |max| max.max(outcome.rounds)),
            );
            *self.winners.entry(state).or_insert(0) += 1;
        }
    }

    /// Fraction of trials that converged.
    pub fn convergence_rate(&self) -> f64 {
        ratio(self.converged, self.trials)
    }

    /// Fraction of trials won by `state`.
    pub fn win_rate(&self, state: State) -> f64 {
        ratio(self.winners.get(&state).copied().unwrap_or(0), self.trials)
    }

    /// Mean rounds to convergence over the converged trials.
    pub fn mean_convergence_rounds(&self) -> Option<f64> {
        (self.converged > 0).then(|| self.total_convergence_rounds as f64 / self.converged as f64)
    }
}

fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Master seed used
    pub seed: u64,

    /// Protocol name
    pub protocol: String,

    /// Population size used
    pub node_count: usize,

    /// Whether the scenario's expectation held
    pub passed: bool,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Statistics over all trials
    pub stats: TrialStats,
}

/// Runs population scenarios.
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    /// Seed management
    context: SimContext,

    /// Requested population size
    num_nodes: usize,

    /// Protocol under test
    protocol: Protocol,

    /// Round budget per trial
    max_rounds: u64,

    /// Trials per scenario
    trials: u64,
}

impl ScenarioRunner {
    /// Creates a new scenario runner using three-majority.
    pub fn new(seed: u64, num_nodes: usize) -> Self {
        Self {
            context: SimContext::new(seed),
            num_nodes,
            protocol: Protocol::three_majority(),
            max_rounds: 1_000,
            trials: 20,
        }
    }

    /// Sets the protocol under test.
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Sets the round budget of each trial.
    pub fn with_max_rounds(mut self, max_rounds: u64) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Sets the number of trials per scenario.
    pub fn with_trials(mut self, trials: u64) -> Self {
        self.trials = trials.max(1);
        self
    }

    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    /// Runs one trial of `config` to completion.
    ///
    /// A failing round ends the trial and is reported in the outcome; only
    /// an invalid configuration is an error.
    pub fn run_trial(&self, config: &NetworkConfig, trial: u64) -> Result<TrialOutcome, SimError> {
        let seed = self.context.trial_seed(trial);
        let mut network =
            PopulationNetwork::new(config.clone(), self.protocol, self.context.trial_rng(trial))?;

        let error = network.run_until_finished().err();
        let outcome = TrialOutcome {
            trial,
            seed,
            rounds: network.round(),
            consensus: network.consensus(),
            error,
        };

        debug!(
            "  trial {} (seed={}) rounds={} consensus={:?} error={:?}",
            trial, seed, outcome.rounds, outcome.consensus, outcome.error
        );
        Ok(outcome)
    }

    /// Runs every trial of `config` and aggregates the outcomes.
    pub fn run_trials(&self, config: &NetworkConfig) -> Result<TrialStats, SimError> {
        let mut stats = TrialStats::default();
        for trial in 0..self.trials {
            stats.record(&self.run_trial(config, trial)?);
        }
        Ok(stats)
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!(
            "Starting scenario: {} (seed={}, protocol={})",
            scenario.name(),
            self.context.seed(),
            self.protocol
        );

        if scenario.is_adversarial() {
            warn!("Adversarial scenario - faulty agents ignore every update");
        }

        if let Some(reason) = self.inapplicable(scenario) {
            warn!("{} does not apply to {}: {}", scenario.name(), self.protocol, reason);
            return self.result(scenario, 0, TrialStats::default(), None);
        }

        let config = self.scenario_config(scenario);

        let stats = match self.run_trials(&config) {
            Ok(stats) => stats,
            Err(e) => {
                let reason = Some(e.to_string());
                return self.result(scenario, config.node_count, TrialStats::default(), reason);
            }
        };

        let failure = self.evaluate(scenario, &stats);
        self.result(scenario, config.node_count, stats, failure)
    }

    /// Why `scenario` has no meaningful expectation under the current
    /// protocol, if it has none.
    fn inapplicable(&self, scenario: ScenarioId) -> Option<&'static str> {
        match (scenario, self.protocol) {
            (ScenarioId::Undersized, protocol) if protocol.sample_size() < 2 => {
                Some("it never lacks neighbours")
            }
            // Copying a frozen dissenter is absorbing, so capture is expected
            (ScenarioId::FaultyMinority, Protocol::Voter) => {
                Some("the lone dissenter is its only absorbing state")
            }
            _ => None,
        }
    }

    /// Population configuration for `scenario`.
    fn scenario_config(&self, scenario: ScenarioId) -> NetworkConfig {
        if self.num_nodes < MIN_NODES {
            warn!(
                "Raising population from {} to {} agents for {}",
                self.num_nodes,
                MIN_NODES,
                scenario.name()
            );
        }
        let n = self.num_nodes.max(MIN_NODES);

        let config = match scenario {
            ScenarioId::Unanimous => NetworkConfig::from_counts(vec![n, 0]),
            ScenarioId::Balanced => NetworkConfig::from_counts(vec![n / 2, n - n / 2]),
            ScenarioId::Skewed => {
                let majority = n * 3 / 5;
                NetworkConfig::from_counts(vec![majority, n - majority])
            }
            ScenarioId::MultiState => NetworkConfig::new(n, 4),
            ScenarioId::FaultyMajority => {
                let faulty = n * 3 / 5;
                let honest = n - faulty;
                NetworkConfig::from_counts(vec![honest / 2, honest - honest / 2, faulty])
                    .with_faulty(faulty)
            }
            ScenarioId::FaultyMinority => NetworkConfig::from_counts(vec![n - 1, 1]).with_faulty(1),
            ScenarioId::Undersized => {
                // One agent short of a full sample, split so it cannot be converged
                let k = self.protocol.sample_size().max(2);
                NetworkConfig::from_counts(vec![k - 1, 1])
            }
        };

        config.with_max_rounds(self.max_rounds)
    }

    /// Returns the failure reason, or `None` if the expectation held.
    fn evaluate(&self, scenario: ScenarioId, stats: &TrialStats) -> Option<String> {
        if scenario != ScenarioId::Undersized && stats.errors > 0 {
            return Some(format!("{}/{} trials failed a round", stats.errors, stats.trials));
        }

        match scenario {
            ScenarioId::Unanimous => {
                let idle = stats.max_convergence_rounds.unwrap_or(0) == 0;
                (stats.converged != stats.trials || !idle)
                    .then(|| "unanimous population executed rounds".to_string())
            }
            ScenarioId::Balanced | ScenarioId::MultiState => {
                (stats.convergence_rate() < REQUIRED_RATE).then(|| {
                    format!(
                        "converged in {:.0}% of trials",
                        stats.convergence_rate() * 100.0
                    )
                })
            }
            ScenarioId::Skewed => (stats.win_rate(0) <= 0.5).then(|| {
                format!(
                    "initial majority won only {:.0}% of trials",
                    stats.win_rate(0) * 100.0
                )
            }),
            ScenarioId::FaultyMajority => (stats.win_rate(2) < REQUIRED_RATE).then(|| {
                format!(
                    "faulty state won only {:.0}% of trials",
                    stats.win_rate(2) * 100.0
                )
            }),
            ScenarioId::FaultyMinority => (stats.converged > 0).then(|| {
                format!(
                    "dissenter captured the honest majority in {}/{} trials",
                    stats.converged, stats.trials
                )
            }),
            ScenarioId::Undersized => (stats.insufficient_neighbours != stats.trials).then(|| {
                format!(
                    "only {}/{} trials rejected the undersized population",
                    stats.insufficient_neighbours, stats.trials
                )
            }),
        }
    }

    fn result(
        &self,
        scenario: ScenarioId,
        node_count: usize,
        stats: TrialStats,
        failure_reason: Option<String>,
    ) -> ScenarioResult {
        ScenarioResult {
            scenario,
            seed: self.context.seed(),
            protocol: self.protocol.name(),
            node_count,
            passed: failure_reason.is_none(),
            failure_reason,
            stats,
        }
    }
}
