//! Convergence and fault-tolerance scenarios.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// PP-001: every agent starts in the same state
    Unanimous,

    /// PP-002: even two-state split
    Balanced,

    /// PP-003: 60/40 two-state split, majority should win
    Skewed,

    /// PP-004: uniformly random start over four states
    MultiState,

    /// PP-005: frozen adversaries outnumber the honest agents
    FaultyMajority,

    /// PP-006: one frozen dissenter in an otherwise unanimous population
    FaultyMinority,

    /// PP-007: population smaller than the protocol's sample
    Undersized,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Unanimous,
            ScenarioId::Balanced,
            ScenarioId::Skewed,
            ScenarioId::MultiState,
            ScenarioId::FaultyMajority,
            ScenarioId::FaultyMinority,
            ScenarioId::Undersized,
        ]
    }

    /// Returns the scenarios that inject faulty agents.
    pub fn adversarial() -> Vec<ScenarioId> {
        vec![ScenarioId::FaultyMajority, ScenarioId::FaultyMinority]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Unanimous => "unanimous",
            ScenarioId::Balanced => "balanced",
            ScenarioId::Skewed => "skewed",
            ScenarioId::MultiState => "multi_state",
            ScenarioId::FaultyMajority => "faulty_majority",
            ScenarioId::FaultyMinority => "faulty_minority",
            ScenarioId::Undersized => "undersized",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Unanimous => "All agents agree at round 0, nothing should run",
            ScenarioId::Balanced => "50/50 split over two states, verify convergence",
            ScenarioId::Skewed => "60/40 split, verify the initial majority wins most trials",
            ScenarioId::MultiState => "Random start over 4 states, verify convergence",
            ScenarioId::FaultyMajority => "60% frozen adversaries at state 2, verify they take over",
            ScenarioId::FaultyMinority => "One frozen dissenter, verify majority rules are not captured (skipped for voter)",
            ScenarioId::Undersized => "Population too small to sample, verify the round is rejected",
        }
    }

    /// Returns true if this scenario injects faulty agents.
    pub fn is_adversarial(&self) -> bool {
        matches!(self, ScenarioId::FaultyMajority | ScenarioId::FaultyMinority)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unanimous" | "pp-001" => Ok(ScenarioId::Unanimous),
            "balanced" | "pp-002" => Ok(ScenarioId::Balanced),
            "skewed" | "pp-003" => Ok(ScenarioId::Skewed),
            "multi_state" | "multistate" | "pp-004" => Ok(ScenarioId::MultiState),
            "faulty_majority" | "faultymajority" | "pp-005" => Ok(ScenarioId::FaultyMajority),
            "faulty_minority" | "faultyminority" | "pp-006" => Ok(ScenarioId::FaultyMinority),
            "undersized" | "pp-007" => Ok(ScenarioId::Undersized),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
