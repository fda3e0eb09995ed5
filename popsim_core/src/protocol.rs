//! Population protocols - per-agent update rules and the consensus predicate.
//!
//! A [`Protocol`] is a plain value: it holds no reference to any population
//! and can be shared by as many networks as needed. All randomness comes from
//! the RNG handed to [`Protocol::run`], so a seeded RNG makes every decision
//! reproducible.
//!
//! # Variants
//!
//! | Protocol        | Name              | Sample | Rule                                  |
//! |-----------------|-------------------|--------|---------------------------------------|
//! | Voter           | `voter`           | 1      | adopt the sampled state               |
//! | Two-choice      | `twochoice`       | 2      | adopt if both samples agree           |
//! | Three-majority  | `threemajority`   | 3      | k-majority with k = 3                 |
//! | k-majority      | `{k}majority`     | k      | adopt a strict sample majority, else a random sampled state |
//!
//! The names are matched by external tooling and must stay stable.

use crate::agent::State;
use crate::error::ProtocolError;
use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt;
use std::str::FromStr;

/// Read-only view of the states an agent may sample from.
///
/// In a round this is the frozen snapshot of the previous round with the
/// sampling agent's own slot removed, so an agent never samples itself.
#[derive(Debug, Clone, Copy)]
pub struct Neighbours<'a> {
    snapshot: &'a [State],
    excluded: Option<usize>,
}

impl<'a> Neighbours<'a> {
    /// Every entry of `states` is a neighbour.
    pub fn all(states: &'a [State]) -> Self {
        Self {
            snapshot: states,
            excluded: None,
        }
    }

    /// Every entry of `snapshot` except the one at `index`.
    pub fn excluding(snapshot: &'a [State], index: usize) -> Self {
        Self {
            snapshot,
            excluded: (index < snapshot.len()).then_some(index),
        }
    }

    /// Number of neighbours in the view.
    pub fn len(&self) -> usize {
        self.snapshot.len() - usize::from(self.excluded.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the `i`-th neighbour's state.
    pub fn get(&self, i: usize) -> Option<State> {
        if i >= self.len() {
            return None;
        }
        self.snapshot.get(self.slot(i)).copied()
    }

    /// Iterates over neighbour states in population order.
    pub fn iter(&self) -> impl Iterator<Item = State> + 'a {
        let (snapshot, excluded) = (self.snapshot, self.excluded);
        snapshot
            .iter()
            .enumerate()
            .filter(move |(i, _)| Some(*i) != excluded)
            .map(|(_, state)| *state)
    }

    /// Draws `amount` distinct neighbours uniformly at random, without
    /// replacement, in sampling order.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        amount: usize,
    ) -> Result<Vec<State>, ProtocolError> {
        let available = self.len();
        if amount > available {
            return Err(ProtocolError::insufficient(amount, available));
        }
        Ok(rand::seq::index::sample(rng, available, amount)
            .into_iter()
            .map(|i| self.snapshot[self.slot(i)])
            .collect())
    }

    // Maps a neighbour index onto the underlying snapshot.
    fn slot(&self, i: usize) -> usize {
        match self.excluded {
            Some(excluded) if i >= excluded => i + 1,
            _ => i,
        }
    }
}

/// The k-majority rule for an odd sample size `k >= 3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KMajority {
    k: usize,
}

impl KMajority {
    /// The canonical three-majority instance.
    pub const THREE: KMajority = KMajority { k: 3 };

    /// Creates a k-majority rule. `k` must be odd and at least 3.
    pub fn new(k: usize) -> Result<Self, ProtocolError> {
        if k < 3 || k % 2 == 0 {
            return Err(ProtocolError::InvalidSampleSize(k));
        }
        Ok(Self { k })
    }

    /// Sample size.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Minimum count for the sampled majority to be adopted, `ceil(k / 2)`.
    pub fn threshold(&self) -> usize {
        self.k / 2 + 1
    }

    /// Picks the new state from a sample of exactly `k` states.
    fn decide<R: Rng + ?Sized>(&self, current: State, sample: &[State], rng: &mut R) -> State {
        match majority(sample) {
            Some((winner, count)) if count >= self.threshold() => winner,
            _ => sample.choose(rng).copied().unwrap_or(current),
        }
    }
}

/// Returns the most frequent state in `sample` and its count.
///
/// Ties go to the state encountered first when scanning `sample` from the
/// front. Returns `None` for an empty sample.
pub fn majority(sample: &[State]) -> Option<(State, usize)> {
    // Counts in first-seen order; samples are small so a linear scan wins.
    let mut counts: Vec<(State, usize)> = Vec::new();
    for &state in sample {
        match counts.iter_mut().find(|(s, _)| *s == state) {
            Some((_, count)) => *count += 1,
            None => counts.push((state, 1)),
        }
    }

    let mut best: Option<(State, usize)> = None;
    for (state, count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((state, count));
        }
    }
    best
}

/// True iff `states` holds exactly one distinct value.
pub fn is_unanimous(states: &[State]) -> bool {
    match states.split_first() {
        Some((first, rest)) => rest.iter().all(|s| s == first),
        None => false,
    }
}

/// A population protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Copy one uniformly sampled neighbour.
    Voter,

    /// Sample two distinct neighbours; adopt their state if they agree.
    TwoChoice,

    /// Sample `k` distinct neighbours; adopt a strict majority if present.
    KMajority(KMajority),
}

impl Protocol {
    /// Three-majority, the `k = 3` instance of k-majority.
    pub fn three_majority() -> Self {
        Protocol::KMajority(KMajority::THREE)
    }

    /// k-majority for an odd `k >= 3`.
    pub fn k_majority(k: usize) -> Result<Self, ProtocolError> {
        KMajority::new(k).map(Protocol::KMajority)
    }

    /// Looks a protocol up by its published name.
    pub fn from_name(name: &str) -> Result<Self, ProtocolError> {
        let lowered = name.trim().to_lowercase();
        match lowered.as_str() {
            "voter" => Ok(Protocol::Voter),
            "twochoice" => Ok(Protocol::TwoChoice),
            "threemajority" => Ok(Protocol::three_majority()),
            other => match other.strip_suffix("majority").map(str::parse::<usize>) {
                Some(Ok(k)) => Protocol::k_majority(k),
                _ => Err(ProtocolError::UnknownProtocol(name.to_string())),
            },
        }
    }

    /// Names of the built-in protocols, for selection menus.
    pub fn builtin_names() -> &'static [&'static str] {
        &["voter", "twochoice", "threemajority"]
    }

    /// Stable protocol name.
    pub fn name(&self) -> String {
        match self {
            Protocol::Voter => "voter".to_string(),
            Protocol::TwoChoice => "twochoice".to_string(),
            Protocol::KMajority(rule) if rule.k() == 3 => "threemajority".to_string(),
            Protocol::KMajority(rule) => format!("{}majority", rule.k()),
        }
    }

    /// Number of distinct neighbours sampled per update.
    pub fn sample_size(&self) -> usize {
        match self {
            Protocol::Voter => 1,
            Protocol::TwoChoice => 2,
            Protocol::KMajority(rule) => rule.k(),
        }
    }

    /// Computes an agent's next state from its current `state` and its
    /// `neighbours`.
    pub fn run<R: Rng + ?Sized>(
        &self,
        state: State,
        neighbours: Neighbours<'_>,
        rng: &mut R,
    ) -> Result<State, ProtocolError> {
        let sample = neighbours.sample(rng, self.sample_size())?;

        let next = match self {
            Protocol::Voter => sample[0],
            Protocol::TwoChoice => {
                if sample[0] == sample[1] {
                    sample[0]
                } else {
                    state
                }
            }
            Protocol::KMajority(rule) => rule.decide(state, &sample, rng),
        };
        Ok(next)
    }

    /// Consensus predicate: every agent holds the same state.
    pub fn is_converged(&self, states: &[State]) -> bool {
        is_unanimous(states)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Protocol {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Protocol::from_name(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    #[test]
    fn test_names_are_stable() {
        assert_eq!(Protocol::Voter.name(), "voter");
        assert_eq!(Protocol::TwoChoice.name(), "twochoice");
        assert_eq!(Protocol::three_majority().name(), "threemajority");
        assert_eq!(Protocol::k_majority(5).unwrap().name(), "5majority");
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Protocol::from_name("voter").unwrap(), Protocol::Voter);
        assert_eq!("TwoChoice".parse::<Protocol>().unwrap(), Protocol::TwoChoice);
        assert_eq!(
            Protocol::from_name("threemajority").unwrap(),
            Protocol::three_majority()
        );
        assert_eq!(
            Protocol::from_name("3majority").unwrap(),
            Protocol::three_majority()
        );
        assert_eq!(
            Protocol::from_name("7majority").unwrap(),
            Protocol::k_majority(7).unwrap()
        );
        assert_eq!(
            Protocol::from_name("4majority"),
            Err(ProtocolError::InvalidSampleSize(4))
        );
        assert!(matches!(
            Protocol::from_name("gossip"),
            Err(ProtocolError::UnknownProtocol(_))
        ));
    }

    #[test]
    fn test_k_must_be_odd_and_at_least_three() {
        assert_eq!(KMajority::new(1), Err(ProtocolError::InvalidSampleSize(1)));
        assert_eq!(KMajority::new(2), Err(ProtocolError::InvalidSampleSize(2)));
        assert_eq!(KMajority::new(6), Err(ProtocolError::InvalidSampleSize(6)));
        assert_eq!(KMajority::new(5).unwrap().threshold(), 3);
        assert_eq!(KMajority::THREE.threshold(), 2);
    }

    #[test]
    fn test_majority_tie_break_first_encountered() {
        assert_eq!(majority(&[1, 0, 0, 1]), Some((1, 2)));
        assert_eq!(majority(&[0, 1, 1, 0]), Some((0, 2)));
        assert_eq!(majority(&[2, 1, 1]), Some((1, 2)));
        assert_eq!(majority(&[3, 4, 5]), Some((3, 1)));
        assert_eq!(majority(&[]), None);
    }

    #[test]
    fn test_is_unanimous() {
        assert!(is_unanimous(&[4]));
        assert!(is_unanimous(&[1, 1, 1]));
        assert!(!is_unanimous(&[1, 0, 1]));
        assert!(!is_unanimous(&[]));
    }

    #[test]
    fn test_neighbours_excluding() {
        let snapshot = [5, 6, 7];
        let view = Neighbours::excluding(&snapshot, 1);
        assert_eq!(view.len(), 2);
        assert_eq!(view.iter().collect::<Vec<_>>(), vec![5, 7]);
        assert_eq!(view.get(0), Some(5));
        assert_eq!(view.get(1), Some(7));
        assert_eq!(view.get(2), None);

        let first = Neighbours::excluding(&snapshot, 0);
        assert_eq!(first.iter().collect::<Vec<_>>(), vec![6, 7]);
    }

    #[test]
    fn test_sample_never_returns_excluded_slot() {
        // The excluded agent holds a value no neighbour has
        let snapshot = [0, 0, 9, 0, 0];
        let view = Neighbours::excluding(&snapshot, 2);
        let mut rng = rng();
        for _ in 0..200 {
            let sample = view.sample(&mut rng, 4).unwrap();
            assert_eq!(sample.len(), 4);
            assert!(sample.iter().all(|s| *s == 0));
        }
    }

    #[test]
    fn test_insufficient_neighbours() {
        let snapshot = [0, 1, 0];
        let view = Neighbours::excluding(&snapshot, 0);
        let result = Protocol::three_majority().run(0, view, &mut rng());
        assert_eq!(result, Err(ProtocolError::insufficient(3, 2)));

        let empty = Neighbours::all(&[]);
        assert_eq!(
            Protocol::Voter.run(0, empty, &mut rng()),
            Err(ProtocolError::insufficient(1, 0))
        );
    }

    #[test]
    fn test_voter_adopts_neighbour() {
        let mut rng = rng();
        for _ in 0..50 {
            let next = Protocol::Voter.run(0, Neighbours::all(&[3]), &mut rng).unwrap();
            assert_eq!(next, 3);
        }
    }

    #[test]
    fn test_two_choice() {
        let mut rng = rng();
        // Agreeing pair is adopted
        assert_eq!(
            Protocol::TwoChoice.run(0, Neighbours::all(&[1, 1]), &mut rng),
            Ok(1)
        );
        // Disagreeing pair keeps the current state
        for _ in 0..50 {
            assert_eq!(
                Protocol::TwoChoice.run(2, Neighbours::all(&[0, 1]), &mut rng),
                Ok(2)
            );
        }
    }

    #[test]
    fn test_k_majority_adopts_majority() {
        let mut rng = rng();
        let protocol = Protocol::three_majority();
        assert_eq!(protocol.run(0, Neighbours::all(&[1, 1, 1]), &mut rng), Ok(1));

        // Any 3 of these contain at least two 1s
        let neighbours = [1, 1, 1, 0];
        for _ in 0..100 {
            let next = protocol.run(0, Neighbours::all(&neighbours), &mut rng).unwrap();
            assert_eq!(next, 1);
        }
    }

    #[test]
    fn test_k_majority_fallback_draws_from_sample() {
        let mut rng = rng();
        let protocol = Protocol::k_majority(5).unwrap();
        // No state reaches 3 of 5, so the result is a random sampled state
        let neighbours = [0, 0, 1, 1, 2];
        let mut seen = [false; 3];
        for _ in 0..300 {
            let next = protocol.run(7, Neighbours::all(&neighbours), &mut rng).unwrap();
            assert!(next < 3);
            seen[next] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_run_is_deterministic_for_seed() {
        let neighbours = [0, 1, 2, 0, 1, 2, 0, 1, 2];
        let protocol = Protocol::three_majority();
        let run = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            (0..20)
                .map(|_| protocol.run(0, Neighbours::all(&neighbours), &mut rng).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(run(42), run(42));
    }
}
