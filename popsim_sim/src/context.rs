//! Simulation context - seed management for reproducible trials.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Derives every random source of a simulation batch from one master seed.
///
/// Each trial gets its own ChaCha8 stream, so adding trials never changes the
/// trajectory of the ones before it, and any failing trial can be replayed
/// from `(master seed, trial index)` alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimContext {
    /// Master seed for this batch
    seed: u64,
}

impl SimContext {
    /// Creates a new SimContext with the given seed.
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Returns the master seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Seed of the `trial`-th run. Trial 0 uses the master seed itself.
    pub fn trial_seed(&self, trial: u64) -> u64 {
        if trial == 0 {
            return self.seed;
        }
        self.seed
            .wrapping_mul(0x9e3779b97f4a7c15) // Golden ratio prime
            .wrapping_add(trial.wrapping_mul(0x517cc1b727220a95))
    }

    /// Fresh RNG for the `trial`-th run.
    pub fn trial_rng(&self, trial: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.trial_seed(trial))
    }
}
