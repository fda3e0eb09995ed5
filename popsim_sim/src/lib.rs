//! Population Protocol Deterministic Simulation Harness
//!
//! This crate runs `popsim_core` populations under controlled conditions:
//! every random decision of every trial is derived from a single 64-bit
//! master seed, so any failing run is reproducible from its seed alone.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                      ScenarioRunner                       │
//! │  ┌────────────┐    trial seeds    ┌────────────────────┐  │
//! │  │ SimContext │ ────────────────► │ PopulationNetwork  │  │
//! │  │ (master    │   ChaCha8 RNGs    │ (one per trial)    │  │
//! │  │  seed)     │                   └─────────┬──────────┘  │
//! │  └────────────┘                             │             │
//! │                                  TrialOutcome / HistoryLog │
//! │                                             ▼             │
//! │               TrialStats ──► ScenarioResult / SimExport   │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use popsim_sim::ScenarioRunner;
//! use popsim_sim::scenarios::ScenarioId;
//!
//! let runner = ScenarioRunner::new(42, 50).with_trials(5);
//! let result = runner.run(ScenarioId::Balanced);
//! assert!(result.passed);
//! ```

mod context;
mod error;
mod exporter;
mod population;
mod runner;
pub mod scenarios;

pub use context::SimContext;
pub use error::SimError;
pub use exporter::{RoundFrame, SimExport};
pub use population::StatesArg;
pub use runner::{ScenarioResult, ScenarioRunner, TrialOutcome, TrialStats};
