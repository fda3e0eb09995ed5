//! Population protocol simulator CLI
//!
//! Runs a single seeded simulation, or a batch of scenarios over many trials.

use clap::Parser;
use popsim_core::{PopulationNetwork, Protocol};
use popsim_sim::scenarios::ScenarioId;
use popsim_sim::{ScenarioResult, ScenarioRunner, SimContext, SimError, SimExport, StatesArg};
use tracing::{debug, error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Population protocol simulator
#[derive(Parser, Debug)]
#[command(name = "popsim")]
#[command(about = "Simulate population protocols on a fully connected population", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Number of agents
    #[arg(short, long, default_value = "100")]
    nodes: usize,

    /// Number of states, or a comma list of agents per state (e.g. 60,40)
    #[arg(short, long, default_value = "2", conflicts_with = "scenario")]
    states: String,

    /// Protocol (voter, twochoice, threemajority, <k>majority)
    #[arg(short, long, default_value = "threemajority")]
    protocol: String,

    /// Maximum number of rounds
    #[arg(short, long, default_value = "1000")]
    rounds: u64,

    /// Number of agents (taken from the end of the population) that never change state
    #[arg(long, default_value = "0", conflicts_with = "scenario")]
    faulty: usize,

    /// Scenario to run instead of a single simulation (unanimous, balanced, skewed,
    /// multi_state, faulty_majority, faulty_minority, undersized, all)
    #[arg(short = 'S', long)]
    scenario: Option<String>,

    /// Number of seeded trials per scenario
    #[arg(long, default_value = "20")]
    trials: u64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export the round-by-round history of a single run to a JSON file
    #[arg(long, conflicts_with = "scenario")]
    export: Option<String>,
}

/// Runs one simulation to completion.
fn run_single(args: &Args, protocol: Protocol, seed: u64) -> Result<SimExport, SimError> {
    let states: StatesArg = args.states.parse()?;
    let config = states
        .to_config(args.nodes)
        .with_max_rounds(args.rounds)
        .with_faulty(args.faulty);

    let rng = SimContext::new(seed).trial_rng(0);
    let mut network = PopulationNetwork::new(config, protocol, rng)?;

    info!(
        "Running {} on {} agents (seed={}, max_rounds={})",
        protocol,
        network.node_count(),
        seed,
        args.rounds
    );
    debug!("  round 0: counts={:?}", network.state_counts());

    while !network.has_finished() {
        network.run_round()?;
        if network.round() % 10 == 0 {
            debug!("  round {}: counts={:?}", network.round(), network.state_counts());
        }
    }

    match network.consensus() {
        Some(state) => info!("✓ Converged on state {} after {} rounds", state, network.round()),
        None => info!(
            "✗ No consensus after {} rounds: counts={:?}",
            network.round(),
            network.state_counts()
        ),
    }

    Ok(SimExport::from_network(&network, seed))
}

fn report_scenarios(results: &[ScenarioResult], json: bool) {
    let failed: Vec<&ScenarioResult> = results.iter().filter(|r| !r.passed).collect();

    if json {
        let summary = serde_json::json!({
            "total": results.len(),
            "passed": results.len() - failed.len(),
            "failed": failed.len(),
            "results": results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "protocol": r.protocol,
                    "seed": r.seed,
                    "nodes": r.node_count,
                    "passed": r.passed,
                    "trials": r.stats.trials,
                    "converged": r.stats.converged,
                    "mean_rounds": r.stats.mean_convergence_rounds(),
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Failed to serialize summary: {}", e),
        }
        return;
    }

    info!("");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if failed.is_empty() {
        info!("✅ All {} scenarios passed!", results.len());
    } else {
        error!("❌ {}/{} scenarios failed!", failed.len(), results.len());
        for result in failed {
            error!(
                "  - {} seed={}: {}",
                result.scenario.name(),
                result.seed,
                result.failure_reason.as_deref().unwrap_or("unknown")
            );
        }
    }
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    if !args.json {
        info!("Population Protocol Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let protocol = match Protocol::from_name(&args.protocol) {
        Ok(protocol) => protocol,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Available protocols: {}, <k>majority", Protocol::builtin_names().join(", "));
            std::process::exit(1);
        }
    };

    // Determine base seed
    let seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1)
    } else {
        args.seed
    };

    // Scenario mode
    if let Some(scenario) = &args.scenario {
        let scenarios: Vec<ScenarioId> = if scenario == "all" {
            ScenarioId::all()
        } else {
            vec![scenario.parse().unwrap_or_else(|e| {
                eprintln!("Error: {}", e);
                eprintln!("Available scenarios: unanimous, balanced, skewed, multi_state, faulty_majority, faulty_minority, undersized, all");
                std::process::exit(1);
            })]
        };

        let runner = ScenarioRunner::new(seed, args.nodes)
            .with_protocol(protocol)
            .with_max_rounds(args.rounds)
            .with_trials(args.trials);

        let mut results = Vec::new();
        for scenario in scenarios {
            let result = runner.run(scenario);
            if !args.json {
                if result.passed {
                    info!(
                        "✓ {} (seed={}) PASSED - {}/{} converged",
                        scenario.name(),
                        seed,
                        result.stats.converged,
                        result.stats.trials
                    );
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
            results.push(result);
        }

        report_scenarios(&results, args.json);

        // Exit with proper code for CI
        if results.iter().any(|r| !r.passed) {
            std::process::exit(1);
        }
        return;
    }

    // Single run mode
    let export = match run_single(&args, protocol, seed) {
        Ok(export) => export,
        Err(e) => {
            error!("Simulation failed: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(path) = &args.export {
        match export.write_to_file(path) {
            Ok(()) => info!("Exported {} rounds to {}", export.history.len(), path),
            Err(e) => {
                error!("Failed to write export: {}", e);
                std::process::exit(1);
            }
        }
    }

    if args.json {
        let summary = serde_json::json!({
            "protocol": export.protocol,
            "seed": export.seed,
            "nodes": export.node_count,
            "states": export.state_count,
            "converged": export.converged,
            "consensus": export.consensus,
            "rounds": export.rounds,
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Failed to serialize summary: {}", e),
        }
    }
}
