//! Command-line front end for the simulation-governance core.
//!
//! Usage:
//! - `sim-governance run <scenario.json> --seed 7 --horizon 24`
//! - `sim-governance fork <scenario.json> --kind demand --magnitude 0.3`
//! - `sim-governance evaluate <envelopes.json> --tick 10`
//! - `sim-governance live <driver.json> --ticks 60`

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use sim_governance_core::governance::{evaluate_all_proposals, generate_proposals, ProposalConfig};
use sim_governance_core::metrics::{eval_dials, extract, DEFAULT_DIALS};
use sim_governance_core::{
    fork, run, ControlPlane, ControlPlaneConfig, CounterfactualChange, DomainRegistry, EventEnvelope, LiveDriver,
    LiveDriverConfig, Scenario, ScenarioSpec,
};

#[derive(Parser, Debug)]
#[command(name = "sim-governance")]
#[command(about = "Deterministic scenario simulation and governance")]
struct Cli {
    /// Domain registry JSON (defaults to the built-in simulation registry)
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    /// Write JSON output here instead of stdout
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a scenario through the deterministic engine
    Run {
        scenario: PathBuf,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long, default_value_t = 24)]
        horizon: u64,
    },
    /// Run a baseline and a counterfactual variant and diff them
    Fork {
        scenario: PathBuf,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long, default_value_t = 24)]
        horizon: u64,
        #[arg(long, value_enum)]
        kind: ChangeKind,
        #[arg(long, allow_hyphen_values = true)]
        magnitude: f64,
    },
    /// Score envelopes against the default dials and evaluate generated proposals
    Evaluate {
        envelopes: PathBuf,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long)]
        tick: Option<u64>,
    },
    /// Drive live traffic against a booking service and score it against the dials
    Live {
        config: PathBuf,
        #[arg(long, default_value_t = 60)]
        ticks: u64,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ChangeKind {
    Demand,
    Provider,
    Cancellation,
}

impl ChangeKind {
    fn with_magnitude(self, magnitude: f64) -> CounterfactualChange {
        match self {
            ChangeKind::Demand => CounterfactualChange::Demand { magnitude },
            ChangeKind::Provider => CounterfactualChange::Provider { magnitude },
            ChangeKind::Cancellation => CounterfactualChange::Cancellation { magnitude },
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sim_governance=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn emit<T: Serialize>(value: &T, out: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => fs::write(path, json).with_context(|| format!("writing {}", path.display())),
        None => {
            println!("{}", json);
            Ok(())
        }
    }
}

fn load_scenario(path: &Path, registry: &DomainRegistry) -> Result<Scenario> {
    let spec: ScenarioSpec = read_json(path)?;
    Scenario::from_history(spec, registry).context("building scenario")
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let registry = match &cli.registry {
        Some(path) => read_json(path)?,
        None => DomainRegistry::default_simulation(),
    };
    let out = cli.out.as_deref();

    match cli.command {
        Command::Run { scenario, seed, horizon } => {
            let scenario = load_scenario(&scenario, &registry)?;
            let result = run(&scenario, &registry, seed, horizon)?;
            emit(&result, out)
        }
        Command::Fork {
            scenario,
            seed,
            horizon,
            kind,
            magnitude,
        } => {
            let scenario = load_scenario(&scenario, &registry)?;
            let result = fork(&scenario, &registry, seed, horizon, kind.with_magnitude(magnitude))?;
            let report = result.report()?;
            let evaluation = result.evaluate(&report.report_hash, &DEFAULT_DIALS);
            eprintln!("{}", report.markdown_summary);
            emit(
                &serde_json::json!({
                    "change": result.change,
                    "delta": result.delta,
                    "report": report,
                    "evaluation": evaluation,
                }),
                out,
            )
        }
        Command::Evaluate { envelopes, seed, tick } => {
            let envelopes: Vec<EventEnvelope> = read_json(&envelopes)?;
            let tick = tick
                .or_else(|| envelopes.iter().map(|e| e.generated_at_tick).max())
                .unwrap_or(0);
            let dials = eval_dials(&extract(&envelopes), &DEFAULT_DIALS);
            let proposals = generate_proposals(seed, tick, &envelopes, &ProposalConfig::default());
            let decisions = evaluate_all_proposals(tick, &proposals, Some(dials.as_slice()), None)?;
            emit(
                &serde_json::json!({
                    "tick": tick,
                    "dials": dials,
                    "proposals": proposals,
                    "decisions": decisions,
                }),
                out,
            )
        }
        Command::Live { config, ticks } => {
            let config: LiveDriverConfig = read_json(&config)?;
            let mut driver = LiveDriver::http(config)?;
            let stats = driver.run(ticks).await;
            let envelopes = driver.buffer().snapshot();

            let plane = ControlPlane::new(ControlPlaneConfig {
                max_events: envelopes.len().max(1),
                ..ControlPlaneConfig::default()
            });
            plane.start();
            let decisions = plane.ingest_live(&envelopes)?;
            let status = plane.status();
            emit(
                &serde_json::json!({
                    "stats": stats,
                    "envelopes": envelopes,
                    "dials": status.dials,
                    "decisions": decisions,
                }),
                out,
            )
        }
    }
}
