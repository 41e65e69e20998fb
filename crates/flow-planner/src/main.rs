//! Flow Planning CLI
//!
//! Places every demand of a scenario on the tiered network, restores the
//! delay bound and minimizes the weighted average delay.
//!
//! Usage:
//!   plan-flows --scenario data/scenario.json --output data/plan.json

use anyhow::{Context, Result};
use clap::Parser;
use flow_routing::{OptimizationReport, RoutingPlan, Scenario};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(
    name = "plan-flows",
    about = "Delay-bounded flow placement for tiered transport networks"
)]
struct Args {
    /// Path to scenario JSON (topology, flows, solver)
    #[arg(short, long, default_value = "data/scenario.json")]
    scenario: PathBuf,

    /// Output JSON file for the routing plan
    #[arg(short, long, default_value = "data/plan.json")]
    output: PathBuf,

    /// Stop after feasibility restoration
    #[arg(long)]
    skip_optimize: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Everything written to `--output`
#[derive(Debug, Serialize)]
struct PlanOutput {
    restored: bool,
    optimization: Option<OptimizationReport>,
    plan: RoutingPlan,
}

fn run(scenario: &Scenario, skip_optimize: bool) -> Result<PlanOutput> {
    let mut solution = scenario.build().context("building initial placement")?;

    let restored = solution.make_feasible_with(&scenario.solver.restorer);
    if !restored {
        warn!(
            infeasible = solution.infeasible_flows().len(),
            "delay bound {} could not be met for every flow",
            scenario.solver.max_delay
        );
    }

    let optimization = if restored && !skip_optimize {
        Some(solution.minimize_average_delay_with(&scenario.solver.optimizer))
    } else {
        None
    };

    Ok(PlanOutput {
        restored,
        optimization,
        plan: solution.plan(),
    })
}

fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("{}", "=".repeat(60));
    info!("Flow Planner");
    info!("{}", "=".repeat(60));

    let scenario = Scenario::load(&args.scenario)
        .with_context(|| format!("loading scenario {}", args.scenario.display()))?;
    info!(
        "Loaded {} flows on {:?} (max delay {})",
        scenario.flows.len(),
        scenario.topology.name,
        scenario.solver.max_delay
    );

    let output = run(&scenario, args.skip_optimize)?;

    for flow in &output.plan.flows {
        info!("  {}", flow);
    }

    info!("\nWriting plan to {:?}", args.output);
    write_json(&args.output, &output)?;

    // Summary
    info!("\n{}", "=".repeat(60));
    info!("SUMMARY");
    info!("{}", "=".repeat(60));
    info!("Feasible: {}", output.plan.feasible);
    info!("Average delay: {:.6}", output.plan.average_delay);
    if let Some(report) = &output.optimization {
        info!(
            "Optimizer: {:.6} -> {:.6} in {} sweeps",
            report.initial_avg_delay, report.best_avg_delay, report.sweeps
        );
    }

    Ok(())
}
