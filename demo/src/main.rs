//! Bastion admission pipeline demo CLI.
//!
//! Keys live only in process memory, so every invocation bootstraps a fresh
//! runtime session: a new agent identity, a root-signed baseline kernel and
//! an empty evidence chain. The execution log, status snapshot and telemetry
//! summary are written under the state directory.
//!
//! Usage:
//!   cargo run -p demo -- preflight
//!   cargo run -p demo -- execute --intent deploy:api --constraint "change window open"
//!   cargo run -p demo -- status
//!   cargo run -p demo -- verify-chain
//!   cargo run -p demo -- halt --last-known-good <sha256>

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use bastion_contracts::error::BastionResult;
use bastion_runtime::{Runtime, RuntimeConfig};

// ── CLI definition ────────────────────────────────────────────────────────────

/// Bastion: fail-closed admission control for autonomous agents.
#[derive(Parser)]
#[command(
    name = "bastion",
    about = "Bastion admission pipeline demo",
    long_about = "Bootstraps a Bastion runtime, runs the pre-flight telemetry checklist,\n\
                  and admits plans through the six admission gates (G6-G11)."
)]
struct Cli {
    /// Runtime configuration file (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the state directory from the configuration.
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the eight pre-flight checks and print the telemetry summary.
    Preflight,
    /// Plan an intent and admit it through G6-G11.
    Execute {
        /// `verb` or `verb:target`, e.g. `deploy:api`.
        #[arg(long)]
        intent: String,
        /// Constraint added as a precondition; repeatable.
        #[arg(long = "constraint")]
        constraints: Vec<String>,
        #[arg(long, default_value = "complete the intent without regressions")]
        objective: String,
    },
    /// Print and persist the status snapshot.
    Status,
    /// Admit the sample plan, then verify the whole evidence chain.
    VerifyChain,
    /// Governance hard-kill: revert to a last-known-good kernel hash and halt.
    Halt {
        #[arg(long)]
        last_known_good: String,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Set RUST_LOG=info (or debug) for pipeline progress.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            eprintln!("bastion error: {}", e);
            std::process::exit(1);
        }
    }
}

fn load_config(cli: &Cli) -> BastionResult<RuntimeConfig> {
    let mut config = match &cli.config {
        Some(path) => RuntimeConfig::from_file(path)?,
        None => RuntimeConfig::default(),
    };
    if let Some(dir) = &cli.state_dir {
        config.state_dir = dir.clone();
    }
    Ok(config)
}

/// Returns whether the command's outcome was favourable.
fn run(cli: Cli) -> BastionResult<bool> {
    let config = load_config(&cli)?;
    let mut runtime = Runtime::bootstrap(config)?;
    let summary = runtime.run_telemetry_checklist()?;
    info!(autonomy = %summary.autonomy_status, "pre-flight finished");

    match cli.command {
        Command::Preflight => {
            print_json(&summary)?;
            Ok(summary.execution_ready)
        }
        Command::Execute {
            intent,
            constraints,
            objective,
        } => {
            let planned = runtime.plan(&intent, &constraints, &objective)?;
            let calls = vec![runtime.policy_call("demo-call-1", "workspace", "tool:write")];
            let outcome = runtime.execute_sps(&planned.plan, &calls)?;

            println!("plan      {} ({})", planned.plan.plan_id, planned.plan_hash);
            for result in &outcome.gate_run.results {
                println!("  {:<15} {}", result.gate_id.to_string(), result.status);
                for v in &result.violations {
                    println!("      - {v}");
                }
            }
            println!("bundle    {}", outcome.final_bundle.bundle_id);
            println!("coverage  {:.2}", outcome.compliance_coverage);
            println!(
                "execution {}",
                if outcome.execution_allowed { "ALLOWED" } else { "BLOCKED" }
            );
            Ok(outcome.execution_allowed)
        }
        Command::Status => {
            print_json(&runtime.status()?)?;
            Ok(true)
        }
        Command::VerifyChain => {
            let sample = runtime.sample_plan();
            runtime.execute_sps(&sample, &[])?;
            let report = runtime.verify_chain()?;
            let export = runtime.chain().export()?;
            println!(
                "chain of {} bundles, terminal hash {}",
                export.bundles.len(),
                export.terminal_hash
            );
            if report.valid {
                println!("chain valid");
            } else {
                for v in &report.violations {
                    println!("  - {v}");
                }
            }
            Ok(report.valid)
        }
        Command::Halt { last_known_good } => {
            runtime.hard_kill(&last_known_good);
            print_json(&runtime.status()?)?;
            Ok(true)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> BastionResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
