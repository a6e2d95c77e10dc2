//! Waypoint Assistant Reference Runtime: Demo CLI
//!
//! Runs one or all of the reference assistant scenarios. Each scenario uses
//! the real planner, executor, rule engine and memory store wired to mock
//! tools and a scripted model.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- digest
//!   cargo run -p demo -- guardrail
//!   cargo run -p demo -- failing-step
//!   cargo run -p demo -- consolidate
//!   cargo run -p demo -- --config waypoint.toml run-all

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use waypoint_contracts::{config::WaypointConfig, error::WaypointResult};
use waypoint_ref_assistant::scenarios::{consolidate, digest, failing_step, guardrail};

// ── CLI definition ────────────────────────────────────────────────────────────

/// Waypoint: plan, guard, and remember for autonomous agents.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "Waypoint assistant reference runtime demo",
    long_about = "Runs Waypoint demo scenarios showing plan generation, dependency-gated\n\
                  execution, rule guardrails, step failure handling, and memory consolidation."
)]
struct Cli {
    /// Load a Waypoint TOML configuration instead of the defaults.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all four scenarios in sequence.
    RunAll,
    /// Scenario 1: Morning Digest (placeholders, rule actions, memories).
    Digest,
    /// Scenario 2: Partner Mail Guardrail (stop_execution rule).
    Guardrail,
    /// Scenario 3: Calendar Outage (failing step fails the plan).
    FailingStep,
    /// Scenario 4: Memory Consolidation (time-window merge).
    Consolidate,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Set RUST_LOG=debug for step-by-step executor output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {}", e);
            std::process::exit(2);
        }
    };

    print_banner();

    let result = match cli.command {
        Command::RunAll => run_all(&config),
        Command::Digest => digest::run_scenario(&config).map(|_| ()),
        Command::Guardrail => guardrail::run_scenario(&config).map(|_| ()),
        Command::FailingStep => failing_step::run_scenario(&config).map(|_| ()),
        Command::Consolidate => consolidate::run_scenario(&config).map(|_| ()),
    };

    match result {
        Ok(()) => {
            println!("All selected scenarios completed successfully.");
        }
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> WaypointResult<WaypointConfig> {
    match path {
        Some(path) => {
            info!(path = %path.display(), "loading configuration");
            WaypointConfig::from_file(path)
        }
        None => Ok(WaypointConfig::default()),
    }
}

// ── Scenario dispatch ─────────────────────────────────────────────────────────

fn run_all(config: &WaypointConfig) -> WaypointResult<()> {
    digest::run_scenario(config)?;
    guardrail::run_scenario(config)?;
    failing_step::run_scenario(config)?;
    consolidate::run_scenario(config)?;
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("Waypoint: Agent Orchestration Core");
    println!("Assistant Reference Demo");
    println!("==================================");
    println!();
    println!("Per step, in order:");
    println!("  [1] Cancellation check: a cancelled plan stops here");
    println!("  [2] Dependency gate: unmet dependencies skip the step");
    println!("  [3] Rule evaluation: stop_execution cancels before the step runs");
    println!("  [4] Rule actions applied, {{{{step_N_result}}}} placeholders resolved");
    println!("  [5] Tool or model invoked; a failure fails the plan");
    println!("  [6] Result recorded, index advanced, episodic memory written");
    println!();
}
