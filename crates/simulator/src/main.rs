//! CBC Casper Simulator
//!
//! Runs the broadcast-and-receive simulation to completion and reports each
//! slot. Optionally dumps every surviving validator's message store as JSON.

use anyhow::Result;
use cbc_simulator::{SimulatorConfig, Simulator};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// CBC Casper broadcast-and-receive simulator
#[derive(Parser, Debug)]
#[command(name = "cbc-sim")]
#[command(about = "Slot-by-slot CBC Casper simulation with rotating validators", long_about = None)]
struct Args {
    /// JSON config file (CLI flags override its fields)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Initial committee size
    #[arg(long)]
    validators: Option<usize>,

    /// Last slot to simulate
    #[arg(long)]
    max_slot: Option<u64>,

    /// Rotate one validator every N block heights
    #[arg(long)]
    checkpoint_interval: Option<u64>,

    /// Seed for initial validator weights
    #[arg(long)]
    seed: Option<u64>,

    /// Print every slot snapshot as a JSON line
    #[arg(short, long)]
    verbose: bool,

    /// Print each validator's message store as JSON at the end
    #[arg(long)]
    dump: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Serialize)]
struct StoreDump<'a> {
    validator: &'a str,
    messages: Vec<cbc_consensus::MessageRecord>,
}

fn load_config(args: &Args) -> Result<SimulatorConfig> {
    let mut config = match &args.config {
        Some(path) => SimulatorConfig::from_file(path)?,
        None => SimulatorConfig::default(),
    };
    if let Some(n) = args.validators {
        config.validator_count = n;
    }
    if let Some(n) = args.max_slot {
        config.max_slot = n;
    }
    if let Some(n) = args.checkpoint_interval {
        config.checkpoint_interval = n;
    }
    if let Some(n) = args.seed {
        config.seed = n;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(&args)?;
    tracing::info!("Starting CBC Casper simulation");
    tracing::info!("  Validators: {}", config.validator_count);
    tracing::info!("  Max slot: {}", config.max_slot);
    tracing::info!("  Checkpoint interval: {}", config.checkpoint_interval);
    tracing::info!("  Seed: {}", config.seed);

    let mut simulator = Simulator::new(config)?;
    let mut rotations = 0;
    let mut slots = 0;

    for snapshot in simulator.by_ref() {
        let snapshot = snapshot?;
        if snapshot.rotation.is_some() {
            rotations += 1;
        }
        slots += 1;
        if args.verbose {
            println!("{}", serde_json::to_string(&snapshot)?);
        }
    }

    let stats = simulator.network().stats();
    tracing::info!(
        "Simulation complete: {} slots, {} rotations, {} broadcasts, {} packets delivered",
        slots,
        rotations,
        stats.messages_broadcast,
        stats.packets_delivered
    );

    if args.dump {
        let observed_at = simulator.current_slot();
        let dumps: Vec<StoreDump> = simulator
            .network()
            .validators()
            .iter()
            .map(|v| StoreDump {
                validator: v.name(),
                messages: v.store().dump(observed_at),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&dumps)?);
    }

    Ok(())
}
