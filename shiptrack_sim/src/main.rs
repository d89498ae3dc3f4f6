//! ShipTrack DST Simulator CLI
//!
//! Runs playback scenarios, or a shipment file, on the virtual clock.

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use shiptrack_core::{PlaybackConfig, Shipment};
use shiptrack_sim::scenarios::ScenarioId;
use shiptrack_sim::{PlaybackExport, ScenarioResult, ScenarioRunner};
use std::path::Path;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// ShipTrack Deterministic Simulation Testing CLI
#[derive(Parser, Debug)]
#[command(name = "shiptrack-sim")]
#[command(about = "Run deterministic playback simulations for ShipTrack", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (delivered, in_transit, noisy_log, geocode_outage,
    /// out_for_delivery, cancel_midway, concurrent_sessions, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Play back a shipment JSON file instead of the built-in scenarios
    #[arg(long)]
    shipment: Option<String>,

    /// Playback config JSON file
    #[arg(long)]
    config: Option<String>,

    /// Override the short (icon swap) delay
    #[arg(long)]
    short_delay_ms: Option<u64>,

    /// Override the long (step) delay
    #[arg(long)]
    long_delay_ms: Option<u64>,

    /// Geocoder failure rate (0.0 - 1.0)
    #[arg(long)]
    failure_rate: Option<f64>,

    /// Number of random seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export the map call trace to a JSON file (single run only)
    #[arg(long)]
    export: Option<String>,
}

fn load_config(args: &Args) -> Result<PlaybackConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path))?;
            serde_json::from_str::<PlaybackConfig>(&raw)
                .with_context(|| format!("parsing config {}", path))?
        }
        None => PlaybackConfig::default(),
    };

    let short = args.short_delay_ms.unwrap_or(config.short_delay_ms);
    let long = args.long_delay_ms.unwrap_or(config.long_delay_ms);
    config = config.with_delays(short, long);
    config.validate()?;
    Ok(config)
}

fn load_shipment(path: &str) -> Result<Shipment> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading shipment {}", path))?;
    let shipment = Shipment::from_json(&raw).with_context(|| format!("parsing shipment {}", path))?;
    shipment.validate()?;
    Ok(shipment)
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    if !args.json {
        info!("ShipTrack DST Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let config = load_config(&args)?;

    let shipment = match &args.shipment {
        Some(path) => Some((path.clone(), load_shipment(path)?)),
        None => None,
    };

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().map_err(|e: String| anyhow!(e))?]
    };

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1)
    } else {
        args.seed
    };

    if args.export.is_some() {
        let runs = if shipment.is_some() { 1 } else { scenarios.len() };
        if runs > 1 || args.seeds > 1 {
            bail!("--export only supports a single scenario and seed, not 'all'");
        }
    }

    let mut all_results: Vec<ScenarioResult> = Vec::new();

    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);

        let mut runner = ScenarioRunner::new(seed).with_config(config.clone());
        if let Some(rate) = args.failure_rate {
            runner = runner.with_failure_rate(rate);
        }

        let results = match &shipment {
            Some((path, shipment)) => {
                let name = Path::new(path)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("shipment");
                vec![runner.run_shipment(name, shipment.clone())]
            }
            None => scenarios.iter().map(|s| runner.run(*s)).collect(),
        };

        for result in results {
            if !args.json {
                if result.passed {
                    info!(
                        "✓ {} (seed={}) PASSED | placed={} skipped={} t={}ms",
                        result.scenario,
                        seed,
                        result.waypoints_placed,
                        result.waypoints_skipped,
                        result.virtual_time_ms
                    );
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        result.scenario,
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
            all_results.push(result);
        }
    }

    if let (Some(path), Some(result)) = (&args.export, all_results.first()) {
        let export = PlaybackExport::from(result);
        export
            .write_to_file(path)
            .with_context(|| format!("writing export {}", path))?;
        info!("Exported {} map calls to {}", export.frames.len(), path);
    }

    // Summary
    let total = all_results.len();
    let failed_count = all_results.iter().filter(|r| !r.passed).count();
    let passed = total - failed_count;

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario,
                    "seed": r.seed,
                    "passed": r.passed,
                    "waypoints_placed": r.waypoints_placed,
                    "waypoints_skipped": r.waypoints_skipped,
                    "virtual_time_ms": r.virtual_time_ms,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);
            for result in all_results.iter().filter(|r| !r.passed) {
                error!(
                    "  - {} seed={}: {}",
                    result.scenario,
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
    Ok(())
}
