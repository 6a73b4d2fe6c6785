//! SignLab Simulator CLI
//!
//! Run deterministic hash-then-sign exchange scenarios and print the
//! narrated event log.

use clap::Parser;
use signlab_core::export::{write_private_key, write_public_key, write_signature};
use signlab_core::{
    ExportError, KeyBits, LogEntry, LogLevel, Principal, RsaProvider, RunState, SignatureScheme,
    Simulation,
};
use signlab_sim::scenarios::ScenarioId;
use signlab_sim::{RunTranscript, ScenarioResult, ScenarioRunner, SimEnv};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// SignLab deterministic signature simulation CLI
#[derive(Parser, Debug)]
#[command(name = "signlab-sim")]
#[command(about = "Run deterministic hash-then-sign exchange scenarios", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (baseline, deterministic_scheme, tampered_message,
    /// swapped_key, corrupted_signature, combined_attacks, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Message to sign (overrides the scenario default)
    #[arg(short, long)]
    message: Option<String>,

    /// Signature scheme override (pss, pkcs1v15)
    #[arg(long)]
    scheme: Option<String>,

    /// RSA key size override (2048, 3072, 4096)
    #[arg(long)]
    bits: Option<u32>,

    /// Virtual delay between pipeline stages in milliseconds
    #[arg(long, default_value = "400")]
    pace_ms: u64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export the run transcript to a JSON file (single scenario only)
    #[arg(long)]
    export: Option<String>,

    /// Write key pair PEMs and the signature to this directory (single scenario only)
    #[arg(long)]
    export_keys: Option<String>,
}

/// Builds a runner with the CLI overrides applied.
fn build_runner(args: &Args, seed: u64) -> ScenarioRunner {
    let mut runner = ScenarioRunner::new(seed).with_pace(Duration::from_millis(args.pace_ms));

    if let Some(message) = &args.message {
        runner = runner.with_message(message.clone());
    }

    if let Some(scheme) = args.scheme.as_deref() {
        let scheme = scheme.parse::<SignatureScheme>().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        });
        runner = runner.with_scheme(scheme);
    }

    if let Some(bits) = args.bits {
        let key_bits = KeyBits::try_from(bits).unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        });
        runner = runner.with_key_bits(key_bits);
    }

    runner
}

/// Replays the narrated event log through the logger.
fn print_narration(log: &[LogEntry]) {
    for entry in log {
        let line = format!("[{}] {}", entry.actor.name(), entry.text);
        match entry.level {
            LogLevel::Error => error!("{}", line),
            LogLevel::Warning => warn!("{}", line),
            _ => info!("{}", line),
        }
    }
}

/// Runs one scenario directly and writes the key pairs and signature to files.
///
/// Drives the engine inline instead of through `ScenarioRunner` so the key
/// material is still in memory when the run finishes.
async fn run_with_key_export(args: &Args, seed: u64, scenario: ScenarioId, dir: &str) -> bool {
    let config = build_runner(args, seed).scenario_config(scenario);
    let env = SimEnv::shared(seed);
    let mut sim =
        Simulation::new(Arc::clone(&env)).with_pacing(Duration::from_millis(args.pace_ms));

    if let Err(e) = sim.provision_keys(&config).await {
        error!("Key provisioning failed: {}", e);
        return false;
    }
    if let Err(e) = sim.run_scenario(&config).await {
        error!("Scenario run failed: {}", e);
        return false;
    }

    if !args.json {
        print_narration(sim.log().entries());
    }

    let dir = Path::new(dir);
    if let Err(e) = fs::create_dir_all(dir) {
        error!("Failed to create {}: {}", dir.display(), e);
        return false;
    }
    match export_artifacts(&sim, dir) {
        Ok(paths) => {
            for path in paths {
                info!("Wrote {}", path.display());
            }
        }
        Err(e) => {
            error!("Failed to export key material: {}", e);
            return false;
        }
    }

    sim.state() == RunState::Complete
        && sim.outcome().map(|o| o.verified) == Some(scenario.expected_verified())
}

/// Writes both key pairs and the signature as produced by the signer under `dir`.
fn export_artifacts(
    sim: &Simulation<SimEnv, RsaProvider<SimEnv>>,
    dir: &Path,
) -> Result<Vec<PathBuf>, ExportError> {
    let mut paths = Vec::new();
    for principal in [Principal::A, Principal::B] {
        if let Some(pair) = sim.key_pair(principal) {
            paths.push(write_public_key(dir, principal, &pair.public)?);
            paths.push(write_private_key(dir, principal, &pair.private)?);
        }
    }
    if let Some(signature) = sim.signature() {
        paths.push(write_signature(dir, signature)?);
    }
    Ok(paths)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    if !args.json {
        info!("SignLab Signature Simulator v0.1.0");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            eprintln!(
                "Available scenarios: baseline, deterministic_scheme, tampered_message, \
                 swapped_key, corrupted_signature, combined_attacks, all"
            );
            std::process::exit(1);
        })]
    };

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos() as u64
    } else {
        args.seed
    };

    // Handle --export-keys mode
    if let Some(dir) = &args.export_keys {
        if scenarios.len() > 1 {
            eprintln!("Error: --export-keys only supports a single scenario, not 'all'");
            std::process::exit(1);
        }

        let scenario = scenarios[0];
        if run_with_key_export(&args, base_seed, scenario, dir).await {
            info!("✓ {} (seed={}) PASSED", scenario.name(), base_seed);
        } else {
            error!("✗ {} (seed={}) FAILED", scenario.name(), base_seed);
            std::process::exit(1);
        }
        return;
    }

    // Handle --export mode
    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 {
            eprintln!("Error: --export only supports a single scenario, not 'all'");
            std::process::exit(1);
        }

        let scenario = scenarios[0];
        let runner = build_runner(&args, base_seed);
        let result = runner.run(scenario).await;

        if !args.json {
            print_narration(&result.log);
        }

        let transcript = RunTranscript::new(&result, &runner.scenario_config(scenario));
        if let Err(e) = transcript.write_to_file(export_path) {
            error!("Failed to write transcript: {:?}", e);
            std::process::exit(1);
        }
        info!(
            "Exported {} narration lines to {}",
            transcript.entries.len(),
            export_path
        );

        if result.passed {
            info!("✓ {} (seed={}) PASSED", scenario.name(), base_seed);
        } else {
            error!(
                "✗ {} (seed={}) FAILED: {}",
                scenario.name(),
                base_seed,
                result.failure_reason.as_deref().unwrap_or("unknown")
            );
            std::process::exit(1);
        }
        return;
    }

    // Track results
    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    // Run simulations
    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = build_runner(&args, seed);

        for scenario in &scenarios {
            let result = runner.run(*scenario).await;

            if !args.json {
                print_narration(&result.log);
                if result.passed {
                    info!("✓ {} (seed={}) PASSED", scenario.name(), seed);
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
                info!("");
            }

            if !result.passed {
                failed_count += 1;
            }

            all_results.push(result);
        }
    }

    // Summary
    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        // JSON output for CI parsing
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "verified": r.verified,
                    "log_entries": r.log.len(),
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary).unwrap());
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);

            // List failed seeds
            for result in &all_results {
                if !result.passed {
                    error!(
                        "  - {} seed={}: {}",
                        result.scenario.name(),
                        result.seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
