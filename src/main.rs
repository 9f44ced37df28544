//! planrun CLI Entry Point
//!
//! Command-line runner for workplan files: validates a workplan, executes it
//! to completion, or pauses mid-run and writes the snapshot for a later
//! resume.
//!
//! # Usage
//!
//! ```bash
//! # Execute a workplan to completion
//! planrun mill.workplan
//!
//! # Validate only
//! planrun mill.workplan --validate
//!
//! # Fire three transitions, then pause and write the snapshot
//! planrun mill.workplan --pause-after 3 --snapshot-out mill.snapshot.json
//!
//! # Resume from a snapshot
//! planrun mill.workplan --resume mill.snapshot.json
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use log::{error, info, warn};

use planrun::engine::WorkflowEngine;
use planrun::prediction::PathPredictor;
use planrun::workplan::{validate_workplan, FileWorkplans, Workplans};
use planrun::{Snapshot, APP_NAME, VERSION};

/// Command-line configuration parsed from arguments.
#[derive(Debug, Default)]
struct Config {
    workplan_path: PathBuf,
    validate_only: bool,
    resume_from: Option<PathBuf>,
    pause_after: Option<usize>,
    snapshot_out: Option<PathBuf>,
    verbose: bool,
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME, VERSION);
    println!("Workplan Execution Engine");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: planrun [OPTIONS] <WORKPLAN_FILE>");
    println!();
    println!("Arguments:");
    println!("  <WORKPLAN_FILE>      Path to a .workplan YAML file");
    println!();
    println!("Options:");
    println!("  --validate           Validate the workplan and exit");
    println!("  --resume FILE        Restore a snapshot before starting");
    println!("  --pause-after N      Fire N transitions, then pause");
    println!("  --snapshot-out FILE  Where to write the pause snapshot");
    println!("  --verbose            Enable debug logging");
    println!("  --help               Show this help message");
    println!("  --version            Show version information");
    println!();
    println!("Examples:");
    println!("  planrun mill.workplan");
    println!("  planrun mill.workplan --pause-after 3 --snapshot-out mill.snapshot.json");
    println!("  planrun mill.workplan --resume mill.snapshot.json");
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut positional_index = 0;
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--validate" => {
                config.validate_only = true;
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--resume" => {
                i += 1;
                if i >= args.len() {
                    return Err("--resume requires a file argument".to_string());
                }
                config.resume_from = Some(PathBuf::from(&args[i]));
            }
            "--pause-after" => {
                i += 1;
                if i >= args.len() {
                    return Err("--pause-after requires a number argument".to_string());
                }
                config.pause_after = Some(
                    args[i]
                        .parse()
                        .map_err(|_| format!("Invalid pause-after value: {}", args[i]))?,
                );
            }
            "--snapshot-out" => {
                i += 1;
                if i >= args.len() {
                    return Err("--snapshot-out requires a file argument".to_string());
                }
                config.snapshot_out = Some(PathBuf::from(&args[i]));
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                match positional_index {
                    0 => config.workplan_path = PathBuf::from(arg),
                    _ => return Err(format!("Unexpected argument: {}", arg)),
                }
                positional_index += 1;
            }
        }
        i += 1;
    }

    if positional_index == 0 {
        return Err("Missing workplan file argument".to_string());
    }

    Ok(config)
}

/// Loads the workplan named by a `.workplan` file path.
fn load_workplan(path: &Path) -> Result<planrun::Workplan, Box<dyn std::error::Error>> {
    let (root, name) = FileWorkplans::split_path(path)
        .ok_or_else(|| format!("Invalid workplan path: {}", path.display()))?;
    let store = FileWorkplans::new(root);
    Ok(store.load(&name)?)
}

/// Reads a snapshot from a JSON file.
fn load_snapshot(path: &Path) -> Result<Snapshot, Box<dyn std::error::Error>> {
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

/// Writes a snapshot to a JSON file.
fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, json)?;
    info!("Snapshot written to {}", path.display());
    Ok(())
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    setup_logging(config.verbose);
    print_banner();

    info!("Loading workplan: {}", config.workplan_path.display());
    let plan = load_workplan(&config.workplan_path)?;
    info!(
        "Workplan '{}' v{}: {} places, {} steps",
        plan.name,
        plan.version,
        plan.connectors().len(),
        plan.steps().len()
    );

    if let Err(errors) = validate_workplan(&plan) {
        for e in &errors {
            error!("{}", e);
        }
        return Err(format!("Workplan '{}' has {} validation errors", plan.name, errors.len()).into());
    }

    if config.validate_only {
        return Ok(());
    }

    let predictor = Arc::new(PathPredictor::new(&plan)?);
    predictor.on_prediction(Arc::new(|p| {
        info!(
            "Predicted outcome for engine {}: {} (p={:.2})",
            p.engine, p.outcome, p.probability
        );
    }));

    let mut engine = WorkflowEngine::new();
    predictor.monitor(&mut engine);
    engine.initialize(plan);

    if let Some(ref path) = config.resume_from {
        let snapshot = load_snapshot(path)?;
        info!(
            "Restoring snapshot of '{}' taken at {} ({} tokens)",
            snapshot.workplan_name,
            snapshot.taken_at,
            snapshot.token_count()
        );
        engine.restore(snapshot);
    }

    engine.start();

    match config.pause_after {
        Some(count) => {
            for _ in 0..count {
                let Some(&next) = engine.pending_transitions().first() else {
                    break;
                };
                engine.fire_transition(next);
            }
            match engine.pause()? {
                Some(snapshot) => {
                    info!(
                        "Paused with {} tokens in play",
                        snapshot.token_count()
                    );
                    if let Some(ref path) = config.snapshot_out {
                        write_snapshot(path, &snapshot)?;
                    }
                }
                None => info!("Run completed before the pause point"),
            }
        }
        None => {
            engine.fire_pending();
            if engine.state().name() == "Running" {
                warn!("Run stalled: no transition is enabled");
            }
        }
    }

    info!("Engine finished in state {}", engine.state().name());
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
