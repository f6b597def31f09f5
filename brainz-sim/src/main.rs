//! `brainz-sim`: run a definitions file headless and print JSON frames.
//!
//! ```text
//! brainz-sim <definitions.toml|json> [--config brainz.toml] [--seconds N] [--state NAME]... [--json-logs]
//! ```
//!
//! Each frame is one JSON line on stdout; a run summary follows the last
//! frame. Logging goes to stderr and honours `RUST_LOG`, falling back to
//! `general.log_level`.

use std::path::PathBuf;

use anyhow::{Context, bail};
use brainz_core::Definitions;
use brainz_sim::{Frame, SimConfig, Simulation};
use tracing::info;
use tracing_subscriber::EnvFilter;

struct Args {
    definitions: PathBuf,
    config: Option<PathBuf>,
    seconds: Option<f64>,
    states: Vec<String>,
    json_logs: bool,
}

fn print_usage() {
    eprintln!("brainz-sim <definitions> [options]");
    eprintln!("options:");
    eprintln!("  --config <path>   engine + [sim] settings (TOML)");
    eprintln!("  --seconds <n>     simulated seconds to run (default sim.duration_secs)");
    eprintln!("  --state <name>    world state that holds for the run (repeatable)");
    eprintln!("  --json-logs       structured JSON logs on stderr");
}

fn parse_args(raw: &[String]) -> anyhow::Result<Args> {
    let mut definitions = None;
    let mut config = None;
    let mut seconds = None;
    let mut states = Vec::new();
    let mut json_logs = false;

    let mut iter = raw.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => config = Some(PathBuf::from(iter.next().context("--config needs a path")?)),
            "--seconds" => {
                let value = iter.next().context("--seconds needs a value")?;
                seconds = Some(value.parse::<f64>().with_context(|| format!("invalid seconds: {value}"))?);
            }
            "--state" => states.push(iter.next().context("--state needs a name")?.clone()),
            "--json-logs" => json_logs = true,
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            other if other.starts_with('-') => bail!("unknown option: {other}"),
            other => {
                if definitions.replace(PathBuf::from(other)).is_some() {
                    bail!("only one definitions file may be given");
                }
            }
        }
    }

    Ok(Args {
        definitions: definitions.context("missing definitions file")?,
        config,
        seconds,
        states,
        json_logs,
    })
}

fn emit(frame: &Frame) {
    match serde_json::to_string(frame) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::error!(error = %e, "frame not serializable"),
    }
}

fn main() -> anyhow::Result<()> {
    let raw: Vec<String> = std::env::args().collect();
    let args = match parse_args(&raw) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e:#}");
            print_usage();
            std::process::exit(2);
        }
    };

    let mut config = match &args.config {
        Some(path) => SimConfig::from_file(path).with_context(|| format!("loading config {}", path.display()))?,
        None => SimConfig::default(),
    };
    config.sim.world_states.extend(args.states);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.engine.general.log_level));
    if args.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .init();
    }

    let definitions = Definitions::from_file(&args.definitions)
        .with_context(|| format!("loading definitions {}", args.definitions.display()))?;
    info!(
        behaviors = definitions.behaviors.len(),
        archetypes = definitions.archetypes.len(),
        agents = definitions.agents.len(),
        "definitions loaded"
    );

    let seconds = args.seconds.unwrap_or(f64::from(config.sim.duration_secs));
    let frame_every = f64::from(config.sim.snapshot_every_secs);
    let mut sim = Simulation::new(config, &definitions).context("building simulation")?;
    let summary = sim.run_for(seconds, frame_every, emit);

    println!("{}", serde_json::to_string(&summary).context("serializing summary")?);
    Ok(())
}
