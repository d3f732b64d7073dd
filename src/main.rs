//! `netcondition` binary: list presets, validate configuration and simulate
//! profiles in virtual time.

mod cli;

use std::{error::Error, process::ExitCode};

use chrono::NaiveTime;
use clap::Parser;
use netcondition::{
    clock::FixedClock,
    config::EngineConfig,
    dry_run::DryRun,
    presets::{self, PRESETS, SCENARIOS},
};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, SimulateArgs};

fn main() -> ExitCode {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    match cli.command {
        Command::Presets => {
            for spec in PRESETS {
                let peak = spec.peak.map_or_else(String::new, |(start, end, rate)| {
                    format!("  peak {start:02}-{end:02}h {rate:.3}")
                });
                println!(
                    "{:<22} base {:>5} ms  jitter [{}, {}] ms  failure {:.3} ({}){peak}",
                    spec.name,
                    spec.base_delay_ms,
                    spec.jitter_min_ms,
                    spec.jitter_max_ms,
                    spec.failure_rate,
                    spec.failure_status,
                );
            }
        }
        Command::Scenarios => {
            for scenario in SCENARIOS {
                println!("{}", scenario.name);
                for (pattern, preset) in scenario.routes {
                    println!("  {pattern:<36} {preset}");
                }
            }
        }
        Command::Check { path } => {
            let config = EngineConfig::load(&path)?;
            let routes = config.validate()?;
            println!(
                "{}: {} route(s), {} scenario(s) valid",
                path.display(),
                routes.len(),
                config.scenarios.len()
            );
        }
        Command::Simulate(args) => simulate(args)?,
    }
    Ok(())
}

fn simulate(args: SimulateArgs) -> Result<(), Box<dyn Error>> {
    #[cfg(feature = "metrics")]
    let prometheus = if args.metrics {
        Some(netcondition::metrics::install_prometheus_recorder()?)
    } else {
        None
    };

    let mut dry_run = DryRun::new(presets::preset(&args.preset)?)
        .pattern(args.pattern)
        .path(args.path)
        .requests(args.requests);
    if let Some(seed) = args.seed {
        dry_run = dry_run.seed(seed);
    }
    if let Some(at) = args.at {
        dry_run = dry_run.at(FixedClock::new(NaiveTime::parse_from_str(&at, "%H:%M")?));
    }

    // Paused time auto-advances to the next timer, so injected delays cost nothing.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()?;
    let report = runtime.block_on(dry_run.run())?;
    println!("{report}");

    #[cfg(feature = "metrics")]
    {
        if let Some(handle) = prometheus {
            println!();
            print!("{}", handle.render());
        }
    }
    Ok(())
}
