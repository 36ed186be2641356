mod benchmark;
mod campaign;
mod config;
mod database;
mod executors;
mod ingest;
mod values;

use campaign::{CampaignError, CampaignSuite};
use clap::{ArgAction, Parser, Subcommand};
use config::{ConfigErrors, SuiteConfig};
use itertools::Itertools;
use std::{error::Error, path::PathBuf, process::ExitCode};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Build, run and record benchmark campaigns of native programs
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Campaign suite to load. Falls back to the built-in ray tracer campaign
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Raise the log level, `-v` for debug and `-vv` for trace. `RUST_LOG` takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build every benchmark and run all campaigns, storing one record per run
    Run {
        /// Free text stored with the campaigns (SQLite only)
        #[arg(long)]
        comment: Option<String>,
    },
    /// Show the runs and expected durations without executing anything
    Plan,
    /// Validate the configuration and check that required packages are installed
    Check,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();
}

fn run(cli: Cli) -> Result<(), CampaignError> {
    let mut config = match cli.config {
        Some(ref path) => SuiteConfig::load(path)?,
        None => {
            info!("No config given, using the built-in ray tracer campaign");
            SuiteConfig::default_suite()
        }
    };

    if config.preflight_checks() {
        return Err(ConfigErrors::PreflightFailed.into());
    }

    let missing = config.missing_dependencies();
    for dependency in missing.iter() {
        warn!("Package {dependency} is not installed");
    }

    let suite = CampaignSuite::new(config);

    match cli.command {
        Commands::Check => {
            if missing.is_empty() {
                info!("Configuration is valid and all packages are installed");
                Ok(())
            } else {
                Err(ConfigErrors::MissingDependencies(
                    missing.iter().map(|dependency| dependency.package).join(", "),
                )
                .into())
            }
        }
        Commands::Plan => {
            suite.print_durations();
            suite.print_plan()
        }
        Commands::Run { comment } => {
            suite.print_durations();
            suite.run_suite(comment.as_deref())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let mut message = e.to_string();
            let mut source = e.source();
            while let Some(cause) = source {
                message.push_str(": ");
                message.push_str(&cause.to_string());
                source = cause.source();
            }

            error!("{message}");
            ExitCode::FAILURE
        }
    }
}
