//! Watchlist Screening CLI
//!
//! Operator tool over the screening engine:
//! 1. `lists`  - print the capability document (lists, status, defaults)
//! 2. `screen` - screen a batch file and print the response
//! 3. `stats`  - print snapshot statistics
//!
//! Usage:
//!   cargo run --bin screen_cli -- screen --input batch.json --threshold 0.8 --list OFAC_SDN
//!
//! The batch file is either a request envelope `{"records": [...], "options": {...}}`
//! or a bare array of records. Flags override options from the file.
//!
//! Exit status: 0 on success, 2 when the batch is rejected by validation,
//! 3 when no data sources are available, 1 on any other failure.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ob_screening::config::ScreeningConfig;
use ob_screening::screening::{load_configured_lists, ScreeningEngine, SnapshotStore};
use ob_screening::ScreeningError;
use ob_screening_types::{BatchScreeningRequest, RawScreeningRecord};

#[derive(Parser, Debug)]
#[command(name = "screen_cli")]
#[command(about = "Screen identity records against configured watchlists")]
struct Args {
    /// Config file (default: $SCREENING_CONFIG or config/screening.yaml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print available lists and data source status as JSON
    Lists,

    /// Screen a batch file and print the response as JSON
    Screen {
        /// JSON batch file
        #[arg(long, short = 'i')]
        input: PathBuf,

        /// Match threshold in [0, 1]
        #[arg(long, short = 't')]
        threshold: Option<f64>,

        /// Restrict to a list code (can be specified multiple times)
        #[arg(long = "list", short = 'l')]
        lists: Vec<String>,

        /// Do not match against aliases
        #[arg(long)]
        no_aliases: bool,

        /// Do not compare dates of birth
        #[arg(long)]
        no_dob: bool,

        /// Do not compare countries
        #[arg(long)]
        no_country: bool,

        /// Fall back to the synthetic demo list when no live list is available
        #[arg(long)]
        allow_demo: bool,

        /// Overall batch deadline in milliseconds
        #[arg(long)]
        deadline_ms: Option<u64>,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Print snapshot statistics
    Stats,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ob_screening=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = match e.downcast_ref::<ScreeningError>() {
                Some(ScreeningError::Validation(_)) => 2,
                Some(ScreeningError::NoDataSources { .. }) => 3,
                _ => 1,
            };
            if let Some(screening) = e.downcast_ref::<ScreeningError>() {
                if let Ok(json) = serde_json::to_string(&screening.to_response()) {
                    println!("{}", json);
                }
            }
            eprintln!("error: {:#}", e);
            ExitCode::from(code)
        }
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ScreeningConfig::from_file(path)?,
        None => ScreeningConfig::from_env()?,
    };

    if let Command::Screen {
        deadline_ms: Some(ms),
        ..
    } = &args.command
    {
        config.defaults.deadline_ms = Some(*ms);
    }

    let snapshot = load_configured_lists(&config)?.build();
    let store = Arc::new(SnapshotStore::new(snapshot));
    let engine = ScreeningEngine::new(config, store)?;

    match args.command {
        Command::Lists => {
            println!("{}", serde_json::to_string_pretty(&engine.capabilities())?);
        }
        Command::Stats => {
            print!("{}", engine.store().current().stats());
        }
        Command::Screen {
            input,
            threshold,
            lists,
            no_aliases,
            no_dob,
            no_country,
            allow_demo,
            pretty,
            ..
        } => {
            let mut request = read_batch(&input)?;
            let options = &mut request.options;
            if threshold.is_some() {
                options.threshold = threshold;
            }
            if !lists.is_empty() {
                options.lists = lists;
            }
            if no_aliases {
                options.include_aliases = Some(false);
            }
            if no_dob {
                options.check_dob = Some(false);
            }
            if no_country {
                options.check_country = Some(false);
            }
            options.allow_demo_data |= allow_demo;

            let result = engine.screen_batch(&request.records, &request.options)?;
            let response = result.to_response();
            let json = if pretty {
                serde_json::to_string_pretty(&response)?
            } else {
                serde_json::to_string(&response)?
            };
            println!("{}", json);
        }
    }

    Ok(())
}

/// Read a request envelope, or a bare array of records
fn read_batch(path: &Path) -> Result<BatchScreeningRequest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read batch file {}", path.display()))?;

    let envelope_err = match serde_json::from_str::<BatchScreeningRequest>(&content) {
        Ok(request) => return Ok(request),
        Err(e) => e,
    };
    let records: Vec<RawScreeningRecord> = serde_json::from_str(&content)
        .map_err(|array_err| {
            anyhow!(
                "not a request envelope ({}) nor a record array ({})",
                envelope_err,
                array_err
            )
        })
        .with_context(|| format!("Invalid batch file {}", path.display()))?;
    Ok(BatchScreeningRequest {
        records,
        ..Default::default()
    })
}
