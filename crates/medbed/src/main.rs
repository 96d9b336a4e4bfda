//! medbed
//!
//! Command-line front end for hospital bed allocation: check patients in
//! and out, reserve and release beds, transfer patients and print reports.

mod admin;
mod commands;
mod config;
mod seed;

use clap::Parser;
use medbed_allocation::AllocationError;
use serde_json::json;
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::Command;
use crate::config::CliConfig;

/// Hospital bed allocation.
#[derive(Debug, Parser)]
#[command(name = "medbed", version, about)]
struct Cli {
    #[command(flatten)]
    config: CliConfig,

    #[command(subcommand)]
    command: Command,
}

/// Initializes logging to stderr. `RUST_LOG` overrides `level`.
fn init_logging(level: &str) {
    let level = level.to_ascii_lowercase();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "medbed={level},medbed_allocation={level},medbed_persistence={level}"
        ))
    });

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn report_error(err: &anyhow::Error, json: bool) {
    if json {
        let kind = err
            .downcast_ref::<AllocationError>()
            .map_or("error", AllocationError::kind);
        eprintln!("{}", json!({ "error": kind, "message": format!("{:#}", err) }));
    } else {
        eprintln!("Error: {:#}", err);
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.config.log_level);

    if let Err(errors) = cli.config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    debug!(command = ?cli.command, "running");
    if let Err(err) = commands::run(cli.command, &cli.config) {
        report_error(&err, cli.config.json);
        std::process::exit(1);
    }
}
