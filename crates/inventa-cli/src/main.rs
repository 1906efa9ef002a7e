//! # inventa CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use inventa_cli::fingerprint::{run_fingerprint, FingerprintArgs};
use inventa_cli::rut::{run_rut, RutArgs};
use inventa_cli::seed::{run_seed, SeedArgs};

/// Inventa operator CLI.
///
/// Seeds reference catalogs, checks RUTs, and drives the workstation's
/// fingerprint reader.
#[derive(Parser, Debug)]
#[command(name = "inventa", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load baseline statuses, units and movement types into a running API.
    Seed(SeedArgs),

    /// Validate or format a RUT.
    Rut(RutArgs),

    /// List readers, capture and enroll fingerprints.
    Fingerprint(FingerprintArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Seed(args) => run_seed(args).await,
        Commands::Rut(args) => run_rut(args),
        Commands::Fingerprint(args) => run_fingerprint(args).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
