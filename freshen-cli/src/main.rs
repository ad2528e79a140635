//! Freshen — per-client record reconciliation CLI.
//!
//! # Usage
//!
//! ```text
//! freshen run --roster <path|url> --watched h1,h2 [--categories love,letter]
//!             [--policy rolling-ttl|fixed-cutoff] [--ttl-days N] [--cutoff-days N]
//!             [--store <path>] [--payload <yaml>] [--dry-run] [--json]
//! freshen inspect <client> --watched h1,h2 [--category love] [--json]
//! ```
//!
//! Every option also reads from its environment variable (see `--help`).

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{inspect::InspectArgs, run::RunArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "freshen",
    version,
    about = "Reconcile per-client records against watched content fingerprints",
    long_about = None,
)]
struct Cli {
    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile every client in the roster and write stale or missing records.
    Run(RunArgs),

    /// Show a client's stored records and what a run would do with them.
    Inspect(InspectArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);
    match cli.command {
        Commands::Run(args) => args.run(),
        Commands::Inspect(args) => args.run(),
    }
}

fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
