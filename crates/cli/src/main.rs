//! Eidolon CLI — the main entry point.
//!
//! Commands:
//! - `run`    — Start the persona agent (interactive console session)
//! - `check`  — Load, validate, and print the effective configuration
//! - `index`  — Run one memory index refresh cycle
//! - `init`   — Bootstrap the agent's namespace directories
//! - `card`   — Validate a character card file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "eidolon",
    about = "Eidolon — roleplay persona agent runtime",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the persona agent
    Run {
        /// Process a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Validate configuration and print a redacted summary
    Check,

    /// Run one memory index refresh cycle and exit
    Index,

    /// Bootstrap the namespace directory tree and seed files
    Init {
        /// Override the configured memory namespace
        #[arg(short, long)]
        namespace: Option<String>,
    },

    /// Validate a character card
    Card {
        /// Card path; defaults to the configured one
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run { message } => commands::run::run(message).await?,
        Commands::Check => commands::check::run().await?,
        Commands::Index => commands::index::run().await?,
        Commands::Init { namespace } => commands::init::run(namespace).await?,
        Commands::Card { path } => commands::card::run(path).await?,
    }

    Ok(())
}
