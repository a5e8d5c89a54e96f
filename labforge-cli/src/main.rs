//! Labforge CLI
//!
//! Command-line interface for the Labforge orchestrator.

mod api;
mod commands;
mod config;
mod id_resolver;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "labforge")]
#[command(about = "Provision and tear down ephemeral Kubernetes labs", long_about = None)]
struct Cli {
    /// Orchestrator URL
    #[arg(
        long,
        env = "LABFORGE_ORCHESTRATOR_URL",
        default_value = "http://localhost:8080"
    )]
    orchestrator_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        orchestrator_url: cli.orchestrator_url,
    };

    handle_command(cli.command, &config).await
}
