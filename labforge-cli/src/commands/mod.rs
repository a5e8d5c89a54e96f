//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod credentials;
mod job;

pub use credentials::CredentialCommands;
pub use job::JobCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Lab job management
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// Provider credential management
    Credentials {
        #[command(subcommand)]
        command: CredentialCommands,
    },
}

/// Handle a CLI command
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Job { command } => job::handle_job_command(command, config).await,
        Commands::Credentials { command } => {
            credentials::handle_credentials_command(command, config).await
        }
    }
}
