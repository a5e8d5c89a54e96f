//! Credential command handlers

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use labforge_core::domain::lab::{Provider, ProviderCredentials};

use crate::api::ApiClient;
use crate::config::Config;

/// Credential subcommands
#[derive(Subcommand)]
pub enum CredentialCommands {
    /// Store OVHcloud API credentials on the orchestrator
    Set {
        /// API endpoint (e.g. ovh-eu)
        #[arg(long, env = "OVH_ENDPOINT", default_value = "ovh-eu")]
        endpoint: String,

        #[arg(long, env = "OVH_APPLICATION_KEY")]
        application_key: String,

        #[arg(long, env = "OVH_APPLICATION_SECRET", hide_env_values = true)]
        application_secret: String,

        #[arg(long, env = "OVH_CONSUMER_KEY", hide_env_values = true)]
        consumer_key: String,

        /// Public cloud project the labs are created in
        #[arg(long, env = "OVH_CLOUD_PROJECT_SERVICE")]
        project_id: String,
    },
    /// Show whether credentials are configured
    Status,
}

/// Handle credential commands
pub async fn handle_credentials_command(command: CredentialCommands, config: &Config) -> Result<()> {
    let client = ApiClient::new(&config.orchestrator_url);

    match command {
        CredentialCommands::Set {
            endpoint,
            application_key,
            application_secret,
            consumer_key,
            project_id,
        } => {
            let credentials = ProviderCredentials {
                endpoint,
                application_key,
                application_secret,
                consumer_key,
                project_id,
            };
            let missing = credentials.missing_fields();
            if !missing.is_empty() {
                anyhow::bail!("Missing credential fields: {}", missing.join(", "));
            }

            client.set_credentials(Provider::Ovh, &credentials).await?;
            println!("{} Credentials for {} stored", "✓".green(), Provider::Ovh);
            Ok(())
        }
        CredentialCommands::Status => {
            let status = client.credential_status(Provider::Ovh).await?;
            if status.configured {
                println!("{} {} credentials configured", "✓".green(), status.provider);
            } else {
                println!(
                    "{} {} credentials not configured",
                    "✗".red(),
                    status.provider
                );
            }
            Ok(())
        }
    }
}
