//! Job command handlers
//!
//! Creating labs from a configuration file, inspecting jobs and their
//! transcripts, and triggering driver operations.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use labforge_core::domain::job::{Job, JobStatus};
use labforge_core::domain::lab::LabConfig;
use labforge_core::dto::job::{JobSummary, StartMode};
use std::path::{Path, PathBuf};

use crate::api::ApiClient;
use crate::config::Config;
use crate::id_resolver::resolve_job_id;

/// Job subcommands
#[derive(Subcommand)]
pub enum JobCommands {
    /// Create a job from a JSON lab configuration
    Create {
        /// Path to the lab configuration file
        #[arg(short, long)]
        file: PathBuf,

        /// Start a dry run right away
        #[arg(long, conflicts_with = "apply")]
        preview: bool,

        /// Start provisioning right away
        #[arg(long)]
        apply: bool,
    },
    /// List all jobs
    List,
    /// Get job details
    Get {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// Print a job's transcript
    Logs {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// Run a dry run on a pending job
    Preview {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// Provision a pending job
    Apply {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// Provision a job whose dry run completed
    Launch {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// Provision a failed job again
    Retry {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// Tear down a job's lab
    Destroy {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// Provision a destroyed job's lab again as a new job
    Recreate {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// Delete a job record (the lab itself is left untouched)
    Delete {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// Print an example lab configuration
    Template {
        /// Stack name used in the example
        #[arg(long, default_value = "dev")]
        stack: String,
    },
}

/// Handle job commands
///
/// # Arguments
/// * `command` - The job command to execute
/// * `config` - The CLI configuration
pub async fn handle_job_command(command: JobCommands, config: &Config) -> Result<()> {
    let client = ApiClient::new(&config.orchestrator_url);

    match command {
        JobCommands::Create {
            file,
            preview,
            apply,
        } => create_job(&client, &file, start_mode(preview, apply)).await,
        JobCommands::List => list_jobs(&client).await,
        JobCommands::Get { id } => get_job(&client, &id).await,
        JobCommands::Logs { id } => get_job_logs(&client, &id).await,
        JobCommands::Preview { id } => run_action(&client, &id, "preview").await,
        JobCommands::Apply { id } => run_action(&client, &id, "apply").await,
        JobCommands::Launch { id } => run_action(&client, &id, "launch").await,
        JobCommands::Retry { id } => run_action(&client, &id, "retry").await,
        JobCommands::Destroy { id } => run_action(&client, &id, "destroy").await,
        JobCommands::Recreate { id } => run_action(&client, &id, "recreate").await,
        JobCommands::Delete { id } => delete_job(&client, &id).await,
        JobCommands::Template { stack } => print_template(&stack),
    }
}

fn start_mode(preview: bool, apply: bool) -> Option<StartMode> {
    match (preview, apply) {
        (true, _) => Some(StartMode::Preview),
        (_, true) => Some(StartMode::Apply),
        _ => None,
    }
}

/// Reads and validates a lab configuration file
fn read_config(path: &Path) -> Result<LabConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: LabConfig = serde_json::from_str(&content)
        .with_context(|| format!("Invalid lab configuration in {}", path.display()))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid lab configuration: {}", e))?;
    Ok(config)
}

async fn create_job(client: &ApiClient, file: &Path, start: Option<StartMode>) -> Result<()> {
    let config = read_config(file)?;
    let job = client.create_job(config, start).await?;

    println!("{} Job created", "✓".green());
    println!("  ID:    {}", job.id.to_string().cyan());
    println!("  Stack: {}", job.config.stack_name);
    match start {
        Some(_) => println!(
            "\nFollow progress with: labforge job logs {}",
            short_id(&job)
        ),
        None => println!(
            "\nStart it with: labforge job preview {} (or apply)",
            short_id(&job)
        ),
    }

    Ok(())
}

async fn list_jobs(client: &ApiClient) -> Result<()> {
    let jobs = client.list_jobs().await?;

    if jobs.is_empty() {
        println!("{}", "No jobs found.".yellow());
    } else {
        println!("{}", format!("Found {} job(s):", jobs.len()).bold());
        println!();
        for job in jobs {
            print_job_summary(&job);
        }
    }

    Ok(())
}

async fn get_job(client: &ApiClient, id: &str) -> Result<()> {
    let uuid = resolve_job_id(client, id).await?;
    let job = client.get_job(uuid).await?;

    print_job_details(&job);

    Ok(())
}

async fn get_job_logs(client: &ApiClient, id: &str) -> Result<()> {
    let uuid = resolve_job_id(client, id).await?;
    let output = client.get_job_output(uuid).await?;

    if output.lines.is_empty() {
        println!("{}", "No output for this job yet.".yellow());
        return Ok(());
    }

    println!(
        "{}",
        format!("Output of job {} ({}):", uuid, output.status).bold()
    );
    println!("{}", "─".repeat(80).dimmed());
    for line in &output.lines {
        print_output_line(line);
    }
    println!("{}", "─".repeat(80).dimmed());

    Ok(())
}

async fn run_action(client: &ApiClient, id: &str, action: &str) -> Result<()> {
    let uuid = resolve_job_id(client, id).await?;
    let job = client.job_action(uuid, action).await?;

    if job.id != uuid {
        println!(
            "{} Started {} as new job {}",
            "✓".green(),
            action,
            job.id.to_string().cyan()
        );
    } else {
        println!(
            "{} Started {} of job {}",
            "✓".green(),
            action,
            uuid.to_string().cyan()
        );
    }
    println!("\nFollow progress with: labforge job logs {}", short_id(&job));

    Ok(())
}

async fn delete_job(client: &ApiClient, id: &str) -> Result<()> {
    let uuid = resolve_job_id(client, id).await?;
    client.delete_job(uuid).await?;

    println!("{} Job {} deleted", "✓".green(), uuid.to_string().cyan());
    Ok(())
}

fn print_template(stack: &str) -> Result<()> {
    let config = LabConfig::example(stack);
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

// =============================================================================
// Display
// =============================================================================

fn short_id(job: &Job) -> String {
    job.id.to_string().chars().take(8).collect()
}

fn print_job_summary(job: &JobSummary) {
    println!("  {} Job {}", "▸".cyan(), job.id.to_string().dimmed());
    println!("    Stack:   {}", job.stack_name);
    println!("    Status:  {}", colorize_status(&job.status));
    println!(
        "    Created: {}",
        job.created_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    if let Some(error) = &job.error {
        println!("    Error:   {}", error.red());
    }
    println!();
}

fn print_job_details(job: &Job) {
    println!("{}", "Job Details:".bold());
    println!("  ID:       {}", job.id.to_string().cyan());
    println!("  Stack:    {}", job.config.stack_name);
    println!("  Region:   {}", job.config.region);
    println!("  Status:   {}", colorize_status(&job.status));
    println!("  Created:  {}", job.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("  Updated:  {}", job.updated_at.format("%Y-%m-%d %H:%M:%S"));

    let pool = &job.config.node_pool;
    println!(
        "  Nodes:    {} x {} ({}-{})",
        pool.desired_nodes, pool.flavor, pool.min_nodes, pool.max_nodes
    );

    let outputs = &job.outputs;
    if !outputs.is_empty() {
        println!("\n{}", "Lab:".bold());
        if let Some(cluster) = &outputs.cluster_id {
            println!("  Cluster:  {}", cluster);
        }
        if let Some(url) = &outputs.platform_url {
            println!("  Platform: {}", url.cyan());
        }
        if let Some(email) = &outputs.admin_email {
            println!("  Admin:    {}", email);
        }
        println!(
            "  Kubeconfig: {}",
            if outputs.has_cluster_access() {
                "✓".green()
            } else {
                "✗".red()
            }
        );
    }

    if let Some(error) = &job.error {
        println!("\n{}", "Error:".bold());
        println!("{}", error.red());
    }
}

fn print_output_line(line: &str) {
    if line.starts_with("Error: ") {
        println!("{}", line.red());
    } else if line.starts_with("Warning: ") {
        println!("{}", line.yellow());
    } else {
        println!("{}", line);
    }
}

/// Colorize job status for display
fn colorize_status(status: &JobStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        JobStatus::Pending => label.yellow(),
        JobStatus::Running => label.cyan(),
        JobStatus::Completed => label.green(),
        JobStatus::DryRunCompleted => label.blue(),
        JobStatus::Failed => label.red(),
        JobStatus::Destroyed => label.dimmed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_start_mode() {
        assert_eq!(start_mode(false, false), None);
        assert_eq!(start_mode(true, false), Some(StartMode::Preview));
        assert_eq!(start_mode(false, true), Some(StartMode::Apply));
    }

    #[test]
    fn test_read_config_round_trips_template() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("lab.json");
        let example = LabConfig::example("team-a");
        std::fs::write(&path, serde_json::to_string_pretty(&example).unwrap()).unwrap();

        assert_eq!(read_config(&path).unwrap(), example);
    }

    #[test]
    fn test_read_config_rejects_invalid() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("lab.json");
        let mut config = LabConfig::example("dev");
        config.platform.admin_password = "short".to_string();
        std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();

        let err = read_config(&path).unwrap_err();
        assert!(err.to_string().contains("admin_password"));

        std::fs::write(&path, "{").unwrap();
        assert!(read_config(&path).is_err());
    }
}
