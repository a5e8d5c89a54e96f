use anyhow::{Context, Result};
use labforge_orchestrator::{api, build_state, config::Config, spawn_prewarm};
use labforge_runner::engine::PulumiCli;
use labforge_runner::toolchain::{GoToolchain, Toolchain};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "labforge_orchestrator=info,labforge_runner=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Labforge Orchestrator...");

    let config = Config::from_env();
    config.validate().context("Invalid configuration")?;
    config.ensure_dirs().await?;

    tracing::info!("Base directory: {}", config.runner.base_dir.display());
    match &config.data_dir {
        Some(dir) => tracing::info!("Persisting jobs to {}", dir.display()),
        None => tracing::info!("Job persistence disabled"),
    }
    if config.runner.is_precompiled() {
        tracing::info!("Using precompiled lab program");
    }

    let engine = Arc::new(PulumiCli::new(config.runner.pulumi_binary.clone()));
    let toolchain: Arc<dyn Toolchain> = Arc::new(GoToolchain::new(config.runner.go_binary.clone()));

    let state = build_state(&config, engine, toolchain.clone()).await?;

    if config.prewarm && !config.runner.is_precompiled() {
        spawn_prewarm(state.jobs.driver().clone(), toolchain);
    }

    // Build router with all API endpoints
    let app = api::create_router(state);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
