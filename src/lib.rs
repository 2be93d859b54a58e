pub mod cli;
pub mod clients;
pub mod config;
pub mod db;
pub mod entities;
pub mod models;
pub mod pipeline;
pub mod publisher;
pub mod scheduler;

use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
pub use config::Config;
use pipeline::Pipeline;
use scheduler::Scheduler;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub async fn run(config: Config, source: Option<PathBuf>) -> anyhow::Result<()> {
    let cli = Cli::parse();

    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.general.log_format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    match &source {
        Some(path) => info!("Loaded config from: {}", path.display()),
        None => info!("No config file found, using defaults"),
    }

    let Some(command) = cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Run => {
            config.validate()?;
            cli::cmd_run(config).await
        }

        Commands::Daemon => {
            config.validate()?;
            run_daemon(config).await
        }

        Commands::Validate { file } => cli::cmd_validate(&file).await,

        Commands::Consume { topics } => cli::cmd_consume(&config, &topics).await,

        Commands::History { limit } => cli::cmd_history(&config, limit).await,

        Commands::Init => {
            if Config::create_default_if_missing()? {
                println!("✓ Config file created. Set anilist.user_name in config.toml and run again.");
            } else {
                println!("config.toml already exists.");
            }
            Ok(())
        }
    }
}

fn install_metrics_exporter(config: &Config) -> anyhow::Result<()> {
    if !config.observability.metrics_enabled {
        return Ok(());
    }

    use metrics_exporter_prometheus::PrometheusBuilder;
    let mut builder = PrometheusBuilder::new();
    if let Some(port) = config.observability.metrics_port {
        builder = builder.with_http_listener(([0, 0, 0, 0], port));
        info!("Serving Prometheus metrics on port {}", port);
    }
    builder
        .install()
        .context("Failed to install Prometheus exporter")?;
    info!("Prometheus metrics recorder initialized");
    Ok(())
}

async fn run_daemon(config: Config) -> anyhow::Result<()> {
    info!(
        "anime-data-pipeline v{} starting in daemon mode...",
        env!("CARGO_PKG_VERSION")
    );

    install_metrics_exporter(&config)?;

    let pipeline = Arc::new(Pipeline::new(config.clone()).await?);
    let scheduler = Arc::new(Scheduler::new(pipeline, config.scheduler.clone()));

    let mut scheduler_handle = {
        let sched = Arc::clone(&scheduler);
        tokio::spawn(async move {
            if let Err(e) = sched.start().await {
                error!("Scheduler error: {}", e);
            }
        })
    };

    info!("Daemon running. Press Ctrl+C to stop.");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
        }
        Err(e) => {
            error!("Error listening for shutdown: {}", e);
        }
    }

    scheduler.stop().await;
    if tokio::time::timeout(std::time::Duration::from_secs(5), &mut scheduler_handle)
        .await
        .is_err()
    {
        error!("Scheduler did not stop in time");
        scheduler_handle.abort();
    }
    info!("Daemon stopped");

    Ok(())
}
